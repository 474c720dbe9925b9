//! Filesystem-backed pending-operation store.
//!
//! Each queued mutation is one JSON file named after its sequence id. Entries are
//! append-only: they are written once, read by the replay worker, and deleted when
//! no longer needed. `list_all` returns them oldest first, which is the order they
//! must be replayed in. Entries that cannot be read back are moved aside to
//! `pending/quarantine/` so they stop counting as queued work.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::lock::{acquire_exclusive_blocking, try_acquire_exclusive};
use crate::paths::{
    atomic_write, atomic_write_json, ensure_parent_dirs, entry_id, entry_path, pending_dir,
    quarantine_dir, queue_lock_path, replay_lock_path, sequence_path,
};

/// Payload stored for DELETE entries.
pub const DELETE_PAYLOAD: &str = "{}";

/// Kind of a queued mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Create,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Create => "CREATE",
            OperationKind::Update => "UPDATE",
            OperationKind::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "CREATE" => Ok(OperationKind::Create),
            "UPDATE" => Ok(OperationKind::Update),
            "DELETE" => Ok(OperationKind::Delete),
            other => Err(anyhow!("unknown operation kind '{}'", other)),
        }
    }
}

/// One deferred mutation as persisted.
///
/// `kind` stays the persisted string so that an entry written by another version
/// (or damaged on disk) can still be listed and then discarded by the replay worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperation {
    /// Sequence id assigned on append. Local only.
    pub id: u64,
    /// Target person identifier.
    pub identifier: String,
    pub kind: String,
    /// Serialized record snapshot for CREATE/UPDATE, [`DELETE_PAYLOAD`] for DELETE.
    pub payload: String,
}

impl PendingOperation {
    pub fn operation_kind(&self) -> Result<OperationKind> {
        self.kind.parse()
    }

    /// True when the payload carries no record (empty, blank or `{}`).
    pub fn payload_is_blank(&self) -> bool {
        let trimmed = self.payload.trim();
        trimmed.is_empty() || trimmed == DELETE_PAYLOAD
    }
}

/// Append / scan / delete-by-key queue of pending operations.
pub trait PendingStore: Send + Sync {
    /// Persist a new entry and return its sequence id.
    fn append(&self, identifier: &str, kind: OperationKind, payload: &str) -> Result<u64>;

    /// All entries, oldest first.
    fn list_all(&self) -> Result<Vec<PendingOperation>>;

    /// Remove an entry. Removing an id that is not queued is a no-op.
    fn delete_by_id(&self, id: u64) -> Result<()>;

    /// Claim exclusive replay rights for one reconciliation pass, shared with
    /// every other handle on the same queue. `Ok(None)` when a pass is already
    /// running.
    fn try_claim_replay(&self) -> Result<Option<ReplayLease>>;

    fn len(&self) -> Result<usize> {
        self.list_all().map(|ops| ops.len())
    }

    fn is_empty(&self) -> Result<bool> {
        self.len().map(|n| n == 0)
    }
}

/// Exclusive right to replay the queue, held for one reconciliation pass.
///
/// Released when dropped.
#[derive(Debug)]
pub struct ReplayLease {
    _lock: File,
}

/// Pending-operation store rooted at a directory.
///
/// Any number of handles, in this process or others, may share one directory.
/// Appends and scans take an advisory lock on the queue, so sequence ids are
/// assigned once and an entry file is never overwritten.
pub struct FsPendingStore {
    root: PathBuf,
}

impl FsPendingStore {
    /// Open (or create) a store under `root`.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let dir = pending_dir(&root);
        std::fs::create_dir_all(&dir)
            .map_err(|e| anyhow!("Failed to create queue directory {}: {}", dir.display(), e))?;
        debug!(root = %root.display(), "opened pending-operation store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files moved aside as unreplayable, oldest first.
    pub fn quarantined(&self) -> Result<Vec<PathBuf>> {
        let dir = quarantine_dir(&self.root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(&dir)
            .map_err(|e| anyhow!("Failed to read quarantine {}: {}", dir.display(), e))?
        {
            let entry = entry.map_err(|e| anyhow!("Failed to read quarantine entry: {}", e))?;
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }

    /// Highest id ever assigned: the persisted sequence or the newest entry file,
    /// queued or quarantined, whichever is larger. Caller holds the queue lock.
    fn last_assigned_id(&self) -> Result<u64> {
        let persisted = read_sequence(&sequence_path(&self.root))?;
        let mut highest = entry_ids(&self.root)?.last().copied().unwrap_or(0);
        let quarantine = quarantine_dir(&self.root);
        if quarantine.exists() {
            highest = highest.max(entry_ids_in(&quarantine)?.last().copied().unwrap_or(0));
        }
        Ok(persisted.max(highest))
    }

    /// Move an unreplayable entry file out of the queue. Caller holds the queue lock.
    fn quarantine(&self, path: &Path, reason: &str) {
        let Some(name) = path.file_name() else {
            return;
        };
        let target = quarantine_dir(&self.root).join(name);
        let moved = ensure_parent_dirs(&target)
            .and_then(|()| std::fs::rename(path, &target).map_err(anyhow::Error::from));
        match moved {
            Ok(()) => warn!(
                path = %path.display(),
                quarantine = %target.display(),
                %reason,
                "queue entry quarantined"
            ),
            Err(e) => warn!(path = %path.display(), %reason, error = %e, "queue entry skipped; quarantine failed"),
        }
    }
}

fn read_sequence(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("Failed to read sequence file {}: {}", path.display(), e))?;
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Corrupt sequence file {}: {}", path.display(), e))
}

/// Sequence ids of the entry files directly under `dir`, sorted ascending.
fn entry_ids_in(dir: &Path) -> Result<Vec<u64>> {
    let mut ids = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| anyhow!("Failed to read queue directory {}: {}", dir.display(), e))?
    {
        let entry = entry.map_err(|e| anyhow!("Failed to read queue entry: {}", e))?;
        if let Some(id) = entry_id(&entry.path()) {
            ids.push(id);
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

fn entry_ids(root: &Path) -> Result<Vec<u64>> {
    entry_ids_in(&pending_dir(root))
}

/// Create the entry file for `id`, failing if one already exists.
fn reserve_entry(path: &Path) -> std::io::Result<()> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map(|_| ())
}

impl PendingStore for FsPendingStore {
    fn append(&self, identifier: &str, kind: OperationKind, payload: &str) -> Result<u64> {
        let _lock = acquire_exclusive_blocking(&queue_lock_path(&self.root))?;

        let mut id = self.last_assigned_id()? + 1;
        let path = loop {
            let path = entry_path(&self.root, id);
            match reserve_entry(&path) {
                Ok(()) => break path,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => id += 1,
                Err(e) => return Err(anyhow!("Failed to create {}: {}", path.display(), e)),
            }
        };

        let op = PendingOperation {
            id,
            identifier: identifier.to_string(),
            kind: kind.as_str().to_string(),
            payload: payload.to_string(),
        };
        // Replaces only the empty file reserved above.
        if let Err(e) = atomic_write_json(&path, &op) {
            let _ = std::fs::remove_file(&path);
            return Err(e);
        }
        atomic_write(&sequence_path(&self.root), id.to_string().as_bytes())?;
        Ok(id)
    }

    fn list_all(&self) -> Result<Vec<PendingOperation>> {
        let _lock = acquire_exclusive_blocking(&queue_lock_path(&self.root))?;

        let mut ops = Vec::new();
        for id in entry_ids(&self.root)? {
            let path = entry_path(&self.root, id);
            let raw = match std::fs::read_to_string(&path) {
                Ok(raw) => raw,
                // Deleted between the directory scan and the read.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(anyhow!("Failed to read {}: {}", path.display(), e)),
            };
            match serde_json::from_str::<PendingOperation>(&raw) {
                Ok(op) if op.id == id => ops.push(op),
                Ok(op) => self.quarantine(
                    &path,
                    &format!("stored id {} does not match file name", op.id),
                ),
                Err(e) => self.quarantine(&path, &format!("undecodable: {}", e)),
            }
        }
        Ok(ops)
    }

    fn delete_by_id(&self, id: u64) -> Result<()> {
        let path = entry_path(&self.root, id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(anyhow!("Failed to delete {}: {}", path.display(), e)),
        }
    }

    fn try_claim_replay(&self) -> Result<Option<ReplayLease>> {
        let lock = try_acquire_exclusive(&replay_lock_path(&self.root))?;
        Ok(lock.map(|lock| ReplayLease { _lock: lock }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_list_delete() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsPendingStore::open(temp_dir.path())?;

        let a = store.append("11111111-1", OperationKind::Create, r#"{"id":"11111111-1"}"#)?;
        let b = store.append("11111111-1", OperationKind::Update, r#"{"id":"11111111-1"}"#)?;
        let c = store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert!(a < b && b < c);

        let ops = store.list_all()?;
        let kinds: Vec<_> = ops.iter().map(|op| op.kind.as_str()).collect();
        assert_eq!(kinds, vec!["CREATE", "UPDATE", "DELETE"]);

        store.delete_by_id(b)?;
        store.delete_by_id(b)?; // Absent id is a no-op
        let ids: Vec<_> = store.list_all()?.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec![a, c]);

        Ok(())
    }

    #[test]
    fn test_ids_survive_reopen() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let first = {
            let store = FsPendingStore::open(temp_dir.path())?;
            let id = store.append("11111111-1", OperationKind::Create, "{}")?;
            store.delete_by_id(id)?;
            id
        };

        // Queue is empty, but ids must never be reused.
        let store = FsPendingStore::open(temp_dir.path())?;
        assert!(store.is_empty()?);
        let second = store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert!(second > first);

        Ok(())
    }

    #[test]
    fn test_sequence_recovers_from_entry_files() -> Result<()> {
        let temp_dir = TempDir::new()?;
        {
            let store = FsPendingStore::open(temp_dir.path())?;
            for _ in 0..3 {
                store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
            }
        }
        // Simulate a crash that lost the sequence file write.
        std::fs::remove_file(sequence_path(temp_dir.path()))?;

        let store = FsPendingStore::open(temp_dir.path())?;
        let id = store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert_eq!(id, 4);
        Ok(())
    }

    #[test]
    fn test_undecodable_entries_are_quarantined() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsPendingStore::open(temp_dir.path())?;
        store.append("11111111-1", OperationKind::Create, r#"{"id":"11111111-1"}"#)?;
        std::fs::write(entry_path(temp_dir.path(), 7), b"{truncated")?;
        // Decodes, but claims a different slot.
        let misplaced = PendingOperation {
            id: 3,
            identifier: "22222222-2".to_string(),
            kind: "DELETE".to_string(),
            payload: DELETE_PAYLOAD.to_string(),
        };
        std::fs::write(entry_path(temp_dir.path(), 9), serde_json::to_vec(&misplaced)?)?;

        let ops = store.list_all()?;
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].id, 1);

        // Moved out of the queue, so they no longer count as pending.
        assert!(!entry_path(temp_dir.path(), 7).exists());
        assert!(!entry_path(temp_dir.path(), 9).exists());
        assert_eq!(store.len()?, 1);
        let names: Vec<_> = store
            .quarantined()?
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            vec![
                "00000000000000000007.json".to_string(),
                "00000000000000000009.json".to_string()
            ]
        );

        // Quarantined ids are never reassigned.
        let next = store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert_eq!(next, 10);
        Ok(())
    }

    #[test]
    fn test_two_handles_on_one_directory_keep_every_append() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let a = FsPendingStore::open(temp_dir.path())?;
        let b = FsPendingStore::open(temp_dir.path())?;

        let first = a.append("11111111-1", OperationKind::Create, r#"{"id":"11111111-1"}"#)?;
        let second = b.append("22222222-2", OperationKind::Delete, DELETE_PAYLOAD)?;
        let third = a.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert_eq!((first, second, third), (1, 2, 3));

        for handle in [&a, &b] {
            let seen: Vec<_> = handle
                .list_all()?
                .into_iter()
                .map(|op| (op.id, op.identifier))
                .collect();
            assert_eq!(
                seen,
                vec![
                    (1, "11111111-1".to_string()),
                    (2, "22222222-2".to_string()),
                    (3, "11111111-1".to_string()),
                ]
            );
        }
        Ok(())
    }

    #[test]
    fn test_concurrent_appends_from_separate_handles() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path().to_path_buf();

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let root = root.clone();
                std::thread::spawn(move || -> Result<Vec<u64>> {
                    let store = FsPendingStore::open(&root)?;
                    (0..10)
                        .map(|_| store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD))
                        .collect()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for worker in workers {
            ids.extend(worker.join().expect("append worker")?);
        }
        ids.sort_unstable();
        assert_eq!(ids, (1..=40).collect::<Vec<u64>>());
        assert_eq!(FsPendingStore::open(&root)?.len()?, 40);
        Ok(())
    }

    #[test]
    fn test_rolled_back_sequence_does_not_reuse_ids() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let store = FsPendingStore::open(temp_dir.path())?;
        store.append("11111111-1", OperationKind::Delete, DELETE_PAYLOAD)?;
        // Sequence file lagging behind the entries on disk.
        std::fs::write(sequence_path(temp_dir.path()), b"0")?;

        let id = store.append("22222222-2", OperationKind::Delete, DELETE_PAYLOAD)?;
        assert_eq!(id, 2);
        let ids: Vec<_> = store.list_all()?.iter().map(|op| op.id).collect();
        assert_eq!(ids, vec![1, 2]);
        Ok(())
    }

    #[test]
    fn test_replay_lease_is_exclusive_across_handles() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let a = FsPendingStore::open(temp_dir.path())?;
        let b = FsPendingStore::open(temp_dir.path())?;

        let lease = a.try_claim_replay()?;
        assert!(lease.is_some());
        assert!(b.try_claim_replay()?.is_none());
        assert!(a.try_claim_replay()?.is_none());

        drop(lease);
        assert!(b.try_claim_replay()?.is_some());
        Ok(())
    }

    #[test]
    fn test_kind_parsing_and_blank_payloads() {
        assert_eq!("UPDATE".parse::<OperationKind>().unwrap(), OperationKind::Update);
        assert!("RENAME".parse::<OperationKind>().is_err());

        let mut op = PendingOperation {
            id: 1,
            identifier: "11111111-1".to_string(),
            kind: "CREATE".to_string(),
            payload: "  {} ".to_string(),
        };
        assert!(op.payload_is_blank());
        op.payload = r#"{"id":"11111111-1"}"#.to_string();
        assert!(!op.payload_is_blank());
    }
}
