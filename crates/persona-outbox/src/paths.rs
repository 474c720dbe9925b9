//! Path utilities for the on-disk queue layout.
//!
//! ```text
//! <root>/pending/00000000000000000001.json
//! <root>/pending/00000000000000000002.json
//! <root>/pending/sequence
//! <root>/pending/queue.lock
//! <root>/pending/replay.lock
//! <root>/pending/quarantine/00000000000000000003.json
//! ```

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

const ENTRY_EXTENSION: &str = "json";

/// Directory holding queued entries.
pub fn pending_dir(root: &Path) -> PathBuf {
    root.join("pending")
}

/// File holding the last assigned sequence id.
pub fn sequence_path(root: &Path) -> PathBuf {
    pending_dir(root).join("sequence")
}

/// Lock file serializing appends and scans across processes.
pub fn queue_lock_path(root: &Path) -> PathBuf {
    pending_dir(root).join("queue.lock")
}

/// Lock file held for the whole of a reconciliation pass.
pub fn replay_lock_path(root: &Path) -> PathBuf {
    pending_dir(root).join("replay.lock")
}

/// Directory receiving entry files that cannot be replayed.
pub fn quarantine_dir(root: &Path) -> PathBuf {
    pending_dir(root).join("quarantine")
}

/// Entry file for a sequence id. Zero-padded so lexical order matches numeric order.
pub fn entry_path(root: &Path, id: u64) -> PathBuf {
    pending_dir(root).join(format!("{:020}.{}", id, ENTRY_EXTENSION))
}

/// Recover the sequence id from an entry file name, `None` for anything else
/// (temp files, the sequence file, stray files).
pub fn entry_id(path: &Path) -> Option<u64> {
    if path.extension().and_then(|s| s.to_str()) != Some(ENTRY_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.len() != 20 || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Ensure all parent directories exist for a path.
pub fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow!("Failed to create directory {}: {}", parent.display(), e))?;
    }
    Ok(())
}

/// Write a file atomically (write to .tmp, sync, then rename).
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;

    ensure_parent_dirs(path)?;
    let tmp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("tmp")
    ));
    {
        let mut file = std::fs::File::create(&tmp_path)
            .map_err(|e| anyhow!("Failed to create temp file {}: {}", tmp_path.display(), e))?;
        file.write_all(contents)
            .map_err(|e| anyhow!("Failed to write temp file {}: {}", tmp_path.display(), e))?;
        file.sync_all()
            .map_err(|e| anyhow!("Failed to sync temp file {}: {}", tmp_path.display(), e))?;
    }
    std::fs::rename(&tmp_path, path).map_err(|e| {
        anyhow!(
            "Failed to rename {} to {}: {}",
            tmp_path.display(),
            path.display(),
            e
        )
    })?;
    Ok(())
}

/// Write a JSON file atomically (compact format, no pretty printing).
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec(value).map_err(|e| anyhow!("Failed to serialize JSON: {}", e))?;
    atomic_write(path, &json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_path_roundtrips_id() {
        let root = Path::new("/tmp/queue");
        let path = entry_path(root, 42);
        assert!(path.ends_with("pending/00000000000000000042.json"));
        assert_eq!(entry_id(&path), Some(42));
    }

    #[test]
    fn test_entry_id_ignores_other_files() {
        let root = Path::new("/tmp/queue");
        assert_eq!(entry_id(&sequence_path(root)), None);
        assert_eq!(
            entry_id(&pending_dir(root).join("00000000000000000042.json.tmp")),
            None
        );
        assert_eq!(entry_id(&pending_dir(root).join("notes.json")), None);
        assert_eq!(entry_id(&queue_lock_path(root)), None);
        assert_eq!(entry_id(&replay_lock_path(root)), None);
        assert_eq!(entry_id(&quarantine_dir(root)), None);
    }

    #[test]
    fn test_lexical_order_matches_numeric() {
        let root = Path::new("/q");
        assert!(entry_path(root, 9) < entry_path(root, 10));
        assert!(entry_path(root, 99) < entry_path(root, 100));
    }
}
