//! Advisory file locks shared by every process that opens the same queue.
//!
//! Locks belong to the open file handle, so two handles in one process exclude each
//! other just like two processes do. Dropping the handle releases the lock.

use anyhow::{anyhow, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use crate::paths::ensure_parent_dirs;

fn open_lock_file(path: &Path) -> Result<File> {
    ensure_parent_dirs(path)?;
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .map_err(|e| anyhow!("Failed to open lock file {}: {}", path.display(), e))
}

/// Open `path` and wait for an exclusive lock on it.
pub fn acquire_exclusive_blocking(path: &Path) -> Result<File> {
    let file = open_lock_file(path)?;
    file.lock_exclusive()
        .map_err(|e| anyhow!("Failed to lock {}: {}", path.display(), e))?;
    Ok(file)
}

/// Open `path` and take an exclusive lock if nobody holds one.
///
/// `Ok(None)` means the lock is held elsewhere.
pub fn try_acquire_exclusive(path: &Path) -> Result<Option<File>> {
    let file = open_lock_file(path)?;
    match try_acquire_exclusive_nonblocking(&file) {
        Ok(true) => Ok(Some(file)),
        Ok(false) => Ok(None),
        Err(e) => Err(anyhow!("Failed to lock {}: {}", path.display(), e)),
    }
}

/// `Ok(false)` when another handle holds the lock.
pub fn try_acquire_exclusive_nonblocking(file: &File) -> io::Result<bool> {
    match file.try_lock_exclusive() {
        Ok(()) => Ok(true),
        Err(e) if is_contended(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_handle_is_excluded_until_drop() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested/replay.lock");

        let held = try_acquire_exclusive(&path)?;
        assert!(held.is_some());
        assert!(try_acquire_exclusive(&path)?.is_none());

        drop(held);
        assert!(try_acquire_exclusive(&path)?.is_some());
        Ok(())
    }

    #[test]
    fn test_blocking_acquire_after_release() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("queue.lock");

        let first = acquire_exclusive_blocking(&path)?;
        let waiter = {
            let path = path.clone();
            std::thread::spawn(move || acquire_exclusive_blocking(&path).map(|_| ()))
        };
        std::thread::sleep(std::time::Duration::from_millis(20));
        drop(first);

        waiter.join().expect("waiter thread")?;
        Ok(())
    }
}
