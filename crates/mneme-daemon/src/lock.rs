//! Storage-directory lock file: exactly one process may own the
//! storage directory at a time, enforced via `fs2`'s advisory
//! exclusive lock. A second start attempt while the lock is held
//! signals the existing daemon over its socket instead of opening the
//! store.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

/// Held for the lifetime of the daemon process; dropping it (including
/// on panic unwind) releases the OS-level advisory lock.
pub struct StoreLock {
    _file: File,
    path: PathBuf,
}

/// spec.md §6 exit code 2: lock contention is fatal to startup.
pub const EXIT_LOCK_CONTENTION: i32 = 2;

impl StoreLock {
    /// Attempts to acquire the exclusive lock at `<base>.lock`. Returns
    /// `Ok(None)` (not an error) when another process already holds it,
    /// so the caller can fall through to "signal the existing daemon
    /// via its socket" instead of treating this as fatal by itself.
    pub fn try_acquire(base_path: &Path) -> std::io::Result<Option<Self>> {
        let lock_path = lock_file_path(base_path);
        if let Some(dir) = lock_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(&lock_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self {
                _file: file,
                path: lock_path,
            })),
            Err(_) => Ok(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn lock_file_path(base_path: &Path) -> PathBuf {
    let mut os = base_path.as_os_str().to_owned();
    os.push(".lock");
    PathBuf::from(os)
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self._file);
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_on_same_path_fails_while_first_is_held() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store.hot");
        let first = StoreLock::try_acquire(&base).unwrap();
        assert!(first.is_some());

        let second = StoreLock::try_acquire(&base).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("store.hot");
        {
            let _first = StoreLock::try_acquire(&base).unwrap();
        }
        let second = StoreLock::try_acquire(&base).unwrap();
        assert!(second.is_some());
    }
}
