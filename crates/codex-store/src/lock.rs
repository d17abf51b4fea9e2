//! Advisory, exclusive, non-blocking file locking.
//!
//! On POSIX this is realized via `flock(LOCK_EX|LOCK_NB)`; on Windows,
//! via the equivalent whole-file region lock. `fs2` abstracts both
//! behind one call pair so the rest of the store never branches on
//! platform. The lock is released automatically when the owning file
//! descriptor is closed (process exit included), and explicitly by
//! [`FileLock::unlock`].
//!
//! Callers open the file themselves; this module does not manage the
//! file's lifetime, only the lock held on it.

use codex_types::{Error, ErrorKind};
use fs2::FileExt;
use std::fs::File;

/// A held exclusive advisory lock on an open file.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Attempts to acquire an exclusive, non-blocking lock on `file`.
    ///
    /// # Errors
    ///
    /// Returns a `Concurrency` error if the lock is already held by
    /// another process.
    pub fn acquire(file: File) -> Result<Self, Error> {
        file.try_lock_exclusive().map_err(|_| {
            Error::new(ErrorKind::Concurrency, "lock already held by another process")
        })?;
        Ok(Self { file })
    }

    /// Releases the lock explicitly. Also released implicitly when
    /// the lock's file descriptor is closed.
    ///
    /// # Errors
    ///
    /// Returns an `Io` error if the OS unlock call fails.
    pub fn release(self) -> Result<(), Error> {
        self.file.unlock().map_err(Error::from)
    }

    /// Borrows the locked file.
    pub fn file(&self) -> &File {
        &self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;

    #[test]
    fn second_exclusive_lock_on_same_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockme");
        let f1 = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        let f2 = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();

        let lock1 = FileLock::acquire(f1).unwrap();
        let err = FileLock::acquire(f2).unwrap_err();
        assert!(err.is(ErrorKind::Concurrency));
        lock1.release().unwrap();
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lockme2");
        let f1 = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .unwrap();
        {
            let _lock = FileLock::acquire(f1).unwrap();
        }
        let f2 = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .unwrap();
        assert!(FileLock::acquire(f2).is_ok());
    }
}
