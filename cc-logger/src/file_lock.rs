// SPDX-License-Identifier: GPL-3.0-or-later

//! Advisory locking so concurrent intercepted processes can append to the
//! same compilation database safely.
//!
//! Grounded on `ldlogger-util.c::aquireLock`/`freeLock`: a sidecar
//! `<database>.lock` file held with a blocking exclusive `flock`,
//! released (and the fd closed) on drop.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::LoggerError;
use crate::strutil::resolve_absolute;

/// Holds an exclusive advisory lock on `<path>.lock` for its lifetime.
pub struct FileLock {
    file: File,
    #[allow(dead_code)]
    lock_path: PathBuf,
}

impl FileLock {
    /// Blocks until the lock is held. The lock file itself is created if
    /// missing and is never removed — only its contention state matters.
    pub fn acquire(database_path: &Path) -> Result<Self, LoggerError> {
        let canon = resolve_absolute(database_path, false)?;
        let mut lock_path = canon.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock_path = PathBuf::from(lock_path);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&lock_path)
            .map_err(|e| {
                LoggerError::ResourceAcquisition(format!(
                    "cannot open lock file {}: {e}",
                    lock_path.display()
                ))
            })?;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc != 0 {
            return Err(LoggerError::ResourceAcquisition(format!(
                "flock failed on {}: {}",
                lock_path.display(),
                std::io::Error::last_os_error()
            )));
        }

        Ok(Self { file, lock_path })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}
