//! Single-controller lock file.
//!
//! The lock is a file holding the owner's PID, created with `create_new`.
//! A lock whose PID is no longer alive is taken over. The file is removed
//! when the guard drops.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another controller (pid {pid}) holds {path}")]
    Held { path: PathBuf, pid: u32 },

    #[error("lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug)]
pub struct ControllerLock {
    path: PathBuf,
}

impl ControllerLock {
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, LockError> {
        let path = path.as_ref().to_path_buf();
        match Self::create(&path) {
            Ok(lock) => Ok(lock),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let owner = read_pid(&path);
                if let Some(pid) = owner.filter(|pid| process_alive(*pid)) {
                    return Err(LockError::Held { path, pid });
                }
                tracing::warn!(path = %path.display(), stale_pid = ?owner, "Taking over stale controller lock");
                fs::remove_file(&path).map_err(|source| LockError::Io {
                    path: path.clone(),
                    source,
                })?;
                Self::create(&path).map_err(|source| LockError::Io { path, source })
            }
            Err(source) => Err(LockError::Io { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(path: &Path) -> io::Result<Self> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        writeln!(file, "{}", std::process::id())?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for ControllerLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove controller lock");
        }
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> bool {
    Path::new("/proc").join(pid.to_string()).exists()
}

// Without /proc there is no cheap liveness check; treat the lock as held.
#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.lock");

        let lock = ControllerLock::acquire(&path).unwrap();
        let err = ControllerLock::acquire(&path).unwrap_err();
        assert!(matches!(err, LockError::Held { pid, .. } if pid == std::process::id()));

        drop(lock);
        assert!(!path.exists());
        assert!(ControllerLock::acquire(&path).is_ok());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_stale_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.lock");
        // Above the kernel's pid_max, so never a live process.
        fs::write(&path, "4194305\n").unwrap();

        let lock = ControllerLock::acquire(&path).unwrap();
        assert_eq!(read_pid(lock.path()), Some(std::process::id()));
    }

    #[test]
    fn test_garbage_lock_is_taken_over() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.lock");
        fs::write(&path, "not a pid").unwrap();

        assert!(ControllerLock::acquire(&path).is_ok());
    }
}
