use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

/// A lock guard that releases the lock file and removes the PID file on drop.
#[must_use = "lock is released when LockGuard is dropped"]
pub struct LockGuard {
    lock: fslock::LockFile,
    pid_path: PathBuf,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("pid_path", &self.pid_path)
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.lock.unlock() {
            warn!("failed to release lock: {}", e);
        }
        if let Err(e) = fs::remove_file(&self.pid_path) {
            warn!("failed to remove PID file {}: {}", self.pid_path.display(), e);
        }
    }
}

/// Attempt to acquire the single-daemon lock for a data directory.
///
/// Creates the directory if needed, takes the file lock first (atomic mutual
/// exclusion), then writes a PID file for diagnostics. On contention, the PID
/// file is read to produce an actionable message about the holder.
pub fn try_acquire(data_dir: &Path) -> Result<LockGuard, String> {
    fs::create_dir_all(data_dir)
        .map_err(|e| format!("Failed to create {}: {}", data_dir.display(), e))?;

    let lock_path = data_dir.join("research-golem.lock");
    let pid_path = data_dir.join("daemon.pid");

    let mut lock = fslock::LockFile::open(&lock_path)
        .map_err(|e| format!("Failed to open lock file {}: {}", lock_path.display(), e))?;

    let acquired = lock
        .try_lock()
        .map_err(|e| format!("Failed to acquire lock: {}", e))?;

    if !acquired {
        let holder = fs::read_to_string(&pid_path)
            .ok()
            .and_then(|s| s.trim().parse::<i32>().ok());

        return match holder {
            Some(pid) if is_pid_alive(pid) => Err(format!(
                "Another research-golem daemon is running (PID {})",
                pid
            )),
            Some(pid) => Err(format!(
                "Lock is held but recorded PID {} is not alive. \
                 Remove {} and {} to recover",
                pid,
                lock_path.display(),
                pid_path.display()
            )),
            None => Err(format!(
                "Another research-golem daemon holds the lock. \
                 If this is stale, remove {}",
                lock_path.display()
            )),
        };
    }

    // We hold the lock -- safe to write PID
    fs::write(&pid_path, std::process::id().to_string())
        .map_err(|e| format!("Failed to write PID file: {}", e))?;

    Ok(LockGuard { lock, pid_path })
}

fn is_pid_alive(pid: i32) -> bool {
    // signal 0 checks if process exists without sending a signal
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pid_alive_current_process() {
        let pid = std::process::id() as i32;
        assert!(is_pid_alive(pid));
    }

    #[test]
    fn test_is_pid_alive_nonexistent() {
        // PID 99999999 is almost certainly not alive
        assert!(!is_pid_alive(99_999_999));
    }

    #[test]
    fn test_acquire_writes_pid_and_releases_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_path = dir.path().join("daemon.pid");

        {
            let _guard = try_acquire(dir.path()).expect("lock acquired");
            let contents = fs::read_to_string(&pid_path).expect("pid file exists");
            assert_eq!(contents, std::process::id().to_string());
        }

        assert!(!pid_path.exists(), "PID file removed on drop");
    }
}
