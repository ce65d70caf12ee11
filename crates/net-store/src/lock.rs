//! File based store lock
//!
//! Serializes writers to one store directory across processes. A lock is a
//! JSON file created exclusively; it is released when the guard is dropped.
//! Locks whose holder died, or that outlived [`LOCK_TIMEOUT`], are broken.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Age after which a lock is considered abandoned.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

const RETRY_INTERVAL: Duration = Duration::from_millis(20);

/// Lock information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub node: String,
    pub pid: u32,
    pub timestamp: u64,
    pub operation: String,
}

impl LockInfo {
    fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) >= LOCK_TIMEOUT.as_secs()
            || !Path::new(&format!("/proc/{}", self.pid)).exists()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Held store lock. Dropping it removes the lock file.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    lock_info: LockInfo,
}

impl StoreLock {
    /// Acquire lock `name` in `lock_dir`, waiting up to `wait` for a live
    /// holder to release it.
    pub async fn acquire(
        lock_dir: &Path,
        name: &str,
        node: &str,
        operation: &str,
        wait: Duration,
    ) -> Result<Self> {
        fs::create_dir_all(lock_dir)
            .await
            .with_context(|| format!("Failed to create lock directory {}", lock_dir.display()))?;

        let path = lock_dir.join(format!("{}.lock", name));
        let lock_info = LockInfo {
            node: node.to_string(),
            pid: std::process::id(),
            timestamp: unix_now(),
            operation: operation.to_string(),
        };

        let started = Instant::now();
        loop {
            match Self::try_create(&path, &lock_info).await {
                Ok(()) => {
                    return Ok(Self { path, lock_info });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::break_if_stale(&path).await {
                        continue;
                    }
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to create lock file {}", path.display()));
                }
            }

            if started.elapsed() >= wait {
                bail!("Failed to acquire lock '{}' within {:?}", name, wait);
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    async fn try_create(path: &Path, lock_info: &LockInfo) -> std::io::Result<()> {
        let content = serde_json::to_vec(lock_info)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(&content).await?;
        file.flush().await
    }

    /// Remove the lock at `path` if its holder is gone. Returns whether the
    /// caller should retry immediately.
    async fn break_if_stale(path: &Path) -> bool {
        let existing = match fs::read_to_string(path).await {
            Ok(content) => content,
            // Released in the meantime.
            Err(_) => return true,
        };

        // A half written lock file belongs to a holder still creating it.
        let Ok(info) = serde_json::from_str::<LockInfo>(&existing) else {
            return false;
        };

        if !info.is_stale(unix_now()) {
            return false;
        }

        log::warn!(
            "Breaking stale lock {} held by {}:{} for '{}'",
            path.display(),
            info.node,
            info.pid,
            info.operation
        );
        fs::remove_file(path).await.is_ok()
    }

    pub fn lock_info(&self) -> &LockInfo {
        &self.lock_info
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release lock {}: {}", self.path.display(), err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join(".locks");

        let lock = StoreLock::acquire(&lock_dir, "networks", "node1", "create", LOCK_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(lock.lock_info().node, "node1");
        assert_eq!(lock.lock_info().operation, "create");
        assert!(lock_dir.join("networks.lock").exists());

        drop(lock);
        assert!(!lock_dir.join("networks.lock").exists());
    }

    #[tokio::test]
    async fn test_held_lock_times_out() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join(".locks");

        let _held = StoreLock::acquire(&lock_dir, "networks", "node1", "update", LOCK_TIMEOUT)
            .await
            .unwrap();
        let second = StoreLock::acquire(
            &lock_dir,
            "networks",
            "node1",
            "delete",
            Duration::from_millis(100),
        )
        .await;

        assert!(second.is_err());
    }

    #[tokio::test]
    async fn test_stale_lock_is_broken() {
        let temp_dir = TempDir::new().unwrap();
        let lock_dir = temp_dir.path().join(".locks");
        std::fs::create_dir_all(&lock_dir).unwrap();

        let stale = LockInfo {
            node: "node1".to_string(),
            pid: std::process::id(),
            timestamp: unix_now() - LOCK_TIMEOUT.as_secs() - 1,
            operation: "rename".to_string(),
        };
        std::fs::write(
            lock_dir.join("networks.lock"),
            serde_json::to_string(&stale).unwrap(),
        )
        .unwrap();

        let lock = StoreLock::acquire(
            &lock_dir,
            "networks",
            "node1",
            "update",
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert_eq!(lock.lock_info().operation, "update");
    }
}
