// ABOUTME: Deploy lock preventing concurrent runs against one destination root.
// ABOUTME: Uses exclusive file creation through the transport with lock info stored as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::transport::{Transport, join};

use super::DeployError;

/// Lock file name inside the destination root.
pub const LOCK_FILE: &str = ".pasang.lock";

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Destination being deployed to.
    pub destination: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            holder: gethostname::gethostname().to_string_lossy().into_owned(),
            pid: std::process::id(),
            started_at: Utc::now(),
            destination: destination.into(),
        }
    }

    /// Check if this lock is stale (older than 1 hour).
    pub fn is_stale(&self) -> bool {
        let age = Utc::now() - self.started_at;
        age.num_hours() >= 1
    }

    /// Path to the lock file under a destination root.
    pub fn lock_path(root: &str) -> String {
        join(root, LOCK_FILE)
    }
}

/// A held deploy lock. Release it explicitly with [`DeployLock::release`].
pub struct DeployLock<'a, T: Transport + ?Sized> {
    transport: &'a T,
    path: String,
}

impl<T: Transport + ?Sized> std::fmt::Debug for DeployLock<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("path", &self.path)
            .finish()
    }
}

impl<'a, T: Transport + ?Sized> DeployLock<'a, T> {
    /// Acquire the deploy lock for `root`, recording `destination` as the
    /// user wrote it so a blocked run can name the target.
    ///
    /// Exclusive creation makes acquisition atomic on both transports.
    /// Returns an error if the lock is already held by another process.
    /// Auto-breaks stale locks (>1 hour) with a warning; `force` breaks any lock.
    pub async fn acquire(
        transport: &'a T,
        root: &str,
        destination: &str,
        force: bool,
    ) -> Result<Self, DeployError> {
        let path = LockInfo::lock_path(root);

        transport.create_dir_all(root).await.map_err(|e| {
            DeployError::lock_error(format!("failed to create destination root: {}", e))
        })?;

        let lock_json = serde_json::to_vec(&LockInfo::new(destination))
            .map_err(|e| DeployError::lock_error(format!("failed to serialize lock: {}", e)))?;

        if Self::try_create(transport, &path, &lock_json).await? {
            return Ok(Self { transport, path });
        }

        // Lock file exists - check if it should be broken
        match Self::read_existing(transport, &path).await {
            Some(existing) if !force && !existing.is_stale() => {
                return Err(DeployError::lock_held(
                    existing.holder,
                    existing.pid,
                    existing.started_at,
                ));
            }
            Some(existing) if force => tracing::warn!(
                "Breaking lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            ),
            Some(existing) => tracing::warn!(
                "Auto-breaking stale lock held by {} (pid {}) since {}",
                existing.holder,
                existing.pid,
                existing.started_at
            ),
            None => tracing::warn!("Lock info unreadable, breaking lock"),
        }

        tracing::debug!("Removing stale/forced lock at {}", path);
        if let Err(e) = transport.remove(&path).await
            && !e.is_not_found()
        {
            return Err(DeployError::lock_error(format!(
                "failed to break lock: {}",
                e
            )));
        }

        if !Self::try_create(transport, &path, &lock_json).await? {
            return Err(DeployError::lock_error(
                "lock acquired by another process during break".to_string(),
            ));
        }

        Ok(Self { transport, path })
    }

    async fn try_create(transport: &T, path: &str, contents: &[u8]) -> Result<bool, DeployError> {
        transport
            .create_new_file(path, contents)
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to acquire lock: {}", e)))
    }

    /// Lock info of an existing lock, `None` if it cannot be read or parsed.
    async fn read_existing(transport: &T, path: &str) -> Option<LockInfo> {
        let bytes = transport.read_file(path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Release the lock.
    pub async fn release(self) -> Result<(), DeployError> {
        self.transport
            .remove(&self.path)
            .await
            .map_err(|e| DeployError::lock_error(format!("failed to release lock: {}", e)))
    }
}
