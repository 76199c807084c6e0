// ABOUTME: Error types for a deployment run.
// ABOUTME: Each variant names the stage that failed and carries the underlying cause.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::hooks::{HookError, HookPhase};
use crate::release::CopyError;
use crate::transport::TransportError;

/// Who holds a deploy lock, as recorded in the lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolderInfo {
    pub holder: String,
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl fmt::Display for LockHolderInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (pid {}) since {}",
            self.holder, self.pid, self.started_at
        )
    }
}

/// Errors that end a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("copy failed: {0}")]
    Copy(#[from] CopyError),

    #[error("{phase} hook failed: {source}")]
    Hook {
        phase: HookPhase,
        #[source]
        source: HookError,
    },

    #[error("failed to delete old releases: {0}")]
    Prune(#[source] TransportError),

    #[error("failed to promote release: {0}")]
    Promotion(#[source] TransportError),

    #[error("destination error: {0}")]
    Transport(#[source] TransportError),

    #[error("deploy lock held by {0}")]
    LockHeld(LockHolderInfo),

    #[error("deploy lock error: {0}")]
    Lock(String),
}

/// Coarse classification of a [`DeployError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    SourceNotFound,
    Copy,
    Hook(HookPhase),
    Prune,
    Promotion,
    Transport,
    LockHeld,
    Lock,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::SourceNotFound(_) => DeployErrorKind::SourceNotFound,
            DeployError::Copy(_) => DeployErrorKind::Copy,
            DeployError::Hook { phase, .. } => DeployErrorKind::Hook(*phase),
            DeployError::Prune(_) => DeployErrorKind::Prune,
            DeployError::Promotion(_) => DeployErrorKind::Promotion,
            DeployError::Transport(_) => DeployErrorKind::Transport,
            DeployError::LockHeld(_) => DeployErrorKind::LockHeld,
            DeployError::Lock(_) => DeployErrorKind::Lock,
        }
    }

    pub fn hook(phase: HookPhase) -> impl FnOnce(HookError) -> Self {
        move |source| DeployError::Hook { phase, source }
    }

    pub fn lock_error(message: impl Into<String>) -> Self {
        DeployError::Lock(message.into())
    }

    pub fn lock_held(holder: String, pid: u32, started_at: DateTime<Utc>) -> Self {
        DeployError::LockHeld(LockHolderInfo {
            holder,
            pid,
            started_at,
        })
    }

    /// Lock holder details, if this error is [`DeployError::LockHeld`].
    pub fn lock_holder_info(&self) -> Option<&LockHolderInfo> {
        match self {
            DeployError::LockHeld(info) => Some(info),
            _ => None,
        }
    }
}
