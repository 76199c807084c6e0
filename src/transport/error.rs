// ABOUTME: Transport error type carrying the failed operation and path.
// ABOUTME: Missing paths map to io::ErrorKind::NotFound on both backends.

use std::fmt;
use std::io;

/// The transport operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Inspect,
    CreateDir,
    CreateFile,
    WriteFile,
    ReadFile,
    SetPermissions,
    ReadDir,
    Remove,
    Symlink,
    ReadLink,
    Rename,
    Close,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Inspect => "inspect",
            Operation::CreateDir => "create directory",
            Operation::CreateFile => "create file",
            Operation::WriteFile => "write file",
            Operation::ReadFile => "read file",
            Operation::SetPermissions => "set permissions",
            Operation::ReadDir => "read directory",
            Operation::Remove => "remove",
            Operation::Symlink => "create symlink",
            Operation::ReadLink => "read symlink",
            Operation::Rename => "rename",
            Operation::Close => "close",
        };
        f.write_str(name)
    }
}

/// A failed transport operation.
#[derive(Debug, thiserror::Error)]
#[error("{op} {path}: {source}")]
pub struct TransportError {
    pub op: Operation,
    pub path: String,
    #[source]
    pub source: io::Error,
}

impl TransportError {
    pub fn new(op: Operation, path: impl Into<String>, source: io::Error) -> Self {
        Self {
            op,
            path: path.into(),
            source,
        }
    }

    /// Whether the failure was caused by a missing path.
    pub fn is_not_found(&self) -> bool {
        self.source.kind() == io::ErrorKind::NotFound
    }
}
