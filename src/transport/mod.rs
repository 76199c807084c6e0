// ABOUTME: Transport capability trait over local filesystem and remote SFTP backends.
// ABOUTME: Paths are forward-slash joined strings on both backends.

mod error;
mod local;
mod remote;
pub(crate) mod sealed;

pub use error::{Operation, TransportError};
pub use local::LocalTransport;
pub use remote::RemoteTransport;

use async_trait::async_trait;
use sealed::Sealed;
use tokio::io::AsyncWrite;

/// Writer returned by [`Transport::create_file`].
pub type FileWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Result alias for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Kind of a filesystem entry, as seen without following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// Metadata for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub kind: EntryKind,
    /// Permission bits (the low 12 bits of the mode).
    pub mode: u32,
}

impl EntryMeta {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

/// A directory entry returned by [`Transport::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// The capability set shared by every release destination.
///
/// Operations are issued one at a time; implementations do not need to be
/// re-entrant, only `Send + Sync` so a deployment future can move between
/// worker threads.
#[async_trait]
pub trait Transport: Sealed + Send + Sync {
    /// Human readable destination label for logs.
    fn describe(&self) -> String;

    /// Inspect `path` without following symlinks. `Ok(None)` if it does not exist.
    async fn metadata(&self, path: &str) -> TransportResult<Option<EntryMeta>>;

    /// Create `path` and any missing parents. Succeeds if it already exists.
    async fn create_dir_all(&self, path: &str) -> TransportResult<()>;

    /// Create or truncate a file and return a writer for its content.
    async fn create_file(&self, path: &str) -> TransportResult<FileWriter>;

    /// Create a file only if nothing exists at `path`.
    ///
    /// Returns `Ok(false)` when the path is already taken.
    async fn create_new_file(&self, path: &str, contents: &[u8]) -> TransportResult<bool>;

    /// Read a whole file.
    async fn read_file(&self, path: &str) -> TransportResult<Vec<u8>>;

    /// Set permission bits on `path`.
    async fn set_permissions(&self, path: &str, mode: u32) -> TransportResult<()>;

    /// List the entries of a directory in the order the backend yields them.
    async fn read_dir(&self, path: &str) -> TransportResult<Vec<DirEntry>>;

    /// Remove a file, a symlink, or an empty directory.
    async fn remove(&self, path: &str) -> TransportResult<()>;

    /// Create a symlink at `link` whose target is `target`.
    async fn symlink(&self, target: &str, link: &str) -> TransportResult<()>;

    /// Read the target of the symlink at `path`.
    async fn read_link(&self, path: &str) -> TransportResult<String>;

    /// Rename `from` to `to`, replacing `to` if it exists.
    async fn rename(&self, from: &str, to: &str) -> TransportResult<()>;

    /// Release backend resources. Further calls fail.
    async fn close(&self) -> TransportResult<()>;
}

/// Join two path fragments with a single forward slash.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    if base.ends_with('/') {
        format!("{}{}", base, name.trim_start_matches('/'))
    } else {
        format!("{}/{}", base, name.trim_start_matches('/'))
    }
}
