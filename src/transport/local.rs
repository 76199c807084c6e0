// ABOUTME: Local filesystem transport backed by tokio::fs.
// ABOUTME: Maps each capability directly onto the corresponding OS call.

use std::fs::{FileType, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::error::{Operation, TransportError};
use super::sealed::Sealed;
use super::{DirEntry, EntryKind, EntryMeta, FileWriter, Transport, TransportResult};

/// Direct filesystem access.
#[derive(Debug, Clone, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Sealed for LocalTransport {}

pub(crate) fn entry_kind(file_type: FileType) -> EntryKind {
    if file_type.is_symlink() {
        EntryKind::Symlink
    } else if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

fn wrap(op: Operation, path: &str) -> impl FnOnce(io::Error) -> TransportError + '_ {
    move |e| TransportError::new(op, path, e)
}

#[async_trait]
impl Transport for LocalTransport {
    fn describe(&self) -> String {
        "local filesystem".to_string()
    }

    async fn metadata(&self, path: &str) -> TransportResult<Option<EntryMeta>> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => Ok(Some(EntryMeta {
                kind: entry_kind(meta.file_type()),
                mode: meta.permissions().mode() & 0o7777,
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TransportError::new(Operation::Inspect, path, e)),
        }
    }

    async fn create_dir_all(&self, path: &str) -> TransportResult<()> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(wrap(Operation::CreateDir, path))
    }

    async fn create_file(&self, path: &str) -> TransportResult<FileWriter> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(wrap(Operation::CreateFile, path))?;
        Ok(Box::new(file))
    }

    async fn create_new_file(&self, path: &str, contents: &[u8]) -> TransportResult<bool> {
        let mut file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(TransportError::new(Operation::CreateFile, path, e)),
        };
        file.write_all(contents)
            .await
            .map_err(wrap(Operation::WriteFile, path))?;
        file.shutdown()
            .await
            .map_err(wrap(Operation::WriteFile, path))?;
        Ok(true)
    }

    async fn read_file(&self, path: &str) -> TransportResult<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .map_err(wrap(Operation::ReadFile, path))
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> TransportResult<()> {
        tokio::fs::set_permissions(path, Permissions::from_mode(mode & 0o7777))
            .await
            .map_err(wrap(Operation::SetPermissions, path))
    }

    async fn read_dir(&self, path: &str) -> TransportResult<Vec<DirEntry>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(path)
            .await
            .map_err(wrap(Operation::ReadDir, path))?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(wrap(Operation::ReadDir, path))?
        {
            let file_type = entry
                .file_type()
                .await
                .map_err(wrap(Operation::ReadDir, path))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: entry_kind(file_type),
            });
        }
        Ok(entries)
    }

    async fn remove(&self, path: &str) -> TransportResult<()> {
        let meta = tokio::fs::symlink_metadata(path)
            .await
            .map_err(wrap(Operation::Remove, path))?;
        let result = if meta.file_type().is_dir() {
            tokio::fs::remove_dir(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        result.map_err(wrap(Operation::Remove, path))
    }

    async fn symlink(&self, target: &str, link: &str) -> TransportResult<()> {
        tokio::fs::symlink(target, link)
            .await
            .map_err(wrap(Operation::Symlink, link))
    }

    async fn read_link(&self, path: &str) -> TransportResult<String> {
        let target = tokio::fs::read_link(path)
            .await
            .map_err(wrap(Operation::ReadLink, path))?;
        Ok(target.to_string_lossy().into_owned())
    }

    async fn rename(&self, from: &str, to: &str) -> TransportResult<()> {
        tokio::fs::rename(from, to)
            .await
            .map_err(wrap(Operation::Rename, from))
    }

    async fn close(&self) -> TransportResult<()> {
        Ok(())
    }
}
