// ABOUTME: Remote transport over one SFTP session layered on an SSH connection.
// ABOUTME: Rename-over-existing falls back to an exec channel because SFTPv3 rename refuses to replace.

use std::io;

use async_trait::async_trait;
use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, OpenFlags, StatusCode};
use tokio::io::AsyncWriteExt;

use super::error::{Operation, TransportError};
use super::sealed::Sealed;
use super::{DirEntry, EntryKind, EntryMeta, FileWriter, Transport, TransportResult};
use crate::ssh::{Session, shell_quote};

/// Release destination on a remote host.
pub struct RemoteTransport<'a> {
    session: &'a Session,
    sftp: SftpSession,
}

impl std::fmt::Debug for RemoteTransport<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTransport")
            .field("session", self.session)
            .field("sftp", &"<SftpSession>")
            .finish()
    }
}

impl<'a> RemoteTransport<'a> {
    /// Open the SFTP subsystem on `session`.
    pub async fn open(session: &'a Session) -> crate::ssh::Result<Self> {
        let sftp = session.sftp().await?;
        Ok(Self { session, sftp })
    }

    async fn exists(&self, path: &str) -> TransportResult<bool> {
        self.sftp
            .try_exists(path)
            .await
            .map_err(wrap(Operation::Inspect, path))
    }
}

impl Sealed for RemoteTransport<'_> {}

/// Convert an SFTP failure into an io::Error so callers can match on kind.
pub(crate) fn sftp_to_io(err: SftpError) -> io::Error {
    let kind = match &err {
        SftpError::Status(status) => match status.status_code {
            StatusCode::NoSuchFile => io::ErrorKind::NotFound,
            StatusCode::PermissionDenied => io::ErrorKind::PermissionDenied,
            StatusCode::OpUnsupported => io::ErrorKind::Unsupported,
            StatusCode::NoConnection | StatusCode::ConnectionLost => {
                io::ErrorKind::ConnectionAborted
            }
            _ => io::ErrorKind::Other,
        },
        SftpError::Timeout => io::ErrorKind::TimedOut,
        _ => io::ErrorKind::Other,
    };
    io::Error::new(kind, err)
}

fn wrap(op: Operation, path: &str) -> impl FnOnce(SftpError) -> TransportError + '_ {
    move |e| TransportError::new(op, path, sftp_to_io(e))
}

fn entry_meta(attrs: &FileAttributes) -> EntryMeta {
    let kind = if attrs.is_symlink() {
        EntryKind::Symlink
    } else if attrs.is_dir() {
        EntryKind::Dir
    } else if attrs.is_regular() {
        EntryKind::File
    } else {
        EntryKind::Other
    };
    EntryMeta {
        kind,
        mode: attrs.permissions.unwrap_or(0) & 0o7777,
    }
}

/// Every prefix of `path` that names a directory, shortest first.
fn ancestors(path: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    let mut current = if path.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };
    for part in path.split('/').filter(|p| !p.is_empty() && *p != ".") {
        if !current.is_empty() && !current.ends_with('/') {
            current.push('/');
        }
        current.push_str(part);
        prefixes.push(current.clone());
    }
    prefixes
}

#[async_trait]
impl Transport for RemoteTransport<'_> {
    fn describe(&self) -> String {
        let config = self.session.config();
        format!("{}@{}:{}", config.user, config.host, config.port)
    }

    async fn metadata(&self, path: &str) -> TransportResult<Option<EntryMeta>> {
        match self.sftp.symlink_metadata(path).await {
            Ok(attrs) => Ok(Some(entry_meta(&attrs))),
            Err(SftpError::Status(status)) if status.status_code == StatusCode::NoSuchFile => {
                Ok(None)
            }
            Err(e) => Err(TransportError::new(Operation::Inspect, path, sftp_to_io(e))),
        }
    }

    async fn create_dir_all(&self, path: &str) -> TransportResult<()> {
        for dir in ancestors(path) {
            if self.exists(&dir).await? {
                continue;
            }
            if let Err(e) = self.sftp.create_dir(dir.as_str()).await {
                // Lost a race with another creator; only fail if it is still missing.
                if !self.exists(&dir).await? {
                    return Err(TransportError::new(Operation::CreateDir, dir, sftp_to_io(e)));
                }
            }
        }
        Ok(())
    }

    async fn create_file(&self, path: &str) -> TransportResult<FileWriter> {
        let file = self
            .sftp
            .create(path)
            .await
            .map_err(wrap(Operation::CreateFile, path))?;
        Ok(Box::new(file))
    }

    async fn create_new_file(&self, path: &str, contents: &[u8]) -> TransportResult<bool> {
        let flags = OpenFlags::CREATE | OpenFlags::EXCLUDE | OpenFlags::WRITE;
        let mut file = match self.sftp.open_with_flags(path, flags).await {
            Ok(file) => file,
            // SFTPv3 servers report an exclusive-create collision as a generic failure.
            Err(e) => {
                if self.exists(path).await? {
                    return Ok(false);
                }
                return Err(TransportError::new(Operation::CreateFile, path, sftp_to_io(e)));
            }
        };
        file.write_all(contents)
            .await
            .map_err(|e| TransportError::new(Operation::WriteFile, path, e))?;
        file.shutdown()
            .await
            .map_err(|e| TransportError::new(Operation::WriteFile, path, e))?;
        Ok(true)
    }

    async fn read_file(&self, path: &str) -> TransportResult<Vec<u8>> {
        self.sftp
            .read(path)
            .await
            .map_err(wrap(Operation::ReadFile, path))
    }

    async fn set_permissions(&self, path: &str, mode: u32) -> TransportResult<()> {
        let attrs = FileAttributes {
            permissions: Some(mode & 0o7777),
            ..FileAttributes::empty()
        };
        self.sftp
            .set_metadata(path, attrs)
            .await
            .map_err(wrap(Operation::SetPermissions, path))
    }

    async fn read_dir(&self, path: &str) -> TransportResult<Vec<DirEntry>> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(wrap(Operation::ReadDir, path))?;
        Ok(entries
            .map(|entry| DirEntry {
                kind: entry_meta(&entry.metadata()).kind,
                name: entry.file_name(),
            })
            .collect())
    }

    async fn remove(&self, path: &str) -> TransportResult<()> {
        let attrs = self
            .sftp
            .symlink_metadata(path)
            .await
            .map_err(wrap(Operation::Remove, path))?;
        let result = if entry_meta(&attrs).is_dir() {
            self.sftp.remove_dir(path).await
        } else {
            self.sftp.remove_file(path).await
        };
        result.map_err(wrap(Operation::Remove, path))
    }

    async fn symlink(&self, target: &str, link: &str) -> TransportResult<()> {
        // OpenSSH's sftp-server reads SSH_FXP_SYMLINK arguments as (target, link).
        self.sftp
            .symlink(target, link)
            .await
            .map_err(wrap(Operation::Symlink, link))
    }

    async fn read_link(&self, path: &str) -> TransportResult<String> {
        self.sftp
            .read_link(path)
            .await
            .map_err(wrap(Operation::ReadLink, path))
    }

    async fn rename(&self, from: &str, to: &str) -> TransportResult<()> {
        if self.metadata(to).await?.is_none() {
            return self
                .sftp
                .rename(from, to)
                .await
                .map_err(wrap(Operation::Rename, from));
        }

        let command = format!("mv -f -T -- {} {}", shell_quote(from), shell_quote(to));
        match self.session.exec(&command).await {
            Ok(output) if output.success() => return Ok(()),
            Ok(output) => tracing::warn!(
                "atomic rename of {} failed (exit {}): {}",
                from,
                output.exit_code,
                output.combined.trim()
            ),
            Err(e) => tracing::warn!("atomic rename of {} failed: {}", from, e),
        }

        tracing::warn!("falling back to remove and rename for {}", to);
        self.remove(to).await?;
        self.sftp
            .rename(from, to)
            .await
            .map_err(wrap(Operation::Rename, from))
    }

    async fn close(&self) -> TransportResult<()> {
        self.sftp
            .close()
            .await
            .map_err(wrap(Operation::Close, "sftp session"))
    }
}
