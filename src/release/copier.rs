// ABOUTME: Copies a local source tree onto a transport, preserving permission bits.
// ABOUTME: Walks the tree with an explicit stack; the first error aborts the copy.

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::transport::{Operation, Transport, TransportError, join};

/// Totals for one finished copy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

/// Errors from copying a source tree.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    #[error("failed to read source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unsupported file type at {}", .0.display())]
    Unsupported(PathBuf),

    #[error("file name is not valid UTF-8: {}", .0.display())]
    NonUtf8Name(PathBuf),

    #[error(transparent)]
    Destination(#[from] TransportError),
}

enum Step {
    Copy { src: PathBuf, dest: String },
    /// Applied once every child of the directory has been written.
    SetDirMode { dest: String, mode: u32 },
}

fn source_error(path: &Path) -> impl FnOnce(io::Error) -> CopyError + '_ {
    move |source| CopyError::Source {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy `src` (file or directory) to `dest` on `transport`.
///
/// Symlinks in the source are followed and copied as their targets. Children
/// are visited in the order the directory listing yields them. Nothing is
/// cleaned up on failure.
pub async fn copy_tree<T: Transport + ?Sized>(
    transport: &T,
    src: &Path,
    dest: &str,
) -> Result<CopyStats, CopyError> {
    let mut stats = CopyStats::default();
    let mut stack = vec![Step::Copy {
        src: src.to_path_buf(),
        dest: dest.to_string(),
    }];

    while let Some(step) = stack.pop() {
        match step {
            Step::SetDirMode { dest, mode } => {
                transport.set_permissions(&dest, mode).await?;
            }
            Step::Copy { src, dest } => {
                let meta = tokio::fs::metadata(&src)
                    .await
                    .map_err(source_error(&src))?;
                let mode = meta.permissions().mode() & 0o7777;

                if meta.is_dir() {
                    debug!("creating directory {}", dest);
                    transport.create_dir_all(&dest).await?;
                    stats.dirs += 1;

                    stack.push(Step::SetDirMode {
                        dest: dest.clone(),
                        mode,
                    });
                    let children = list_children(&src).await?;
                    // Reversed so the stack pops them in listing order.
                    for (name, path) in children.into_iter().rev() {
                        stack.push(Step::Copy {
                            src: path,
                            dest: join(&dest, &name),
                        });
                    }
                } else if meta.is_file() {
                    debug!("copying {} -> {}", src.display(), dest);
                    stats.bytes += copy_file(transport, &src, &dest, mode).await?;
                    stats.files += 1;
                } else {
                    return Err(CopyError::Unsupported(src));
                }
            }
        }
    }

    Ok(stats)
}

async fn list_children(dir: &Path) -> Result<Vec<(String, PathBuf)>, CopyError> {
    let mut children = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.map_err(source_error(dir))?;
    while let Some(entry) = entries.next_entry().await.map_err(source_error(dir))? {
        let path = entry.path();
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| CopyError::NonUtf8Name(path.clone()))?;
        children.push((name, path));
    }
    Ok(children)
}

async fn copy_file<T: Transport + ?Sized>(
    transport: &T,
    src: &Path,
    dest: &str,
    mode: u32,
) -> Result<u64, CopyError> {
    let mut reader = tokio::fs::File::open(src)
        .await
        .map_err(source_error(src))?;
    let mut writer = transport.create_file(dest).await?;
    transport.set_permissions(dest, mode).await?;

    let bytes = tokio::io::copy(&mut reader, &mut writer)
        .await
        .map_err(|e| TransportError::new(Operation::WriteFile, dest, e))?;
    writer
        .shutdown()
        .await
        .map_err(|e| TransportError::new(Operation::WriteFile, dest, e))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::LocalTransport;
    use std::fs;
    use tempfile::TempDir;

    fn dest(dir: &TempDir, name: &str) -> String {
        dir.path().join(name).to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn copies_single_file() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let file = src.path().join("hello.txt");
        fs::write(&file, b"hello").unwrap();

        let stats = copy_tree(&LocalTransport::new(), &file, &dest(&out, "copy.txt"))
            .await
            .unwrap();

        assert_eq!(stats, CopyStats { files: 1, dirs: 0, bytes: 5 });
        assert_eq!(fs::read(out.path().join("copy.txt")).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn missing_source_is_a_source_error() {
        let out = TempDir::new().unwrap();
        let err = copy_tree(
            &LocalTransport::new(),
            Path::new("/definitely/not/here"),
            &dest(&out, "x"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CopyError::Source { .. }));
    }

    #[tokio::test]
    async fn symlinks_are_copied_as_targets() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        fs::write(src.path().join("real.txt"), b"data").unwrap();
        std::os::unix::fs::symlink("real.txt", src.path().join("alias.txt")).unwrap();

        copy_tree(&LocalTransport::new(), src.path(), &dest(&out, "tree"))
            .await
            .unwrap();

        let alias = out.path().join("tree/alias.txt");
        assert!(!fs::symlink_metadata(&alias).unwrap().file_type().is_symlink());
        assert_eq!(fs::read(alias).unwrap(), b"data");
    }

    #[tokio::test]
    async fn fifo_is_rejected() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let fifo = src.path().join("pipe");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status();
        if !status.map(|s| s.success()).unwrap_or(false) {
            return;
        }

        let err = copy_tree(&LocalTransport::new(), src.path(), &dest(&out, "tree"))
            .await
            .unwrap_err();
        assert!(matches!(err, CopyError::Unsupported(path) if path == fifo));
    }
}
