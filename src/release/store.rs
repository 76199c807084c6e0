// ABOUTME: Release directory layout under a destination root: list, next id, prune.
// ABOUTME: Recursive removal walks post-order with an explicit stack and never follows symlinks.

use std::io;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::ReleaseId;
use crate::transport::{Operation, Transport, TransportError, TransportResult, join};

/// Directory under the destination root holding one directory per release.
pub const RELEASES_DIR: &str = "releases";

/// Symlink in the destination root pointing at the active release.
pub const CURRENT_LINK: &str = "current";

/// Release bookkeeping for one destination root.
pub struct ReleaseStore<'a, T: Transport + ?Sized> {
    transport: &'a T,
    root: String,
}

impl<'a, T: Transport + ?Sized> ReleaseStore<'a, T> {
    pub fn new(transport: &'a T, root: impl Into<String>) -> Self {
        Self {
            transport,
            root: root.into(),
        }
    }

    pub fn releases_dir(&self) -> String {
        join(&self.root, RELEASES_DIR)
    }

    pub fn release_path(&self, id: &ReleaseId) -> String {
        join(&self.releases_dir(), &id.to_string())
    }

    pub fn current_path(&self) -> String {
        join(&self.root, CURRENT_LINK)
    }

    /// Create the releases directory (and the root) if missing.
    pub async fn ensure_releases_dir(&self) -> TransportResult<()> {
        self.transport.create_dir_all(&self.releases_dir()).await
    }

    /// All release ids, oldest first. A missing releases directory is empty.
    pub async fn list(&self) -> TransportResult<Vec<ReleaseId>> {
        let dir = self.releases_dir();
        let entries = match self.transport.read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            match entry.name.parse::<ReleaseId>() {
                Ok(id) => ids.push(id),
                Err(_) => debug!("skipping {} in {}: not a release", entry.name, dir),
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Id for a deployment starting at `now`, sorting after every existing release.
    pub async fn next_id(&self, now: DateTime<Utc>) -> TransportResult<ReleaseId> {
        let existing = self.list().await?;
        Ok(ReleaseId::next(now, existing.last()))
    }

    /// Delete the oldest releases until at most `keep` remain.
    ///
    /// Returns the ids that were removed, oldest first. The first failure
    /// aborts; releases already removed stay removed.
    pub async fn prune(&self, keep: NonZeroUsize) -> TransportResult<Vec<ReleaseId>> {
        let releases = self.list().await?;
        let excess = releases.len().saturating_sub(keep.get());

        let mut pruned = Vec::with_capacity(excess);
        for id in releases.into_iter().take(excess) {
            let path = self.release_path(&id);
            info!("deleting old release {}", path);
            remove_tree(self.transport, &path).await?;
            pruned.push(id);
        }
        Ok(pruned)
    }
}

enum Removal {
    Visit(String),
    /// Directory whose children have all been removed.
    Dir(String),
}

/// Remove `path` and everything below it.
pub async fn remove_tree<T: Transport + ?Sized>(transport: &T, path: &str) -> TransportResult<()> {
    let mut stack = vec![Removal::Visit(path.to_string())];

    while let Some(step) = stack.pop() {
        match step {
            Removal::Dir(dir) => transport.remove(&dir).await?,
            Removal::Visit(path) => {
                let meta = transport.metadata(&path).await?.ok_or_else(|| {
                    TransportError::new(
                        Operation::Remove,
                        path.as_str(),
                        io::Error::from(io::ErrorKind::NotFound),
                    )
                })?;
                if meta.is_dir() {
                    // Copied read-only directories must become writable to be emptied.
                    if meta.mode & 0o700 != 0o700 {
                        transport.set_permissions(&path, meta.mode | 0o700).await?;
                    }
                    let entries = transport.read_dir(&path).await?;
                    stack.push(Removal::Dir(path.clone()));
                    for entry in entries {
                        stack.push(Removal::Visit(join(&path, &entry.name)));
                    }
                } else {
                    debug!("removing {}", path);
                    transport.remove(&path).await?;
                }
            }
        }
    }
    Ok(())
}
