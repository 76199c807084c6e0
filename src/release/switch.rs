// ABOUTME: Promotes a release by swapping the current symlink.
// ABOUTME: A temporary link is renamed over current so readers never see it missing.

use tracing::debug;

use super::store::{CURRENT_LINK, RELEASES_DIR};
use super::ReleaseId;
use crate::transport::{Transport, TransportResult, join};

/// Link target for `id`, relative to the destination root.
pub fn link_target(id: &ReleaseId) -> String {
    join(RELEASES_DIR, &id.to_string())
}

/// Point `<root>/current` at `releases/<id>`.
pub async fn promote<T: Transport + ?Sized>(
    transport: &T,
    root: &str,
    id: &ReleaseId,
) -> TransportResult<()> {
    let current = join(root, CURRENT_LINK);
    let staged = join(root, &format!("{}.tmp-{}", CURRENT_LINK, id));

    // Leftover from an interrupted run; absence is the normal case.
    if let Err(e) = transport.remove(&staged).await
        && !e.is_not_found()
    {
        debug!("ignoring failure to remove stale link: {}", e);
    }

    transport.symlink(&link_target(id), &staged).await?;
    transport.rename(&staged, &current).await
}

/// The release `current` points at, if it exists and names a release.
pub async fn current_release<T: Transport + ?Sized>(
    transport: &T,
    root: &str,
) -> TransportResult<Option<ReleaseId>> {
    let target = match transport.read_link(&join(root, CURRENT_LINK)).await {
        Ok(target) => target,
        Err(e) if e.is_not_found() => return Ok(None),
        Err(e) => return Err(e),
    };
    let name = target.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    Ok(name.parse().ok())
}
