// ABOUTME: Release lifecycle primitives shared by every destination.
// ABOUTME: Ids, tree copy, retention pruning, and current-link promotion.

mod copier;
mod id;
mod store;
mod switch;

pub use copier::{CopyError, CopyStats, copy_tree};
pub use id::{ParseReleaseIdError, ReleaseId};
pub use store::{CURRENT_LINK, RELEASES_DIR, ReleaseStore, remove_tree};
pub use switch::{current_release, link_target, promote};
