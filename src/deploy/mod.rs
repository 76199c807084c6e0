// ABOUTME: Deployment orchestration over a transport.
// ABOUTME: Exports the orchestrator, its states and errors, the deploy lock, and the driver.

mod deployment;
mod error;
mod lock;
mod run;
mod state;

pub use deployment::{DeployPlan, DeployReport, Deployment};
pub use error::{DeployError, DeployErrorKind, LockHolderInfo};
pub use lock::{DeployLock, LOCK_FILE, LockInfo};
pub use run::{DeployOptions, ReleaseListing, list_releases, run};
pub use state::{DeployState, Stage};
