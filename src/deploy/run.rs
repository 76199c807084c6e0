// ABOUTME: Runs a configured deployment end to end over the right transport.
// ABOUTME: Owns the SSH session and closes everything it opened, whatever the outcome.

use tracing::info;

use crate::config::{Config, Destination, RemoteTarget};
use crate::diagnostics::{Diagnostics, Warning};
use crate::error::Result;
use crate::hooks::{CommandRunner, LocalRunner, RemoteRunner};
use crate::release::{ReleaseId, ReleaseStore, current_release};
use crate::ssh::Session;
use crate::transport::{LocalTransport, RemoteTransport, Transport};

use super::{DeployError, DeployLock, DeployPlan, DeployReport, Deployment};

/// Knobs that only make sense for a single invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Break an existing deploy lock regardless of its age.
    pub force_lock: bool,
}

/// Releases present at a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseListing {
    /// Oldest first.
    pub releases: Vec<ReleaseId>,
    pub current: Option<ReleaseId>,
}

/// Publish one release as described by `config`.
///
/// Lock release, SFTP close and SSH disconnect happen after the deployment
/// in that order; their failures land in `diag` rather than the result.
pub async fn run(
    config: &Config,
    options: DeployOptions,
    diag: &mut Diagnostics,
) -> Result<DeployReport> {
    let plan = config.plan();
    info!("deploying {} to {}", plan.source.display(), plan.destination);

    match &config.destination {
        Destination::Local(_) => {
            let transport = LocalTransport::new();
            let runner = LocalRunner::new(config.hook_timeout);
            deploy_with(config, &plan, &transport, &runner, &runner, options, diag).await
        }
        Destination::Remote(target) => {
            let session = connect(config, target).await?;
            let result = deploy_remote(config, &plan, &session, options, diag).await;
            disconnect(session, target, diag).await;
            result
        }
    }
}

/// List the releases at the configured destination and the one `current` names.
pub async fn list_releases(config: &Config, diag: &mut Diagnostics) -> Result<ReleaseListing> {
    let root = config.destination.root();
    match &config.destination {
        Destination::Local(_) => inspect(&LocalTransport::new(), root).await,
        Destination::Remote(target) => {
            let session = connect(config, target).await?;
            let result = match RemoteTransport::open(&session).await {
                Ok(transport) => {
                    let result = inspect(&transport, root).await;
                    close(&transport, diag).await;
                    result
                }
                Err(e) => Err(e.into()),
            };
            disconnect(session, target, diag).await;
            result
        }
    }
}

async fn connect(config: &Config, target: &RemoteTarget) -> Result<Session> {
    info!("connecting to {}", target.address());
    let session = Session::connect(config.session_config(target)?).await?;
    Ok(session)
}

async fn disconnect(session: Session, target: &RemoteTarget, diag: &mut Diagnostics) {
    if let Err(e) = session.disconnect().await {
        diag.warn(Warning::ssh_disconnect(format!(
            "failed to disconnect from {}: {}",
            target.address(),
            e
        )));
    }
}

async fn close<T: Transport + ?Sized>(transport: &T, diag: &mut Diagnostics) {
    if let Err(e) = transport.close().await {
        diag.warn(Warning::transport_close(format!(
            "failed to close {}: {}",
            transport.describe(),
            e
        )));
    }
}

async fn deploy_remote(
    config: &Config,
    plan: &DeployPlan,
    session: &Session,
    options: DeployOptions,
    diag: &mut Diagnostics,
) -> Result<DeployReport> {
    let transport = RemoteTransport::open(session).await?;
    let before = LocalRunner::new(config.hook_timeout);
    let after = RemoteRunner::new(session, config.hook_timeout);
    let result = deploy_with(config, plan, &transport, &before, &after, options, diag).await;
    close(&transport, diag).await;
    result
}

async fn deploy_with<T: Transport + ?Sized>(
    config: &Config,
    plan: &DeployPlan,
    transport: &T,
    before: &dyn CommandRunner,
    after: &dyn CommandRunner,
    options: DeployOptions,
    diag: &mut Diagnostics,
) -> Result<DeployReport> {
    let lock = if config.lock {
        Some(
            DeployLock::acquire(transport, &plan.root, &plan.destination, options.force_lock)
                .await?,
        )
    } else {
        None
    };

    let mut deployment = Deployment::new(plan, transport, before, after);
    let result = deployment.run().await;

    if let Some(lock) = lock
        && let Err(e) = lock.release().await
    {
        diag.warn(Warning::lock_release(e.to_string()));
    }

    Ok(result?)
}

async fn inspect<T: Transport + ?Sized>(transport: &T, root: &str) -> Result<ReleaseListing> {
    let store = ReleaseStore::new(transport, root);
    let releases = store.list().await.map_err(DeployError::Transport)?;
    let current = current_release(transport, root)
        .await
        .map_err(DeployError::Transport)?;
    Ok(ReleaseListing { releases, current })
}
