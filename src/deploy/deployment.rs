// ABOUTME: Deployment orchestrator driving one release through every stage.
// ABOUTME: Generic over the transport so local and remote runs share one sequence.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::hooks::{CommandRunner, HookContext, HookPhase, run_hooks};
use crate::release::{CopyStats, ReleaseId, ReleaseStore, copy_tree, promote};
use crate::transport::Transport;

use super::DeployError;
use super::state::{DeployState, Stage};

/// What to publish and where, independent of the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    /// Local source directory or single file.
    pub source: PathBuf,
    /// Destination root as seen by the transport.
    pub root: String,
    /// Destination as the user wrote it, for logs and hook env.
    pub destination: String,
    pub keep: NonZeroUsize,
    pub before_run_cmd: Vec<String>,
    pub after_run_cmd: Vec<String>,
}

/// Result of a successful deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub release: ReleaseId,
    pub release_path: String,
    /// Releases deleted by retention, oldest first.
    pub pruned: Vec<ReleaseId>,
    pub stats: CopyStats,
}

/// One deployment run.
///
/// Before-hooks run through `before_runner` in the source directory, or in
/// the parent directory of a single-file source.
/// After-hooks run through `after_runner` in the new release directory, so
/// for a remote destination that runner executes on the remote host.
pub struct Deployment<'a, T: Transport + ?Sized> {
    plan: &'a DeployPlan,
    transport: &'a T,
    before_runner: &'a dyn CommandRunner,
    after_runner: &'a dyn CommandRunner,
    state: DeployState,
}

impl<'a, T: Transport + ?Sized> Deployment<'a, T> {
    pub fn new(
        plan: &'a DeployPlan,
        transport: &'a T,
        before_runner: &'a dyn CommandRunner,
        after_runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            plan,
            transport,
            before_runner,
            after_runner,
            state: DeployState::Pending,
        }
    }

    /// The state reached so far.
    pub fn state(&self) -> DeployState {
        self.state
    }

    /// Run every stage, naming the release after the current time.
    pub async fn run(&mut self) -> Result<DeployReport, DeployError> {
        self.run_at(Utc::now()).await
    }

    /// Run every stage, naming the release after `now`.
    ///
    /// On failure the state is `Failed(stage)` and whatever was already
    /// written to the destination stays there.
    pub async fn run_at(&mut self, now: DateTime<Utc>) -> Result<DeployReport, DeployError> {
        let result = self.execute(now).await;
        match &result {
            Ok(report) => {
                self.state = DeployState::Done;
                info!(
                    "release {} is live at {} ({} files, {} bytes)",
                    report.release, report.release_path, report.stats.files, report.stats.bytes
                );
            }
            Err(e) => {
                let stage = match self.state {
                    DeployState::Running(stage) => stage,
                    _ => Stage::Validating,
                };
                self.state = DeployState::Failed(stage);
                error!("deployment failed while {}: {}", stage, e);
            }
        }
        result
    }

    fn advance(&mut self) {
        self.state = match self.state {
            DeployState::Running(stage) => match stage.next() {
                Some(next) => DeployState::Running(next),
                None => DeployState::Running(stage),
            },
            _ => DeployState::Running(Stage::Validating),
        };
    }

    async fn execute(&mut self, now: DateTime<Utc>) -> Result<DeployReport, DeployError> {
        let plan = self.plan;
        let store = ReleaseStore::new(self.transport, plan.root.as_str());

        self.state = DeployState::Running(Stage::Validating);
        let source_dir = self.validate().await?;

        self.advance();
        let context = HookContext {
            phase: HookPhase::Before,
            source: plan.source.clone(),
            dest: plan.destination.clone(),
            release: None,
        };
        run_hooks(self.before_runner, &context, &source_dir, &plan.before_run_cmd)
            .await
            .map_err(DeployError::hook(HookPhase::Before))?;

        self.advance();
        store
            .ensure_releases_dir()
            .await
            .map_err(|e| DeployError::Copy(e.into()))?;
        let release = store.next_id(now).await.map_err(DeployError::Transport)?;
        let release_path = store.release_path(&release);
        info!(
            "copying {} to {} on {}",
            plan.source.display(),
            release_path,
            self.transport.describe()
        );
        let stats = copy_tree(self.transport, &plan.source, &release_path).await?;

        self.advance();
        let context = HookContext {
            phase: HookPhase::After,
            release: Some((release, release_path.clone())),
            ..context
        };
        run_hooks(self.after_runner, &context, &release_path, &plan.after_run_cmd)
            .await
            .map_err(DeployError::hook(HookPhase::After))?;

        self.advance();
        let pruned = store.prune(plan.keep).await.map_err(DeployError::Prune)?;

        self.advance();
        info!("promoting release {}", release);
        promote(self.transport, &plan.root, &release)
            .await
            .map_err(DeployError::Promotion)?;

        Ok(DeployReport {
            release,
            release_path,
            pruned,
            stats,
        })
    }

    /// Check the source and return the directory before-hooks run in.
    ///
    /// A single-file source runs its hooks in the file's parent directory.
    async fn validate(&self) -> Result<String, DeployError> {
        let source = &self.plan.source;
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|_| DeployError::SourceNotFound(source.clone()))?;
        if meta.is_dir() {
            return Ok(source.to_string_lossy().into_owned());
        }
        if !meta.is_file() {
            return Err(DeployError::SourceNotFound(source.clone()));
        }
        let dir = match source.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok(dir.to_string_lossy().into_owned())
    }
}
