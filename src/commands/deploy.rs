// ABOUTME: Deploy command implementation.
// ABOUTME: Runs one deployment, racing it against Ctrl-C, and reports the outcome.

use pasang::config::Config;
use pasang::deploy::{self, DeployOptions};
use pasang::diagnostics::Diagnostics;
use pasang::error::{Error, Result};
use pasang::output::Output;

/// Publish a release to the configured destination.
pub async fn deploy(config: Config, force: bool, output: &mut Output) -> Result<()> {
    output.start_timer();
    output.progress(&format!(
        "Deploying {} to {}",
        config.source.display(),
        config.destination
    ));

    let mut diag = Diagnostics::default();
    let options = DeployOptions { force_lock: force };

    let result = tokio::select! {
        result = deploy::run(&config, options, &mut diag) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; a deploy lock left behind can be broken with --force");
            Err(Error::Interrupted)
        }
    };

    // Emit collected warnings
    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    let report = result?;
    output.deployed(&report);
    Ok(())
}
