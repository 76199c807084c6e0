// ABOUTME: Releases command implementation.
// ABOUTME: Lists the releases at the destination and marks the current one.

use pasang::config::Config;
use pasang::deploy::list_releases;
use pasang::diagnostics::Diagnostics;
use pasang::error::Result;
use pasang::output::Output;

/// Show the releases present at the configured destination.
pub async fn releases(config: Config, output: &mut Output) -> Result<()> {
    let mut diag = Diagnostics::default();
    let result = list_releases(&config, &mut diag).await;

    for warning in diag.warnings() {
        output.warning(&warning.message);
    }

    output.releases(&result?);
    Ok(())
}
