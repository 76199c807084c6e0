// ABOUTME: Command module aggregator for the pasang CLI.
// ABOUTME: Re-exports the deploy and releases command handlers.

mod deploy;
mod releases;

pub use deploy::deploy;
pub use releases::releases;
