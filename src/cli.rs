// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Flags override the config file; with --src and --dest they can replace it.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pasang::config::Overrides;
use pasang::output::OutputMode;

#[derive(Parser)]
#[command(name = "pasang")]
#[command(about = "Publish timestamped releases of a directory, locally or over SSH")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file, JSON or YAML by extension [default: pasang.json]
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Source directory or file to publish
    #[arg(long, global = true)]
    pub src: Option<PathBuf>,

    /// Destination: a path with --local, otherwise user@host[:port]:path
    #[arg(long, global = true)]
    pub dest: Option<String>,

    /// Number of releases to keep
    #[arg(long, global = true)]
    pub keep: Option<NonZeroUsize>,

    /// Treat the destination as a local directory
    #[arg(long, global = true)]
    pub local: bool,

    /// SSH password
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// SSH private key file
    #[arg(long, global = true)]
    pub privkey: Option<PathBuf>,

    /// Passphrase for the SSH private key
    #[arg(long, global = true)]
    pub keysecret: Option<String>,

    /// known_hosts file used to verify the remote host [default: ~/.ssh/known_hosts]
    #[arg(long, global = true)]
    pub known_hosts: Option<PathBuf>,

    /// Accept and remember the host key of an unknown host
    #[arg(long, global = true)]
    pub trust_first_connection: bool,

    /// Break an existing deploy lock
    #[arg(long, global = true)]
    pub force: bool,

    /// Do not take the deploy lock
    #[arg(long, global = true)]
    pub no_lock: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Default, Clone, Copy)]
pub enum Commands {
    /// Publish a new release and make it current (the default)
    #[default]
    Deploy,

    /// List releases at the destination
    Releases,
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    /// Log filter used when RUST_LOG is not set.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "pasang=debug,info"
        } else if self.quiet {
            "warn"
        } else {
            "pasang=info,warn"
        }
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            source: self.src.clone(),
            dest: self.dest.clone(),
            keep: self.keep,
            local: self.local,
            password: self.password.clone(),
            private_key: self.privkey.clone(),
            key_secret: self.keysecret.clone(),
            known_hosts: self.known_hosts.clone(),
            trust_first_connection: self.trust_first_connection,
            no_lock: self.no_lock,
        }
    }
}
