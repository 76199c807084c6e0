// ABOUTME: SSH client module for remote release destinations.
// ABOUTME: Password and key authentication, known_hosts verification, exec and SFTP.

mod client;
mod error;

pub use client::{Auth, CommandOutput, Session, SessionConfig, shell_quote};
pub use error::{Error, Result};
