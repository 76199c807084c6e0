// ABOUTME: Deployment destination: a local directory or user@host[:port]:path.
// ABOUTME: Parses the remote form strictly; anything ambiguous is a configuration error.

use std::fmt;

/// Where releases are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Local(String),
    Remote(RemoteTarget),
}

impl Destination {
    /// Destination root path as the transport sees it.
    pub fn root(&self) -> &str {
        match self {
            Destination::Local(path) => path,
            Destination::Remote(target) => &target.path,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Destination::Local(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Local(path) => f.write_str(path),
            Destination::Remote(target) => target.fmt(f),
        }
    }
}

/// A directory on a host reached over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl RemoteTarget {
    /// Parse `user@host:path` or `user@host:port:path`.
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        let (user, rest) = match s.split('@').collect::<Vec<_>>()[..] {
            [user, rest] => (user, rest),
            _ => return Err("expected exactly one '@' in user@host[:port]:path".to_string()),
        };

        let (host, port, path) = match rest.split(':').collect::<Vec<_>>()[..] {
            [host, path] => (host, 22, path),
            [host, port, path] => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| format!("invalid port: {}", port))?;
                (host, port, path)
            }
            [_] => return Err("missing remote path after host".to_string()),
            _ => return Err("too many ':' separators".to_string()),
        };

        if user.is_empty() {
            return Err("user cannot be empty".to_string());
        }
        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }
        if path.is_empty() {
            return Err("remote path cannot be empty".to_string());
        }

        Ok(RemoteTarget {
            user: user.to_string(),
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// `host:port`, the address the SSH connection dials.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}:{}", self.user, self.host, self.port, self.path)
    }
}
