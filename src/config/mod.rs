// ABOUTME: Configuration types and parsing for pasang.json.
// ABOUTME: Merges the config file with command-line overrides and validates the result.

mod destination;

pub use destination::{Destination, RemoteTarget};

use crate::deploy::DeployPlan;
use crate::error::{Error, Result};
use crate::ssh::{Auth, SessionConfig};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "pasang.json";

/// Releases kept when `keep` is absent or zero.
pub const DEFAULT_KEEP: NonZeroUsize = NonZeroUsize::new(5).unwrap();

/// The config file as written. Empty strings count as unset.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub source: Option<PathBuf>,

    #[serde(default)]
    pub dest: Option<String>,

    #[serde(default)]
    pub keep: Option<usize>,

    #[serde(default)]
    pub local: bool,

    #[serde(default)]
    pub before_run_cmd: Vec<String>,

    #[serde(default)]
    pub after_run_cmd: Vec<String>,

    #[serde(default)]
    pub ssh_password: Option<String>,

    #[serde(default)]
    pub ssh_private_key: Option<PathBuf>,

    #[serde(default)]
    pub ssh_secret_key: Option<String>,

    #[serde(default)]
    pub ssh_known_hosts: Option<PathBuf>,

    #[serde(default)]
    pub ssh_trust_first_connection: bool,

    #[serde(default, with = "humantime_serde")]
    pub hook_timeout: Option<Duration>,

    #[serde(default = "default_lock")]
    pub lock: bool,
}

fn default_lock() -> bool {
    true
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            source: None,
            dest: None,
            keep: None,
            local: false,
            before_run_cmd: Vec::new(),
            after_run_cmd: Vec::new(),
            ssh_password: None,
            ssh_private_key: None,
            ssh_secret_key: None,
            ssh_known_hosts: None,
            ssh_trust_first_connection: false,
            hook_timeout: None,
            lock: default_lock(),
        }
    }
}

/// Values given on the command line; each one replaces the file's value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub source: Option<PathBuf>,
    pub dest: Option<String>,
    pub keep: Option<NonZeroUsize>,
    pub local: bool,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub key_secret: Option<String>,
    pub known_hosts: Option<PathBuf>,
    pub trust_first_connection: bool,
    pub no_lock: bool,
}

impl Overrides {
    /// Whether the flags alone describe a run.
    pub fn is_complete(&self) -> bool {
        self.source.is_some() && self.dest.is_some()
    }
}

impl ConfigFile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Error::from)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    /// Read a config file; `.yml`/`.yaml` files are YAML, everything else JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yml" | "yaml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if overrides.source.is_some() {
            self.source = overrides.source;
        }
        if overrides.dest.is_some() {
            self.dest = overrides.dest;
        }
        if let Some(keep) = overrides.keep {
            self.keep = Some(keep.get());
        }
        self.local |= overrides.local;
        if overrides.password.is_some() {
            self.ssh_password = overrides.password;
        }
        if overrides.private_key.is_some() {
            self.ssh_private_key = overrides.private_key;
        }
        if overrides.key_secret.is_some() {
            self.ssh_secret_key = overrides.key_secret;
        }
        if overrides.known_hosts.is_some() {
            self.ssh_known_hosts = overrides.known_hosts;
        }
        self.ssh_trust_first_connection |= overrides.trust_first_connection;
        if overrides.no_lock {
            self.lock = false;
        }
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|v| !v.as_os_str().is_empty())
}

/// A validated configuration for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: PathBuf,
    pub destination: Destination,
    pub keep: NonZeroUsize,
    pub before_run_cmd: Vec<String>,
    pub after_run_cmd: Vec<String>,
    /// Required for remote destinations.
    pub auth: Option<Auth>,
    pub known_hosts: Option<PathBuf>,
    pub trust_first_connection: bool,
    pub hook_timeout: Option<Duration>,
    pub lock: bool,
}

impl Config {
    /// Validate a config file (with overrides already applied).
    pub fn resolve(file: ConfigFile) -> Result<Self> {
        let source = non_empty_path(file.source)
            .ok_or_else(|| Error::InvalidConfig("source is required".to_string()))?;
        let dest = non_empty(file.dest)
            .ok_or_else(|| Error::InvalidConfig("dest is required".to_string()))?;

        let destination = if file.local {
            Destination::Local(dest)
        } else {
            let target = RemoteTarget::parse(&dest).map_err(|reason| {
                Error::InvalidDestination {
                    dest: dest.clone(),
                    reason,
                }
            })?;
            Destination::Remote(target)
        };

        // The private key wins when both are configured.
        let auth = match (
            non_empty_path(file.ssh_private_key),
            non_empty(file.ssh_password),
        ) {
            (Some(path), _) => Some(Auth::KeyFile {
                path,
                passphrase: non_empty(file.ssh_secret_key),
            }),
            (None, Some(password)) => Some(Auth::Password(password)),
            (None, None) => None,
        };
        if auth.is_none() && !destination.is_local() {
            return Err(Error::MissingCredentials(destination.to_string()));
        }

        Ok(Config {
            source,
            destination,
            keep: file
                .keep
                .and_then(NonZeroUsize::new)
                .unwrap_or(DEFAULT_KEEP),
            before_run_cmd: file.before_run_cmd,
            after_run_cmd: file.after_run_cmd,
            auth,
            known_hosts: non_empty_path(file.ssh_known_hosts),
            trust_first_connection: file.ssh_trust_first_connection,
            hook_timeout: file.hook_timeout,
            lock: file.lock,
        })
    }

    /// Load configuration the way the CLI does.
    ///
    /// An explicit `path` must exist. Otherwise `pasang.json` in `dir` is used
    /// when present, and complete overrides stand on their own.
    pub fn load(path: Option<&Path>, dir: &Path, overrides: Overrides) -> Result<Self> {
        let file = match path {
            Some(path) => ConfigFile::load(path)?,
            None => {
                let default = dir.join(CONFIG_FILENAME);
                if default.exists() {
                    ConfigFile::load(&default)?
                } else if overrides.is_complete() {
                    ConfigFile::default()
                } else {
                    return Err(Error::ConfigNotFound(default));
                }
            }
        };
        Self::resolve(file.apply(overrides))
    }

    /// Fail unless the source exists as a directory or a regular file.
    pub fn check_source(&self) -> Result<()> {
        if self.source.is_dir() || self.source.is_file() {
            Ok(())
        } else {
            Err(Error::SourceNotFound(self.source.clone()))
        }
    }

    /// SSH settings for a remote destination.
    pub fn session_config(&self, target: &RemoteTarget) -> Result<SessionConfig> {
        let auth = self
            .auth
            .clone()
            .ok_or_else(|| Error::MissingCredentials(target.to_string()))?;
        let mut config = SessionConfig::new(&target.host, &target.user, auth)
            .port(target.port)
            .trust_on_first_use(self.trust_first_connection);
        if let Some(path) = &self.known_hosts {
            config = config.known_hosts_path(path);
        }
        Ok(config)
    }

    /// The transport-independent part of a deployment.
    pub fn plan(&self) -> DeployPlan {
        DeployPlan {
            source: self.source.clone(),
            root: self.destination.root().to_string(),
            destination: self.destination.to_string(),
            keep: self.keep,
            before_run_cmd: self.before_run_cmd.clone(),
            after_run_cmd: self.after_run_cmd.clone(),
        }
    }
}
