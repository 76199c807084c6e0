// ABOUTME: Before/after hook commands run around a release copy.
// ABOUTME: Commands go through a CommandRunner so they can run locally or over SSH.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::release::ReleaseId;
use crate::ssh::{self, Session, shell_quote};

/// When a hook list runs relative to the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    /// Against the source tree, before anything is copied.
    Before,
    /// Inside the new release, after the copy finished.
    After,
}

impl HookPhase {
    pub fn name(&self) -> &'static str {
        match self {
            HookPhase::Before => "before",
            HookPhase::After => "after",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub phase: HookPhase,
    pub source: PathBuf,
    pub dest: String,
    /// Set once the release id is known, i.e. for after-hooks.
    pub release: Option<(ReleaseId, String)>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("PASANG_PHASE".to_string(), self.phase.to_string()),
            (
                "PASANG_SOURCE".to_string(),
                self.source.to_string_lossy().into_owned(),
            ),
            ("PASANG_DEST".to_string(), self.dest.clone()),
        ];
        if let Some((id, path)) = &self.release {
            env.push(("PASANG_RELEASE".to_string(), id.to_string()));
            env.push(("PASANG_RELEASE_PATH".to_string(), path.clone()));
        }
        env
    }
}

/// One shell command and where to run it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookCommand {
    pub command: String,
    pub dir: String,
    pub env: Vec<(String, String)>,
}

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOutput {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Standard output and standard error together, in the order written.
    pub output: String,
}

impl HookOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Errors from running hook commands.
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("command `{command}` failed with {}: {}", exit_label(.exit_code), .output.trim())]
    Failed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{command}` timed out after {}", seconds(.timeout))]
    Timeout { command: String, timeout: Duration },

    #[error("remote command `{command}` failed: {source}")]
    Remote {
        command: String,
        #[source]
        source: ssh::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

fn seconds(timeout: &Duration) -> String {
    format!("{}s", timeout.as_secs_f64())
}

/// Executes hook commands somewhere.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Where commands run, for log lines.
    fn location(&self) -> String;

    /// Run one command to completion. A non-zero exit is not an error here.
    async fn run(&self, command: &HookCommand) -> Result<HookOutput, HookError>;
}

/// Runs commands through `sh -c` on this machine.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner {
    timeout: Option<Duration>,
}

impl LocalRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    fn location(&self) -> String {
        "local".to_string()
    }

    async fn run(&self, command: &HookCommand) -> Result<HookOutput, HookError> {
        // Both streams share one pipe so the output keeps its arrival order.
        let child = Command::new("sh")
            .arg("-c")
            .arg(format!("exec 2>&1\n{}", command.command))
            .current_dir(&command.dir)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let result = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child).await.map_err(|_| {
                HookError::Timeout {
                    command: command.command.clone(),
                    timeout,
                }
            })?,
            None => child.await,
        };
        let output = result.map_err(|source| HookError::Spawn {
            command: command.command.clone(),
            source,
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        Ok(HookOutput {
            exit_code: output.status.code(),
            output: combined,
        })
    }
}

/// Runs each command on its own exec channel of an SSH session.
pub struct RemoteRunner<'a> {
    session: &'a Session,
    timeout: Option<Duration>,
}

impl<'a> RemoteRunner<'a> {
    pub fn new(session: &'a Session, timeout: Option<Duration>) -> Self {
        Self { session, timeout }
    }
}

/// The shell line a remote hook runs: cd, exports, then the command.
pub fn remote_command_line(command: &HookCommand) -> String {
    let mut line = format!("cd {}", shell_quote(&command.dir));
    if !command.env.is_empty() {
        line.push_str(" && export");
        for (key, value) in &command.env {
            line.push_str(&format!(" {}={}", key, shell_quote(value)));
        }
    }
    line.push_str(" && ");
    line.push_str(&command.command);
    line
}

#[async_trait]
impl CommandRunner for RemoteRunner<'_> {
    fn location(&self) -> String {
        let config = self.session.config();
        format!("{}@{}", config.user, config.host)
    }

    async fn run(&self, command: &HookCommand) -> Result<HookOutput, HookError> {
        let line = remote_command_line(command);
        let timeout = self
            .timeout
            .unwrap_or(self.session.config().command_timeout);

        let output = self
            .session
            .exec_with_timeout(&line, timeout)
            .await
            .map_err(|source| match source {
                ssh::Error::CommandTimeout(timeout) => HookError::Timeout {
                    command: command.command.clone(),
                    timeout,
                },
                source => HookError::Remote {
                    command: command.command.clone(),
                    source,
                },
            })?;

        Ok(HookOutput {
            exit_code: Some(i32::try_from(output.exit_code).unwrap_or(i32::MAX)),
            output: output.combined,
        })
    }
}

/// Run `commands` in order in `dir`; the first failing command stops the list.
///
/// Returns how many commands ran.
pub async fn run_hooks(
    runner: &dyn CommandRunner,
    context: &HookContext,
    dir: &str,
    commands: &[String],
) -> Result<usize, HookError> {
    let env = context.to_env();
    for command in commands {
        tracing::info!(
            "running {} hook on {} in {}: {}",
            context.phase,
            runner.location(),
            dir,
            command
        );
        let hook = HookCommand {
            command: command.clone(),
            dir: dir.to_string(),
            env: env.clone(),
        };
        let result = runner.run(&hook).await?;

        let output = result.output.trim_end();
        if !output.is_empty() {
            tracing::info!("{}", output);
        }
        if !result.success() {
            tracing::warn!(
                "{} hook failed with exit code {:?}",
                context.phase,
                result.exit_code
            );
            return Err(HookError::Failed {
                command: hook.command,
                exit_code: result.exit_code,
                output: result.output,
            });
        }
    }
    Ok(commands.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(release: Option<(ReleaseId, String)>) -> HookContext {
        HookContext {
            phase: HookPhase::After,
            source: PathBuf::from("/home/me/site"),
            dest: "deploy@web:/srv/site".to_string(),
            release,
        }
    }

    fn lookup<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
        env.iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn phase_names() {
        assert_eq!(HookPhase::Before.to_string(), "before");
        assert_eq!(HookPhase::After.to_string(), "after");
    }

    #[test]
    fn hook_context_to_env() {
        let env = context(Some((
            ReleaseId::new(1_700_000_000, 0),
            "/srv/site/releases/1700000000".to_string(),
        )))
        .to_env();

        assert_eq!(lookup(&env, "PASANG_PHASE"), Some("after"));
        assert_eq!(lookup(&env, "PASANG_SOURCE"), Some("/home/me/site"));
        assert_eq!(lookup(&env, "PASANG_DEST"), Some("deploy@web:/srv/site"));
        assert_eq!(lookup(&env, "PASANG_RELEASE"), Some("1700000000"));
        assert_eq!(
            lookup(&env, "PASANG_RELEASE_PATH"),
            Some("/srv/site/releases/1700000000")
        );
    }

    #[test]
    fn hook_context_without_release() {
        let env = context(None).to_env();
        assert!(lookup(&env, "PASANG_RELEASE").is_none());
        assert!(lookup(&env, "PASANG_RELEASE_PATH").is_none());
    }

    #[test]
    fn remote_line_quotes_dir_and_values() {
        let line = remote_command_line(&HookCommand {
            command: "make install".to_string(),
            dir: "/srv/it's here".to_string(),
            env: vec![("PASANG_PHASE".to_string(), "after".to_string())],
        });
        assert_eq!(
            line,
            "cd '/srv/it'\\''s here' && export PASANG_PHASE='after' && make install"
        );
    }

    #[test]
    fn remote_line_without_env() {
        let line = remote_command_line(&HookCommand {
            command: "true".to_string(),
            dir: "/tmp".to_string(),
            env: Vec::new(),
        });
        assert_eq!(line, "cd '/tmp' && true");
    }

    #[test]
    fn failed_error_names_command_and_output() {
        let err = HookError::Failed {
            command: "npm test".to_string(),
            exit_code: Some(2),
            output: "1 failing\n".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "command `npm test` failed with exit code 2: 1 failing"
        );
    }
}
