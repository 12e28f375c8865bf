use std::{
    fmt,
    path::{Path, PathBuf},
    process::Stdio,
};
use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::manifest::DRUPAL_CORE_PACKAGE;

/// The composer invocations the tool knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerCommand {
    Install,
    /// Update everything, letting transitive constraints move too.
    Update,
    /// Update only `drupal/core` and whatever it drags along.
    UpdateDrupal,
}

impl ComposerCommand {
    pub fn args(&self) -> Vec<&'static str> {
        let mut args = match self {
            ComposerCommand::Install => vec!["install"],
            ComposerCommand::Update => vec!["update", "--with-all-dependencies"],
            ComposerCommand::UpdateDrupal => {
                vec!["update", DRUPAL_CORE_PACKAGE, "--with-all-dependencies"]
            }
        };
        args.extend(["--no-interaction", "--no-ansi"]);
        args
    }

    pub fn description(&self) -> &'static str {
        match self {
            ComposerCommand::Install => "Running composer install",
            ComposerCommand::Update => "Running composer update",
            ComposerCommand::UpdateDrupal => "Updating drupal core",
        }
    }
}

impl fmt::Display for ComposerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "composer {}", self.args().join(" "))
    }
}

/// What came back from one run. `exit_error` is set when the process could
/// not be started or exited unsuccessfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    pub exit_error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_error.is_none()
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: ComposerCommand, directory: &Path) -> CommandResult;
}

/// Runs the composer executable as a child process, arguments passed
/// directly, never through a shell.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: ComposerCommand, directory: &Path) -> CommandResult {
        debug!(program = %self.program.display(), %command, dir = %directory.display(), "spawning");

        let output = Command::new(&self.program)
            .args(command.args())
            .current_dir(directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(%command, %err, "failed to spawn");
                return CommandResult {
                    exit_error: Some(format!(
                        "failed to run {} in {}: {}",
                        self.program.display(),
                        directory.display(),
                        err
                    )),
                    ..Default::default()
                };
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!(%command, status = %output.status, "finished");

        let exit_error = (!output.status.success()).then(|| {
            let mut message = format!("`{}` failed: {}", command, output.status);
            if !stderr.trim().is_empty() {
                message.push('\n');
                message.push_str(stderr.trim_end());
            }
            message
        });

        CommandResult { exit_error, stdout, stderr }
    }
}
