//! External command execution
//!
//! Every subprocess snova starts goes through [`CommandRunner`], so the
//! orchestrator and the process-manager resolver can be driven by a scripted
//! runner in tests.

pub mod shell;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::SnovaError;

/// Exit status shells use for "command not found"
pub const EXIT_NOT_FOUND: i32 = 127;

/// A shell command line with its working directory and extra environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub command: String,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Capture stdout/stderr instead of inheriting the terminal
    pub capture: bool,
}

impl CommandSpec {
    /// A command whose output streams to the terminal
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            cwd: None,
            env: Vec::new(),
            capture: false,
        }
    }

    /// A command whose output is captured for inspection
    pub fn captured(command: impl Into<String>) -> Self {
        Self {
            capture: true,
            ..Self::new(command)
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// The executable could not be found
    pub fn is_not_found(&self) -> bool {
        self.code == Some(EXIT_NOT_FOUND)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// Turn a non-zero exit into [`SnovaError::CommandFailed`]
    pub fn into_result(self, command: &str) -> Result<CommandOutput, SnovaError> {
        if self.success() {
            Ok(self)
        } else {
            Err(SnovaError::CommandFailed {
                command: command.to_string(),
                code: self.code,
                output: self.combined().trim().to_string(),
            })
        }
    }
}

/// Runs external commands, blocking the caller until they exit
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command. A non-zero exit is not an error at this level.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SnovaError>;

    /// Run a command and fail on non-zero exit
    async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, SnovaError> {
        self.run(spec).await?.into_result(&spec.command)
    }
}
