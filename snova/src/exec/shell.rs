//! Shell-backed command runner

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::SnovaError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};

/// Runs commands through `bash -c`
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SnovaError> {
        debug!("Running command: {}", spec.command);

        let mut command = Command::new(&self.shell);
        command.args(["-c", &spec.command]);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            command.env(key, value);
        }

        if spec.capture {
            let output = command
                .stdin(Stdio::null())
                .output()
                .await
                .map_err(|e| SnovaError::Internal(format!("Failed to run {}: {}", spec.command, e)))?;

            Ok(CommandOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        } else {
            let status = command
                .status()
                .await
                .map_err(|e| SnovaError::Internal(format!("Failed to run {}: {}", spec.command, e)))?;

            Ok(CommandOutput {
                code: status.code(),
                ..Default::default()
            })
        }
    }
}
