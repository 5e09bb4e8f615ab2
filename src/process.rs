use crate::types::error::ProcessError;
use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use tokio::process::Command;

/// Captured result of an external command
#[derive(Debug)]
pub struct CommandOutput {
    pub command: String,
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Turn a non-zero exit into a ProcessError
    pub fn check(self) -> Result<Self, ProcessError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ProcessError::Failed {
                command: self.command,
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Render a program and its arguments for logs and error messages
pub fn command_line(program: &str, args: &[OsString]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run a program with an explicit argument list and wait for it to exit
///
/// No shell is involved. stdin is closed; stdout and stderr are captured.
/// There is no timeout: the call blocks until the program exits.
pub async fn run(program: &str, args: &[OsString]) -> Result<CommandOutput, ProcessError> {
    let command = command_line(program, args);
    tracing::debug!("Running: {}", command);

    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;

    let result = CommandOutput {
        command,
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    tracing::debug!("{} exited with {}", program, result.status);
    Ok(result)
}
