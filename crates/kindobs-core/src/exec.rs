//! External command execution.
//!
//! Everything this crate does to a cluster goes through [`CommandRunner`], a
//! two-operation capability: stream a command's output to the console, or
//! capture its stdout. [`SystemRunner`] spawns real processes; the in-memory
//! [`crate::fakes::RecordingRunner`] stands in for it in tests.

use crate::constants::REDACTED;
use crate::error::ExecError;
use async_trait::async_trait;
use std::fmt;
use std::io::ErrorKind;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

const BOLD_GREEN: &str = "\x1B[1;32m";
const RESET: &str = "\x1B[0m";

/// A single command to run: program, arguments and an optional stdin payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    redactions: Vec<String>,
}

impl Invocation {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocation {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
            redactions: Vec::new(),
        }
    }

    /// Pipe `payload` to the child's stdin.
    pub fn with_stdin(mut self, payload: impl Into<String>) -> Self {
        self.stdin = Some(payload.into());
        self
    }

    /// Mask `secret` wherever it appears in the echoed command line.
    pub fn redact(mut self, secret: impl Into<String>) -> Self {
        let secret = secret.into();
        if !secret.is_empty() {
            self.redactions.push(secret);
        }
        self
    }

    /// Unmasked `program arg1 arg2 ...`.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Command line with redacted values masked, suitable for logs.
    pub fn display_line(&self) -> String {
        self.redactions
            .iter()
            .fold(self.command_line(), |line, secret| {
                line.replace(secret.as_str(), REDACTED)
            })
    }

    /// The highlighted `$ command` line printed before the command runs.
    pub fn echo_line(&self) -> String {
        format!("{BOLD_GREEN}$ {}{RESET}", self.display_line())
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_line())
    }
}

/// Capability to execute external commands.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run to completion with stdout/stderr going to the console.
    async fn run(&self, invocation: &Invocation) -> Result<(), ExecError>;

    /// Run to completion and return stdout, trimmed.
    async fn capture(&self, invocation: &Invocation) -> Result<String, ExecError>;
}

/// Runs commands as real child processes.
///
/// Each call blocks (asynchronously) until the child exits; there is no timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        SystemRunner
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        capture: bool,
    ) -> Result<Vec<u8>, ExecError> {
        println!("{}", invocation.echo_line());
        debug!(command = %invocation, capture, "spawning");

        let program = invocation.program.clone();
        let io_err = |source: std::io::Error| ExecError::Io {
            program: program.clone(),
            source,
        };

        let stdin = match (&invocation.stdin, capture) {
            (Some(_), _) => Stdio::piped(),
            (None, true) => Stdio::null(),
            (None, false) => Stdio::inherit(),
        };
        let stdout = if capture {
            Stdio::piped()
        } else {
            Stdio::inherit()
        };

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(stdin)
            .stdout(stdout)
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        // A child that exits before draining stdin closes the pipe on us; its
        // exit status is what gets reported then, not the write error.
        let mut stdin_error = None;
        if let Some(payload) = &invocation.stdin {
            if let Some(mut pipe) = child.stdin.take() {
                let written = match pipe.write_all(payload.as_bytes()).await {
                    Ok(()) => pipe.shutdown().await,
                    Err(e) => Err(e),
                };
                if let Err(e) = written {
                    if e.kind() != ErrorKind::BrokenPipe {
                        return Err(io_err(e));
                    }
                    debug!(command = %invocation, "child closed stdin early");
                    stdin_error = Some(e);
                }
            }
        }

        let output = child.wait_with_output().await.map_err(io_err)?;
        if !output.status.success() {
            // Killed by a signal: no code to forward.
            let code = output.status.code().unwrap_or(1);
            return Err(ExecError::NonZeroExit {
                program: invocation.program.clone(),
                code,
            });
        }
        if let Some(e) = stdin_error {
            return Err(io_err(e));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> Result<(), ExecError> {
        self.execute(invocation, false).await.map(|_| ())
    }

    async fn capture(&self, invocation: &Invocation) -> Result<String, ExecError> {
        let stdout = self.execute(invocation, true).await?;
        let text = String::from_utf8(stdout).map_err(|_| ExecError::InvalidOutput {
            program: invocation.program.clone(),
        })?;
        Ok(text.trim().to_string())
    }
}
