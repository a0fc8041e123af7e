// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Explicit subprocess invocation with checked exit status

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Bytes of stderr kept in a [`ProcessError::NonZeroExit`]
const STDERR_TAIL_BYTES: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to launch `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{program}` exited with {}: {stderr}", describe_code(.code))]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("status {}", code),
        None => "no status (terminated by signal)".to_string(),
    }
}

fn tail(text: &str, max_bytes: usize) -> String {
    let trimmed = text.trim_end();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - max_bytes;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    format!("...{}", &trimmed[start..])
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run to completion; a non-zero exit is an error
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError>;
}

/// Runs commands with `tokio::process`, capturing stdout and stderr.
/// Stdout lines are logged as they arrive so long runs show progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

async fn forward_stdout<R>(program: &str, stdout: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut captured = String::new();
    let Some(stdout) = stdout else {
        return Ok(captured);
    };

    let mut lines = BufReader::new(stdout).lines();
    while let Some(line) = lines.next_line().await? {
        debug!(target: "detection_node::process", "{}: {}", program, line);
        captured.push_str(&line);
        captured.push('\n');
    }
    Ok(captured)
}

async fn collect_stderr<R>(stderr: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    if let Some(mut stderr) = stderr {
        stderr.read_to_end(&mut bytes).await?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, command: &CommandSpec) -> Result<ProcessOutput, ProcessError> {
        debug!("Running `{}`", command);

        let spawn_error = |source| ProcessError::Spawn {
            program: command.program.clone(),
            source,
        };

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(spawn_error)?;

        // Drain both pipes together so neither can fill up and stall the child
        let (stdout, stderr) = tokio::join!(
            forward_stdout(&command.program, child.stdout.take()),
            collect_stderr(child.stderr.take()),
        );
        let status = child.wait().await.map_err(spawn_error)?;

        let result = ProcessOutput {
            status_code: status.code(),
            stdout: stdout.map_err(spawn_error)?,
            stderr: stderr.map_err(spawn_error)?,
        };

        if !status.success() {
            return Err(ProcessError::NonZeroExit {
                program: command.program.clone(),
                code: result.status_code,
                stderr: tail(&result.stderr, STDERR_TAIL_BYTES),
            });
        }

        Ok(result)
    }
}
