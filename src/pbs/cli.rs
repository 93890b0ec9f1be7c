// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! PBS CLI integration: run `pbsnodes` / `qstat` with a bounded timeout.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;

/// External command failed to produce usable output
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` did not finish within {}s", .timeout.as_secs())]
    Timeout { command: String, timeout: Duration },
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// A fully specified scheduler invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl SchedulerCommand {
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl fmt::Display for SchedulerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Executes scheduler commands and returns their stdout
pub trait CommandRunner {
    fn run(&self, command: &SchedulerCommand) -> Result<Vec<u8>, CommandError>;
}

/// Runs commands as child processes on a private single-threaded runtime.
///
/// The child is killed when the timeout elapses.
pub struct SystemRunner {
    runtime: tokio::runtime::Runtime,
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { runtime, timeout })
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command: &SchedulerCommand) -> Result<Vec<u8>, CommandError> {
        let command_line = command.to_string();
        tracing::debug!(command = %command_line, timeout_s = self.timeout.as_secs(), "running scheduler command");

        self.runtime.block_on(async {
            let mut cmd = tokio::process::Command::new(&command.program);
            cmd.args(&command.args)
                .stdin(Stdio::null())
                .kill_on_drop(true);

            let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
                Err(_) => {
                    return Err(CommandError::Timeout {
                        command: command_line,
                        timeout: self.timeout,
                    })
                }
                Ok(Err(source)) => {
                    return Err(CommandError::Spawn {
                        command: command_line,
                        source,
                    })
                }
                Ok(Ok(output)) => output,
            };

            if !output.status.success() {
                return Err(CommandError::Failed {
                    command: command_line,
                    status: output.status.to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            Ok(output.stdout)
        })
    }
}

/// The two PBS queries this tool issues
pub struct PbsCli {
    runner: Box<dyn CommandRunner>,
    pbsnodes: PathBuf,
    qstat: PathBuf,
}

impl PbsCli {
    pub fn new(runner: Box<dyn CommandRunner>, pbsnodes: impl Into<PathBuf>, qstat: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            pbsnodes: pbsnodes.into(),
            qstat: qstat.into(),
        }
    }

    /// `pbsnodes -av -F json`
    pub fn node_query(&self) -> SchedulerCommand {
        SchedulerCommand::new(&self.pbsnodes, &["-av", "-F", "json"])
    }

    /// `qstat -f -F json`, with `-x` to include finished jobs
    pub fn job_query(&self, include_finished: bool) -> SchedulerCommand {
        let flags = if include_finished { "-fx" } else { "-f" };
        SchedulerCommand::new(&self.qstat, &[flags, "-F", "json"])
    }

    pub fn fetch_nodes(&self) -> Result<Vec<u8>, CommandError> {
        self.runner.run(&self.node_query())
    }

    pub fn fetch_jobs(&self, include_finished: bool) -> Result<Vec<u8>, CommandError> {
        self.runner.run(&self.job_query(include_finished))
    }
}
