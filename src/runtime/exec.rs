//! Synchronous execution of external commands

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to wait for {binary}: {source}")]
    Wait {
        binary: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{binary} exited with status {code}")]
    NonZeroExit { binary: PathBuf, code: i32 },
    #[error("{binary} was cancelled")]
    Cancelled { binary: PathBuf },
}

/// Where a child process stream goes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StreamTarget {
    #[default]
    Null,
    Inherit,
}

impl StreamTarget {
    fn to_stdio(self) -> Stdio {
        match self {
            StreamTarget::Null => Stdio::null(),
            StreamTarget::Inherit => Stdio::inherit(),
        }
    }
}

/// Stream wiring for one command invocation; the default discards all output
#[derive(Debug, Clone, Copy, Default)]
pub struct IoStreams {
    pub stdout: StreamTarget,
    pub stderr: StreamTarget,
}

/// Runs an external program to completion and surfaces its exit status
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        ctx: &CancellationToken,
        workdir: Option<&Path>,
        io: IoStreams,
        binary: &Path,
        args: &[String],
    ) -> Result<(), ExecError>;
}

/// CommandRunner backed by tokio subprocesses
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecRunner;

#[async_trait]
impl CommandRunner for ExecRunner {
    async fn run(
        &self,
        ctx: &CancellationToken,
        workdir: Option<&Path>,
        io: IoStreams,
        binary: &Path,
        args: &[String],
    ) -> Result<(), ExecError> {
        let mut cmd = Command::new(binary);
        cmd.args(args);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(io.stdout.to_stdio());
        cmd.stderr(io.stderr.to_stdio());

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            binary: binary.to_path_buf(),
            source,
        })?;

        let status = tokio::select! {
            status = child.wait() => status.map_err(|source| ExecError::Wait {
                binary: binary.to_path_buf(),
                source,
            })?,
            _ = ctx.cancelled() => {
                let _ = child.kill().await;
                return Err(ExecError::Cancelled {
                    binary: binary.to_path_buf(),
                });
            }
        };

        if !status.success() {
            return Err(ExecError::NonZeroExit {
                binary: binary.to_path_buf(),
                code: status.code().unwrap_or(-1),
            });
        }

        Ok(())
    }
}
