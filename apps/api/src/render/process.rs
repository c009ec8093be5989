//! External process capability. The compiler depends on this trait rather
//! than on `tokio::process` directly so tests can substitute fake runners.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

/// Captured result of one external process run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Stdout and stderr concatenated for diagnostic logs.
    pub fn combined_log(&self) -> String {
        let mut log = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !log.is_empty() {
                log.push('\n');
            }
            log.push_str(&self.stderr);
        }
        log
    }
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Binary '{binary}' could not be spawned: {source}")]
    Spawn {
        binary: String,
        source: std::io::Error,
    },

    #[error("Process timed out after {seconds}s")]
    TimedOut { seconds: u64 },

    #[error("I/O error while running process: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs one external binary to completion within a bounded timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError>;
}

/// Production runner backed by `tokio::process`. The child is killed when
/// the timeout elapses (`kill_on_drop` reaps it once the future is dropped).
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[String],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        let child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                binary: program.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProcessError::TimedOut {
                seconds: timeout.as_secs(),
            })??;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
