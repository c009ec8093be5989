//! Typesetting Compiler: drives the external LaTeX binary for one job.
//!
//! Success criterion: the output artifact EXISTS. The exit code is not
//! authoritative because LaTeX toolchains routinely exit non-zero on
//! warnings while still producing a usable PDF.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tracing::{info, warn};

use crate::render::process::{ProcessError, ProcessRunner};
use crate::render::workspace::{CompilationRequest, Workspace};
use crate::render::RenderError;

/// Bound on the cheap `-version` probe, separate from the compile budget.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a compilation did not yield an artifact. All kinds drive the same
/// control flow (fallback); the distinction exists for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ToolchainUnavailable,
    Timeout,
    NoArtifact,
}

/// Result of one compiler invocation.
#[derive(Debug)]
pub enum CompilationOutcome {
    Success { artifact_path: PathBuf, log: String },
    Failure {
        kind: FailureKind,
        message: String,
        log: String,
    },
}

impl CompilationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompilationOutcome::Success { .. })
    }

    fn failure(kind: FailureKind, message: String, log: String) -> Self {
        CompilationOutcome::Failure { kind, message, log }
    }
}

/// Invokes the external LaTeX binary in batch mode within the workspace.
pub struct LatexCompiler {
    binary: PathBuf,
    timeout: Duration,
    runner: Arc<dyn ProcessRunner>,
}

impl LatexCompiler {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration, runner: Arc<dyn ProcessRunner>) -> Self {
        LatexCompiler {
            binary: binary.into(),
            timeout,
            runner,
        }
    }

    pub async fn compile(
        &self,
        workspace: &Workspace,
        request: &CompilationRequest,
    ) -> Result<CompilationOutcome, RenderError> {
        self.compile_within(workspace, request, self.timeout).await
    }

    /// Compiles with an explicit bound, used when a request-level deadline is
    /// tighter than the configured compile timeout. Intermediate files are
    /// cleaned after every invocation, success or failure, keeping the pdf.
    pub async fn compile_within(
        &self,
        workspace: &Workspace,
        request: &CompilationRequest,
        limit: Duration,
    ) -> Result<CompilationOutcome, RenderError> {
        if request.source_text.trim().is_empty() {
            return Err(RenderError::EmptySource);
        }

        // A caller deadline can tighten the bound, never loosen it.
        let limit = limit.min(self.timeout);

        // Probe first: a missing toolchain is a recoverable failure, not a crash.
        if let Err(e) = self
            .runner
            .run(
                &self.binary,
                &["-version".to_string()],
                workspace.root(),
                PROBE_TIMEOUT,
            )
            .await
        {
            warn!("LaTeX toolchain probe failed: {e}");
            return Ok(CompilationOutcome::failure(
                FailureKind::ToolchainUnavailable,
                format!(
                    "LaTeX toolchain '{}' is not installed or not invocable: {e}",
                    self.binary.display()
                ),
                String::new(),
            ));
        }

        let tex_path = workspace.write_input(request).await?;
        let outcome = self.run_compiler(workspace, request, &tex_path, limit).await;
        workspace.cleanup(&request.job_id, &["pdf"]).await;
        outcome
    }

    async fn run_compiler(
        &self,
        workspace: &Workspace,
        request: &CompilationRequest,
        tex_path: &Path,
        limit: Duration,
    ) -> Result<CompilationOutcome, RenderError> {
        // Running inside the job directory keeps auxiliary files (class
        // files) resolvable by their compile names, isolated per job.
        let job_dir = workspace.job_dir(&request.job_id);
        let args = vec![
            "-interaction=nonstopmode".to_string(),
            "-halt-on-error".to_string(),
            format!("-output-directory={}", job_dir.display()),
            tex_path.display().to_string(),
        ];

        let run = self.runner.run(&self.binary, &args, &job_dir, limit);
        let output = match run.await {
            Err(ProcessError::TimedOut { .. }) => {
                return Ok(CompilationOutcome::failure(
                    FailureKind::Timeout,
                    format!("Compilation timed out after {}s", limit.as_secs()),
                    String::new(),
                ))
            }
            Err(e @ ProcessError::Spawn { .. }) => {
                return Ok(CompilationOutcome::failure(
                    FailureKind::ToolchainUnavailable,
                    e.to_string(),
                    String::new(),
                ))
            }
            Err(ProcessError::Io(e)) => return Err(e.into()),
            Ok(output) => output,
        };

        let artifact_path = workspace.job_path(&request.job_id, "pdf");
        let log = output.combined_log();

        // Ground truth is the artifact, never the exit code.
        if fs::try_exists(&artifact_path).await.unwrap_or(false) {
            if output.exit_code != Some(0) {
                info!(
                    "Compiler exited with {:?} but produced an artifact for job {}, treating as success",
                    output.exit_code, request.job_id
                );
            }
            Ok(CompilationOutcome::Success { artifact_path, log })
        } else {
            Ok(CompilationOutcome::failure(
                FailureKind::NoArtifact,
                format!(
                    "Compiler exited with {:?} and produced no output artifact",
                    output.exit_code
                ),
                log,
            ))
        }
    }
}
