//! Pipeline Orchestrator, the public entry point of document generation.
//!
//! State machine (linear, no backtracking):
//! START → (source_override? skip : OBTAIN_SOURCE) → COMPILE
//!       → (success? DONE : FALLBACK) → DONE | FATAL
//!
//! The orchestrator never retries the compiler on the same input (the same
//! source fails the same way) and re-asks the AI generator at most once,
//! only when structural validation of the returned source fails.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::SourceGenerator;
use crate::models::profile::{JobDescription, Profile};
use crate::render::compiler::{CompilationOutcome, LatexCompiler};
use crate::render::fallback::{to_hypertext, Rasterizer};
use crate::render::workspace::{CompilationRequest, Workspace};
use crate::render::RenderError;
use crate::templates::TemplateStore;

/// Structural markers a complete generated document must contain.
const START_MARKER: &str = "\\documentclass";
const END_MARKER: &str = "\\end{document}";

/// One regeneration is allowed after a failed validation, never more.
const MAX_GENERATION_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Resume,
    CoverLetter,
}

/// Everything needed to produce one document.
pub struct DocumentRequest {
    pub profile: Profile,
    pub job_description: JobDescription,
    pub template_id: String,
    pub answers: HashMap<String, String>,
    pub source_override: Option<String>,
    pub kind: DocumentKind,
    /// Cover-letter tone; ignored for resumes.
    pub tone: Option<String>,
}

pub struct Pipeline {
    workspace: Workspace,
    compiler: LatexCompiler,
    rasterizer: Arc<dyn Rasterizer>,
    generator: Arc<dyn SourceGenerator>,
    templates: Arc<dyn TemplateStore>,
    /// Overall budget for one invocation, shared by compile and fallback.
    budget: Duration,
    raster_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        workspace: Workspace,
        compiler: LatexCompiler,
        rasterizer: Arc<dyn Rasterizer>,
        generator: Arc<dyn SourceGenerator>,
        templates: Arc<dyn TemplateStore>,
        budget: Duration,
        raster_timeout: Duration,
    ) -> Self {
        Pipeline {
            workspace,
            compiler,
            rasterizer,
            generator,
            templates,
            budget,
            raster_timeout,
        }
    }

    /// Runs the full pipeline and returns PDF bytes, or the single structured
    /// error that describes the final outcome. Intermediate fallback attempts
    /// are never surfaced as partial errors.
    pub async fn produce_document(&self, request: DocumentRequest) -> Result<Vec<u8>, AppError> {
        let deadline = Instant::now() + self.budget;

        let template = self.templates.get_template(&request.template_id).await?;

        // OBTAIN_SOURCE (skipped when the caller supplies the source directly)
        let source = match &request.source_override {
            Some(source) if !source.trim().is_empty() => {
                info!("Using caller-supplied source override, skipping generation");
                source.clone()
            }
            _ => {
                self.obtain_source(&request, &template.skeleton_source)
                    .await?
            }
        };

        // COMPILE
        let job_id = Uuid::new_v4().to_string();
        let mut compilation = CompilationRequest::new(source.clone(), job_id.clone())
            .map_err(AppError::Pipeline)?;
        if let Some(class_file) = &template.class_file {
            compilation = compilation.with_auxiliary_file("resume.cls", class_file.clone());
        }

        let compile_limit = remaining(deadline, self.budget)?;
        info!("Compiling job {job_id} (budget {}s)", compile_limit.as_secs());
        let outcome = self
            .compiler
            .compile_within(&self.workspace, &compilation, compile_limit)
            .await
            .map_err(AppError::Pipeline)?;

        match outcome {
            CompilationOutcome::Success { artifact_path, .. } => {
                let bytes = self
                    .workspace
                    .read_artifact(&artifact_path)
                    .await
                    .map_err(AppError::Pipeline)?;
                info!("Job {job_id} compiled successfully ({} bytes)", bytes.len());
                Ok(bytes)
            }
            CompilationOutcome::Failure { kind, message, log } => {
                warn!("Job {job_id} compilation failed ({kind:?}): {message}; falling back to HTML rendering");
                self.fallback(&source, message, log, deadline)
                    .await
                    .map_err(AppError::Pipeline)
            }
        }
    }

    /// Compiles a tiny built-in document to verify the external toolchain
    /// end to end. Used by the operator check endpoint.
    pub async fn toolchain_check(&self) -> Result<CompilationOutcome, RenderError> {
        const CHECK_DOCUMENT: &str =
            "\\documentclass[11pt,a4paper]{article}\n\\begin{document}\nToolchain check.\n\\end{document}\n";
        let job_id = format!("check-{}", Uuid::new_v4());
        let request = CompilationRequest::new(CHECK_DOCUMENT, job_id)?;
        self.compiler.compile(&self.workspace, &request).await
    }

    /// FALLBACK: attempted exactly once per invocation, only after a
    /// compilation failure, with the same source text. The rasterizer owns
    /// the deadline so an expired bound also tears the browser down.
    async fn fallback(
        &self,
        source: &str,
        compile_message: String,
        compile_log: String,
        deadline: Instant,
    ) -> Result<Vec<u8>, RenderError> {
        let html = to_hypertext(source);
        let limit = remaining(deadline, self.budget)?.min(self.raster_timeout);

        match self.rasterizer.rasterize(&html, limit).await {
            Ok(bytes) => {
                info!("Fallback rendering succeeded ({} bytes)", bytes.len());
                Ok(bytes)
            }
            Err(e) => Err(RenderError::FallbackFailed {
                compile: compile_message,
                fallback: e.to_string(),
                log: compile_log,
            }),
        }
    }

    /// OBTAIN_SOURCE: asks the AI generator for LaTeX and validates that
    /// the result has the structural markers of a complete document.
    async fn obtain_source(
        &self,
        request: &DocumentRequest,
        skeleton: &str,
    ) -> Result<String, AppError> {
        let mut last_raw = String::new();

        for attempt in 1..=MAX_GENERATION_ATTEMPTS {
            let generated = match request.kind {
                DocumentKind::Resume => {
                    self.generator
                        .generate_source(
                            &request.profile,
                            &request.job_description,
                            &request.answers,
                            skeleton,
                        )
                        .await
                }
                DocumentKind::CoverLetter => {
                    let tone = request.tone.as_deref().unwrap_or("professional");
                    self.generator
                        .generate_cover_letter(
                            &request.profile,
                            &request.job_description,
                            tone,
                            skeleton,
                        )
                        .await
                }
            }
            .map_err(|e| AppError::Pipeline(RenderError::UpstreamUnavailable(e.to_string())))?;

            if generated.contains(START_MARKER) && generated.contains(END_MARKER) {
                return Ok(generated);
            }

            warn!(
                "Generated source missing document markers (attempt {attempt}/{MAX_GENERATION_ATTEMPTS})"
            );
            last_raw = generated;
        }

        Err(AppError::Pipeline(RenderError::InvalidGeneratedSource {
            reason: "generated text lacks \\documentclass and/or \\end{document}".to_string(),
            raw: last_raw,
        }))
    }
}

/// Time left before the request deadline. Exceeding it means no partial
/// artifact is ever returned.
fn remaining(deadline: Instant, budget: Duration) -> Result<Duration, RenderError> {
    let now = Instant::now();
    if now >= deadline {
        return Err(RenderError::DeadlineExceeded {
            seconds: budget.as_secs(),
        });
    }
    Ok(deadline - now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use crate::llm_client::LlmError;
    use crate::models::question::Question;
    use crate::render::process::{ProcessError, ProcessOutput, ProcessRunner};
    use crate::templates::{Template, TemplateSummary};

    const VALID_SOURCE: &str =
        "\\documentclass{article}\n\\begin{document}\nHello\n\\end{document}";
    const INVALID_SOURCE: &str = "\\documentclass{article}\n\\begin{document}\ntruncated";

    // ── Fakes ───────────────────────────────────────────────────────────

    struct FakeGenerator {
        /// Responses returned in order; the last one repeats.
        responses: Vec<String>,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn returning(responses: &[&str]) -> Self {
            FakeGenerator {
                responses: responses.iter().map(|s| s.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn next(&self) -> String {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses[n.min(self.responses.len() - 1)].clone()
        }
    }

    #[async_trait]
    impl SourceGenerator for FakeGenerator {
        async fn generate_source(
            &self,
            _profile: &Profile,
            _job: &JobDescription,
            _answers: &HashMap<String, String>,
            _skeleton: &str,
        ) -> Result<String, LlmError> {
            Ok(self.next())
        }

        async fn generate_cover_letter(
            &self,
            _profile: &Profile,
            _job: &JobDescription,
            _tone: &str,
            _skeleton: &str,
        ) -> Result<String, LlmError> {
            Ok(self.next())
        }

        async fn generate_questions(
            &self,
            _profile: &Profile,
            _job: &JobDescription,
        ) -> Result<Vec<Question>, LlmError> {
            Ok(vec![])
        }
    }

    struct FakeTemplates;

    #[async_trait]
    impl TemplateStore for FakeTemplates {
        async fn get_template(&self, id: &str) -> Result<Template, AppError> {
            Ok(Template {
                id: id.to_string(),
                name: "Fixture".to_string(),
                description: String::new(),
                category: "modern".to_string(),
                skeleton_source: VALID_SOURCE.to_string(),
                class_file: None,
                tags: vec![],
                created_at: Utc::now(),
            })
        }

        async fn list_templates(&self) -> Result<Vec<TemplateSummary>, AppError> {
            Ok(vec![])
        }
    }

    /// Compiler runner: probe always succeeds; compile writes an artifact or
    /// not depending on `succeed`.
    struct FakeRunner {
        succeed: bool,
        compile_calls: AtomicUsize,
    }

    impl FakeRunner {
        fn new(succeed: bool) -> Self {
            FakeRunner {
                succeed,
                compile_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for FakeRunner {
        async fn run(
            &self,
            _program: &Path,
            args: &[String],
            cwd: &Path,
            _timeout: Duration,
        ) -> Result<ProcessOutput, ProcessError> {
            if args == ["-version".to_string()] {
                return Ok(ProcessOutput {
                    exit_code: Some(0),
                    stdout: "pdfTeX".to_string(),
                    stderr: String::new(),
                });
            }
            self.compile_calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                let stem = Path::new(args.last().unwrap())
                    .file_stem()
                    .unwrap()
                    .to_str()
                    .unwrap();
                std::fs::write(cwd.join(format!("{stem}.pdf")), b"%PDF compiled").unwrap();
            }
            Ok(ProcessOutput {
                exit_code: Some(if self.succeed { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if self.succeed {
                    String::new()
                } else {
                    "! LaTeX Error.".to_string()
                },
            })
        }
    }

    struct FakeRasterizer {
        bytes: Option<Vec<u8>>,
        calls: AtomicUsize,
        last_limit: Mutex<Option<Duration>>,
    }

    impl FakeRasterizer {
        fn succeeding(bytes: &[u8]) -> Self {
            FakeRasterizer {
                bytes: Some(bytes.to_vec()),
                calls: AtomicUsize::new(0),
                last_limit: Mutex::new(None),
            }
        }

        fn failing() -> Self {
            FakeRasterizer {
                bytes: None,
                calls: AtomicUsize::new(0),
                last_limit: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Rasterizer for FakeRasterizer {
        async fn rasterize(&self, _html: &str, limit: Duration) -> Result<Vec<u8>, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_limit.lock().unwrap() = Some(limit);
            match &self.bytes {
                Some(bytes) => Ok(bytes.clone()),
                None => Err(RenderError::RendererUnavailable(
                    "browser failed to start".to_string(),
                )),
            }
        }
    }

    // ── Fixture plumbing ────────────────────────────────────────────────

    struct Fixture {
        pipeline: Pipeline,
        generator: Arc<FakeGenerator>,
        runner: Arc<FakeRunner>,
        rasterizer: Arc<FakeRasterizer>,
        _dir: tempfile::TempDir,
    }

    async fn fixture(
        generator: FakeGenerator,
        runner: FakeRunner,
        rasterizer: FakeRasterizer,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::create(dir.path()).await.unwrap();
        let generator = Arc::new(generator);
        let runner = Arc::new(runner);
        let rasterizer = Arc::new(rasterizer);
        let compiler = LatexCompiler::new("pdflatex", Duration::from_secs(30), runner.clone());
        let pipeline = Pipeline::new(
            workspace,
            compiler,
            rasterizer.clone(),
            generator.clone(),
            Arc::new(FakeTemplates),
            Duration::from_secs(60),
            Duration::from_secs(30),
        );
        Fixture {
            pipeline,
            generator,
            runner,
            rasterizer,
            _dir: dir,
        }
    }

    fn request(source_override: Option<&str>) -> DocumentRequest {
        DocumentRequest {
            profile: serde_json::from_value(serde_json::json!({
                "name": "Ada Lovelace",
                "email": "ada@example.com"
            }))
            .unwrap(),
            job_description: serde_json::from_value(serde_json::json!({
                "title": "Systems Engineer",
                "company": "Acme",
                "description": "Build reliable systems."
            }))
            .unwrap(),
            template_id: "modern-resume".to_string(),
            answers: HashMap::new(),
            source_override: source_override.map(str::to_string),
            kind: DocumentKind::Resume,
            tone: None,
        }
    }

    fn pipeline_err(err: AppError) -> RenderError {
        match err {
            AppError::Pipeline(inner) => inner,
            other => panic!("expected pipeline error, got {other:?}"),
        }
    }

    // ── Tests ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_source_override_skips_generation() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(true),
            FakeRasterizer::succeeding(b"unused"),
        )
        .await;

        let bytes = f
            .pipeline
            .produce_document(request(Some(VALID_SOURCE)))
            .await
            .unwrap();
        assert_eq!(bytes, b"%PDF compiled");
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_source_never_reaches_compile() {
        let f = fixture(
            FakeGenerator::returning(&[INVALID_SOURCE]),
            FakeRunner::new(true),
            FakeRasterizer::succeeding(b"unused"),
        )
        .await;

        let err = pipeline_err(f.pipeline.produce_document(request(None)).await.unwrap_err());
        match err {
            RenderError::InvalidGeneratedSource { raw, .. } => {
                assert_eq!(raw, INVALID_SOURCE, "raw AI text attached for diagnostics");
            }
            other => panic!("expected InvalidGeneratedSource, got {other:?}"),
        }
        assert_eq!(f.runner.compile_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_generation_retried_exactly_once_on_invalid_structure() {
        let f = fixture(
            FakeGenerator::returning(&[INVALID_SOURCE, VALID_SOURCE]),
            FakeRunner::new(true),
            FakeRasterizer::succeeding(b"unused"),
        )
        .await;

        let bytes = f.pipeline.produce_document(request(None)).await.unwrap();
        assert_eq!(bytes, b"%PDF compiled");
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_compile_failure_falls_back_exactly_once() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(false),
            FakeRasterizer::succeeding(b"%PDF from fallback"),
        )
        .await;

        let bytes = f.pipeline.produce_document(request(None)).await.unwrap();
        assert_eq!(bytes, b"%PDF from fallback");
        assert_eq!(f.rasterizer.calls.load(Ordering::SeqCst), 1);
        // Compiler ran once and was never retried on the same input.
        assert_eq!(f.runner.compile_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_hands_rasterizer_a_bounded_deadline() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(false),
            FakeRasterizer::succeeding(b"%PDF from fallback"),
        )
        .await;

        f.pipeline.produce_document(request(None)).await.unwrap();

        // The rasterizer enforces the deadline itself, so it must receive
        // one capped by the configured raster timeout (30s fixture).
        let limit = f.rasterizer.last_limit.lock().unwrap().unwrap();
        assert!(limit <= Duration::from_secs(30));
        assert!(limit > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_both_paths_failing_yields_composite_error() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(false),
            FakeRasterizer::failing(),
        )
        .await;

        let err = pipeline_err(f.pipeline.produce_document(request(None)).await.unwrap_err());
        match err {
            RenderError::FallbackFailed {
                compile,
                fallback,
                log,
            } => {
                assert!(compile.contains("no output artifact"));
                assert!(fallback.contains("browser failed to start"));
                assert!(log.contains("LaTeX Error"), "compiler log preserved");
            }
            other => panic!("expected FallbackFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_compile_success_returns_workspace_artifact() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(true),
            FakeRasterizer::succeeding(b"unused"),
        )
        .await;

        let bytes = f.pipeline.produce_document(request(None)).await.unwrap();
        assert_eq!(bytes, b"%PDF compiled");
        assert_eq!(f.rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cover_letter_uses_generator_with_default_tone() {
        let f = fixture(
            FakeGenerator::returning(&[VALID_SOURCE]),
            FakeRunner::new(true),
            FakeRasterizer::succeeding(b"unused"),
        )
        .await;

        let mut req = request(None);
        req.kind = DocumentKind::CoverLetter;
        let bytes = f.pipeline.produce_document(req).await.unwrap();
        assert_eq!(bytes, b"%PDF compiled");
        assert_eq!(f.generator.calls.load(Ordering::SeqCst), 1);
    }
}
