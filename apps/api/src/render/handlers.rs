//! Axum route handlers for the document-generation API.

use std::collections::HashMap;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::profile::{JobDescription, Profile};
use crate::models::question::Question;
use crate::render::compiler::CompilationOutcome;
use crate::render::pipeline::{DocumentKind, DocumentRequest};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateDocumentRequest {
    pub profile: Profile,
    pub job_description: JobDescription,
    pub template_id: String,
    #[serde(default)]
    pub answers: HashMap<String, String>,
    #[serde(default)]
    pub source_override: Option<String>,
    /// Cover-letter tone (formal | enthusiastic | professional).
    #[serde(default)]
    pub tone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuestionsRequest {
    pub profile: Profile,
    pub job_description: JobDescription,
}

#[derive(Debug, Serialize)]
pub struct GenerateQuestionsResponse {
    pub questions: Vec<Question>,
}

#[derive(Debug, Serialize)]
pub struct ToolchainCheckResponse {
    pub status: String,
    pub detail: String,
    pub log: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/documents/resume
///
/// Full pipeline: AI source generation (unless overridden) → LaTeX compile →
/// HTML fallback. Responds with raw PDF bytes or the JSON error envelope.
pub async fn handle_generate_resume(
    State(state): State<AppState>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Result<Response, AppError> {
    validate(&request)?;
    let bytes = state
        .pipeline
        .produce_document(into_pipeline_request(request, DocumentKind::Resume))
        .await?;
    Ok(pdf_response(bytes, "resume.pdf"))
}

/// POST /api/v1/documents/cover-letter
pub async fn handle_generate_cover_letter(
    State(state): State<AppState>,
    Json(request): Json<GenerateDocumentRequest>,
) -> Result<Response, AppError> {
    validate(&request)?;
    let bytes = state
        .pipeline
        .produce_document(into_pipeline_request(request, DocumentKind::CoverLetter))
        .await?;
    Ok(pdf_response(bytes, "cover_letter.pdf"))
}

/// POST /api/v1/ai/questions
///
/// Returns normalized clarifying questions for the profile/job pair.
pub async fn handle_generate_questions(
    State(state): State<AppState>,
    Json(request): Json<GenerateQuestionsRequest>,
) -> Result<Json<GenerateQuestionsResponse>, AppError> {
    if request.job_description.description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description.description cannot be empty".to_string(),
        ));
    }

    let questions = state
        .generator
        .generate_questions(&request.profile, &request.job_description)
        .await
        .map_err(|e| AppError::Llm(format!("Question generation failed: {e}")))?;

    Ok(Json(GenerateQuestionsResponse { questions }))
}

/// GET /api/v1/render/check
///
/// Compiles a tiny built-in document to verify the external toolchain end to
/// end. Reports the outcome instead of erroring so operators can probe it.
pub async fn handle_toolchain_check(
    State(state): State<AppState>,
) -> Result<Json<ToolchainCheckResponse>, AppError> {
    let outcome = state
        .pipeline
        .toolchain_check()
        .await
        .map_err(AppError::Pipeline)?;

    let response = match outcome {
        CompilationOutcome::Success { log, .. } => ToolchainCheckResponse {
            status: "ok".to_string(),
            detail: "LaTeX toolchain compiled the check document".to_string(),
            log,
        },
        CompilationOutcome::Failure { message, log, .. } => ToolchainCheckResponse {
            status: "unavailable".to_string(),
            detail: message,
            log,
        },
    };

    Ok(Json(response))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

fn validate(request: &GenerateDocumentRequest) -> Result<(), AppError> {
    if request.template_id.trim().is_empty() {
        return Err(AppError::Validation(
            "template_id is required".to_string(),
        ));
    }
    if request.profile.name.trim().is_empty() || request.profile.email.trim().is_empty() {
        return Err(AppError::Validation(
            "profile.name and profile.email are required".to_string(),
        ));
    }
    if request.job_description.description.trim().is_empty() {
        return Err(AppError::Validation(
            "job_description.description cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn into_pipeline_request(request: GenerateDocumentRequest, kind: DocumentKind) -> DocumentRequest {
    DocumentRequest {
        profile: request.profile,
        job_description: request.job_description,
        template_id: request.template_id,
        answers: request.answers,
        source_override: request.source_override,
        kind,
        tone: request.tone,
    }
}

fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Bytes::from(bytes),
    )
        .into_response()
}
