//! Document-generation pipeline: LaTeX compilation with an HTML fallback.
//!
//! Flow: obtain source (override or AI) → validate markers → compile via the
//! external toolchain → on failure, convert to HTML and rasterize with a
//! headless browser → return PDF bytes.

pub mod compiler;
pub mod fallback;
pub mod handlers;
pub mod pipeline;
pub mod process;
pub mod workspace;

use axum::http::StatusCode;
use thiserror::Error;

/// Errors the pipeline can surface to a caller. Recoverable compilation
/// failures (toolchain missing, timeout, no artifact) never appear here;
/// they trigger the fallback path and only the final outcome is reported.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Source text is empty")]
    EmptySource,

    #[error("Generated source is structurally invalid: {reason}")]
    InvalidGeneratedSource { reason: String, raw: String },

    #[error("AI generator unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Fallback renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Compilation failed ({compile}) and fallback rendering failed ({fallback})")]
    FallbackFailed {
        compile: String,
        fallback: String,
        log: String,
    },

    #[error("Pipeline deadline exceeded after {seconds}s")]
    DeadlineExceeded { seconds: u64 },

    #[error("Workspace I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Stable machine-readable code surfaced in the HTTP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            RenderError::EmptySource => "EMPTY_SOURCE",
            RenderError::InvalidGeneratedSource { .. } => "INVALID_GENERATED_SOURCE",
            RenderError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            RenderError::RendererUnavailable(_) => "RENDERER_UNAVAILABLE",
            RenderError::FallbackFailed { .. } => "FALLBACK_FAILED",
            RenderError::DeadlineExceeded { .. } => "DEADLINE_EXCEEDED",
            RenderError::Io(_) => "IO_ERROR",
        }
    }

    /// Raw diagnostic text attached to the error response when available.
    /// Compiler logs are preferred over generic messages.
    pub fn diagnostic_log(&self) -> Option<&str> {
        match self {
            RenderError::FallbackFailed { log, .. } if !log.is_empty() => Some(log),
            RenderError::InvalidGeneratedSource { raw, .. } if !raw.is_empty() => Some(raw),
            _ => None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RenderError::EmptySource => StatusCode::BAD_REQUEST,
            RenderError::InvalidGeneratedSource { .. } | RenderError::UpstreamUnavailable(_) => {
                StatusCode::BAD_GATEWAY
            }
            RenderError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            RenderError::RendererUnavailable(_)
            | RenderError::FallbackFailed { .. }
            | RenderError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
