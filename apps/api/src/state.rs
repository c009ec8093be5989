use std::sync::Arc;

use crate::llm_client::SourceGenerator;
use crate::render::pipeline::Pipeline;
use crate::templates::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// The document-generation pipeline (compile → fallback).
    pub pipeline: Arc<Pipeline>,
    /// AI collaborator, also used directly by the questions endpoint.
    pub generator: Arc<dyn SourceGenerator>,
    pub templates: Arc<dyn TemplateStore>,
}
