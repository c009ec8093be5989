pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::render::handlers as render_handlers;
use crate::state::AppState;
use crate::templates::handlers as template_handlers;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Template catalogue
        .route(
            "/api/v1/templates",
            get(template_handlers::handle_list_templates),
        )
        .route(
            "/api/v1/templates/:id",
            get(template_handlers::handle_get_template),
        )
        // AI clarifying questions
        .route(
            "/api/v1/ai/questions",
            post(render_handlers::handle_generate_questions),
        )
        // Document generation pipeline
        .route(
            "/api/v1/documents/resume",
            post(render_handlers::handle_generate_resume),
        )
        .route(
            "/api/v1/documents/cover-letter",
            post(render_handlers::handle_generate_cover_letter),
        )
        // Operator toolchain probe
        .route(
            "/api/v1/render/check",
            get(render_handlers::handle_toolchain_check),
        )
        .with_state(state)
}
