//! Axum route handlers for the template catalogue.

use axum::{
    extract::{Path, State},
    Json,
};

use crate::errors::AppError;
use crate::state::AppState;
use crate::templates::{Template, TemplateSummary};

/// GET /api/v1/templates
pub async fn handle_list_templates(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateSummary>>, AppError> {
    Ok(Json(state.templates.list_templates().await?))
}

/// GET /api/v1/templates/:id
pub async fn handle_get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Template>, AppError> {
    Ok(Json(state.templates.get_template(&id).await?))
}
