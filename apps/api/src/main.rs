mod config;
mod errors;
mod llm_client;
mod models;
mod render;
mod routes;
mod state;
mod templates;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::render::compiler::LatexCompiler;
use crate::render::fallback::{ChromeRasterizer, PageOptions};
use crate::render::pipeline::Pipeline;
use crate::render::process::TokioProcessRunner;
use crate::render::workspace::Workspace;
use crate::routes::build_router;
use crate::state::AppState;
use crate::templates::seed::SeedTemplateStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_directive(&config.rust_log))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ResumeForge API v{}", env!("CARGO_PKG_VERSION"));

    // Scratch workspace shared by all pipeline invocations (job IDs keep
    // concurrent jobs apart; no locking needed)
    let workspace = Workspace::create(&config.scratch_dir).await?;
    info!("Render workspace at {}", workspace.root().display());

    // LLM client
    let generator = Arc::new(LlmClient::new(config.anthropic_api_key.clone()));
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Template catalogue (in-memory seed store)
    let templates = Arc::new(SeedTemplateStore::new());

    // Document-generation pipeline: pdflatex first, headless Chrome fallback
    let compiler = LatexCompiler::new(
        config.latex_bin.clone(),
        config.compile_timeout,
        Arc::new(TokioProcessRunner),
    );
    let rasterizer = Arc::new(ChromeRasterizer::new(
        config.chrome_bin.clone(),
        PageOptions::default(),
    ));
    let pipeline = Arc::new(Pipeline::new(
        workspace,
        compiler,
        rasterizer,
        generator.clone(),
        templates.clone(),
        config.pipeline_timeout,
        config.raster_timeout,
    ));
    info!(
        "Pipeline ready (latex: {}, compile timeout: {}s)",
        config.latex_bin.display(),
        config.compile_timeout.as_secs()
    );

    // Build app state
    let state = AppState {
        pipeline,
        generator,
        templates,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Default filter directive for this crate's own events. Tracing targets use
/// the module path, where Cargo maps the package name's hyphens to
/// underscores; the raw package name would never match.
fn default_log_directive(level: &str) -> String {
    format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_log_directive_targets_module_path() {
        assert_eq!(default_log_directive("info"), "resumeforge_api=info");
    }
}
