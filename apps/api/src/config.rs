use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Only the LLM API key is required; everything else has a sane default.
#[derive(Debug, Clone)]
pub struct Config {
    pub anthropic_api_key: String,
    /// Path or name of the external LaTeX compiler binary.
    pub latex_bin: PathBuf,
    /// Root of the per-job scratch directory used by the render workspace.
    pub scratch_dir: PathBuf,
    /// Upper bound for a single compiler invocation.
    pub compile_timeout: Duration,
    /// Upper bound for the fallback rasterization step.
    pub raster_timeout: Duration,
    /// Overall budget for one pipeline invocation (compile + fallback).
    pub pipeline_timeout: Duration,
    /// Explicit Chrome/Chromium binary for the fallback renderer, if any.
    pub chrome_bin: Option<PathBuf>,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            latex_bin: std::env::var("LATEX_BIN")
                .unwrap_or_else(|_| "pdflatex".to_string())
                .into(),
            scratch_dir: std::env::var("RENDER_SCRATCH_DIR")
                .unwrap_or_else(|_| "tmp/render".to_string())
                .into(),
            compile_timeout: duration_env("COMPILE_TIMEOUT_SECS", 60)?,
            raster_timeout: duration_env("RASTER_TIMEOUT_SECS", 30)?,
            pipeline_timeout: duration_env("PIPELINE_TIMEOUT_SECS", 120)?,
            chrome_bin: std::env::var("CHROME_BIN").ok().map(PathBuf::from),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn duration_env(key: &str, default_secs: u64) -> Result<Duration> {
    let secs = match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("{key} must be a positive integer number of seconds"))?,
        Err(_) => default_secs,
    };
    Ok(Duration::from_secs(secs))
}
