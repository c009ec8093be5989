//! Template catalogue: base LaTeX skeletons the generator builds on.
//! Persistence is behind the `TemplateStore` trait; the shipped store is an
//! in-memory seed catalogue.

pub mod handlers;
pub mod seed;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A base document skeleton the AI generator is asked to fill in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// Full LaTeX skeleton handed to the generator as a starting point.
    pub skeleton_source: String,
    /// Optional class file compiled alongside the document (e.g. resume.cls).
    #[serde(default)]
    pub class_file: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Template listing entry: everything except the LaTeX payloads.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
}

impl From<&Template> for TemplateSummary {
    fn from(t: &Template) -> Self {
        TemplateSummary {
            id: t.id.clone(),
            name: t.name.clone(),
            description: t.description.clone(),
            category: t.category.clone(),
            tags: t.tags.clone(),
        }
    }
}

/// Lookup of base document skeletons by identifier.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn get_template(&self, id: &str) -> Result<Template, AppError>;
    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, AppError>;
}
