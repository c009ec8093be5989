//! In-memory template store seeded with the built-in skeletons.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;

use crate::errors::AppError;
use crate::templates::{Template, TemplateStore, TemplateSummary};

/// Single-column resume skeleton. Sticks to the package whitelist the
/// generation prompt enforces (inputenc, fontenc, geometry, hyperref,
/// xcolor, titlesec, enumitem).
const MODERN_RESUME_SKELETON: &str = r#"\documentclass[11pt,a4paper]{article}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{hyperref}
\usepackage{xcolor}
\usepackage{titlesec}
\usepackage{enumitem}

\geometry{margin=0.75in}
\titleformat{\section}{\large\bfseries}{}{0em}{}[\titlerule]
\setlist[itemize]{noitemsep, topsep=2pt, leftmargin=1.2em}

\begin{document}

\begin{center}
{\Huge \textbf{FULL NAME}} \\
\textit{TITLE} \\
\href{mailto:EMAIL}{EMAIL}
\end{center}

\section*{Summary}
SUMMARY

\section*{Skills}
\begin{itemize}
\item SKILL
\end{itemize}

\section*{Experience}
\textbf{POSITION} \hfill DATES \\
\textit{COMPANY} \\
DESCRIPTION

\section*{Education}
\textbf{DEGREE} \hfill DATES \\
\textit{INSTITUTION}

\end{document}
"#;

/// Minimal cover letter skeleton.
const COVER_LETTER_SKELETON: &str = r#"\documentclass[11pt,a4paper]{article}
\usepackage[utf8]{inputenc}
\usepackage[T1]{fontenc}
\usepackage{geometry}
\usepackage{hyperref}

\geometry{margin=1in}

\begin{document}

\begin{flushleft}
FULL NAME \\
\href{mailto:EMAIL}{EMAIL}
\end{flushleft}

Dear Hiring Manager,

BODY

Sincerely, \\
FULL NAME

\end{document}
"#;

/// In-memory catalogue of built-in templates.
pub struct SeedTemplateStore {
    templates: HashMap<String, Template>,
}

impl SeedTemplateStore {
    pub fn new() -> Self {
        let seeds = [
            Template {
                id: "modern-resume".to_string(),
                name: "Modern Resume".to_string(),
                description: "Single-column modern professional resume.".to_string(),
                category: "modern".to_string(),
                skeleton_source: MODERN_RESUME_SKELETON.to_string(),
                class_file: None,
                tags: vec!["modern".to_string(), "professional".to_string()],
                created_at: Utc::now(),
            },
            Template {
                id: "cover-letter".to_string(),
                name: "Cover Letter".to_string(),
                description: "Plain professional cover letter.".to_string(),
                category: "classic".to_string(),
                skeleton_source: COVER_LETTER_SKELETON.to_string(),
                class_file: None,
                tags: vec!["cover-letter".to_string()],
                created_at: Utc::now(),
            },
        ];

        SeedTemplateStore {
            templates: seeds.into_iter().map(|t| (t.id.clone(), t)).collect(),
        }
    }
}

impl Default for SeedTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemplateStore for SeedTemplateStore {
    async fn get_template(&self, id: &str) -> Result<Template, AppError> {
        self.templates
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Template '{id}' not found")))
    }

    async fn list_templates(&self) -> Result<Vec<TemplateSummary>, AppError> {
        let mut summaries: Vec<TemplateSummary> =
            self.templates.values().map(TemplateSummary::from).collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_known_template() {
        let store = SeedTemplateStore::new();
        let template = store.get_template("modern-resume").await.unwrap();
        assert!(template.skeleton_source.contains("\\documentclass"));
        assert!(template.skeleton_source.contains("\\end{document}"));
    }

    #[tokio::test]
    async fn test_get_unknown_template_is_not_found() {
        let store = SeedTemplateStore::new();
        let err = store.get_template("no-such-template").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_templates_is_sorted_and_complete() {
        let store = SeedTemplateStore::new();
        let summaries = store.list_templates().await.unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, "cover-letter");
        assert_eq!(summaries[1].id, "modern-resume");
    }
}
