//! Temp Workspace Manager: per-job scratch directories under one shared root.
//!
//! Concurrency discipline: no locking. Job IDs are caller-supplied unique
//! tokens (UUID v4 in practice) and every job gets its own subdirectory, so
//! two jobs never touch the same paths. Auxiliary files keep their compile
//! names (a class file must be named after its `\documentclass`) without
//! colliding across jobs.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::render::RenderError;

/// Optional companion file compiled alongside the document (e.g. resume.cls).
#[derive(Debug, Clone)]
pub struct AuxiliaryFile {
    pub name: String,
    pub content: String,
}

/// One compilation job's inputs.
#[derive(Debug, Clone)]
pub struct CompilationRequest {
    pub source_text: String,
    pub job_id: String,
    pub auxiliary_file: Option<AuxiliaryFile>,
}

impl CompilationRequest {
    /// Rejects empty source before anything touches the filesystem or an
    /// external process.
    pub fn new(
        source_text: impl Into<String>,
        job_id: impl Into<String>,
    ) -> Result<Self, RenderError> {
        let source_text = source_text.into();
        if source_text.trim().is_empty() {
            return Err(RenderError::EmptySource);
        }
        Ok(CompilationRequest {
            source_text,
            job_id: job_id.into(),
            auxiliary_file: None,
        })
    }

    pub fn with_auxiliary_file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.auxiliary_file = Some(AuxiliaryFile {
            name: name.into(),
            content: content.into(),
        });
        self
    }
}

/// Ownership scope around the scratch directory. Files live only for the
/// duration of one pipeline invocation; cleanup leaves the final artifact.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Idempotently ensures the scratch root exists. An unusable root is
    /// fatal for the whole pipeline.
    pub async fn create(root: impl Into<PathBuf>) -> Result<Self, RenderError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Workspace { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic per-job directory: `{root}/{job_id}`.
    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Deterministic per-job path: `{root}/{job_id}/{job_id}.{ext}`.
    pub fn job_path(&self, job_id: &str, ext: &str) -> PathBuf {
        self.job_dir(job_id).join(format!("{job_id}.{ext}"))
    }

    /// Writes the LaTeX source (and the auxiliary file, if any) into the
    /// job's own directory. Returns the path of the written .tex file.
    pub async fn write_input(&self, request: &CompilationRequest) -> Result<PathBuf, RenderError> {
        let dir = self.job_dir(&request.job_id);
        fs::create_dir_all(&dir).await?;

        let tex_path = self.job_path(&request.job_id, "tex");
        fs::write(&tex_path, &request.source_text).await?;

        if let Some(aux) = &request.auxiliary_file {
            fs::write(dir.join(&aux.name), &aux.content).await?;
        }

        Ok(tex_path)
    }

    /// Reads the final artifact into memory. Ownership of the bytes
    /// transfers to the caller; the on-disk file is subject to cleanup.
    pub async fn read_artifact(&self, path: &Path) -> Result<Vec<u8>, RenderError> {
        Ok(fs::read(path).await?)
    }

    /// Best-effort deletion of everything in a job's directory, auxiliary
    /// files included. Extensions in `keep_extensions` survive; the directory
    /// itself goes once nothing is kept inside. Deletion failures are logged
    /// and swallowed; cleanup is advisory, not correctness-critical. Safe to
    /// call twice.
    pub async fn cleanup(&self, job_id: &str, keep_extensions: &[&str]) {
        let dir = self.job_dir(job_id);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cleanup skipped {}: {e}", dir.display());
                return;
            }
        };

        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    let kept = path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| keep_extensions.contains(&ext));
                    if kept {
                        continue;
                    }
                    if let Err(e) = fs::remove_file(&path).await {
                        debug!("Cleanup skipped {}: {e}", path.display());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Cleanup aborted in {}: {e}", dir.display());
                    break;
                }
            }
        }

        // Fails while a kept artifact is still inside; that is fine.
        if let Err(e) = fs::remove_dir(&dir).await {
            debug!("Cleanup left {} in place: {e}", dir.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_source_rejected() {
        let err = CompilationRequest::new("   \n", "job-1").unwrap_err();
        assert!(matches!(err, RenderError::EmptySource));
    }

    #[tokio::test]
    async fn test_write_input_creates_tex_and_aux_in_job_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path()).await.unwrap();
        let request = CompilationRequest::new("\\documentclass{article}", "job-1")
            .unwrap()
            .with_auxiliary_file("resume.cls", "% class file");

        let tex_path = ws.write_input(&request).await.unwrap();
        assert!(tex_path.exists());
        assert!(tex_path.starts_with(ws.job_dir("job-1")));
        assert!(ws.job_dir("job-1").join("resume.cls").exists());
        // Nothing lands directly under the shared root.
        assert!(!dir.path().join("resume.cls").exists());
    }

    #[tokio::test]
    async fn test_concurrent_jobs_keep_separate_class_files() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path()).await.unwrap();

        let first = CompilationRequest::new("\\documentclass{resume}", "job-a")
            .unwrap()
            .with_auxiliary_file("resume.cls", "% modern class");
        let second = CompilationRequest::new("\\documentclass{resume}", "job-b")
            .unwrap()
            .with_auxiliary_file("resume.cls", "% classic class");

        ws.write_input(&first).await.unwrap();
        ws.write_input(&second).await.unwrap();

        let a = tokio::fs::read_to_string(ws.job_dir("job-a").join("resume.cls"))
            .await
            .unwrap();
        let b = tokio::fs::read_to_string(ws.job_dir("job-b").join("resume.cls"))
            .await
            .unwrap();
        assert_eq!(a, "% modern class");
        assert_eq!(b, "% classic class");
    }

    #[tokio::test]
    async fn test_read_artifact_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path()).await.unwrap();
        let err = ws
            .read_artifact(&ws.job_path("nope", "pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_artifact_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path()).await.unwrap();

        let request = CompilationRequest::new("\\documentclass{resume}", "job-1")
            .unwrap()
            .with_auxiliary_file("resume.cls", "% class file");
        ws.write_input(&request).await.unwrap();
        for ext in ["log", "aux", "pdf"] {
            tokio::fs::write(ws.job_path("job-1", ext), b"x").await.unwrap();
        }

        ws.cleanup("job-1", &["pdf"]).await;
        assert!(!ws.job_path("job-1", "tex").exists());
        assert!(!ws.job_path("job-1", "log").exists());
        assert!(!ws.job_path("job-1", "aux").exists());
        // Auxiliary files go with the intermediates.
        assert!(!ws.job_dir("job-1").join("resume.cls").exists());
        assert!(ws.job_path("job-1", "pdf").exists());

        // Second call is a no-op, never an error.
        ws.cleanup("job-1", &["pdf"]).await;
        assert!(ws.job_path("job-1", "pdf").exists());
    }

    #[tokio::test]
    async fn test_cleanup_removes_job_dir_when_nothing_kept() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::create(dir.path()).await.unwrap();

        let request = CompilationRequest::new("\\documentclass{article}", "job-2").unwrap();
        ws.write_input(&request).await.unwrap();

        ws.cleanup("job-2", &[]).await;
        assert!(!ws.job_dir("job-2").exists());
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scratch");
        Workspace::create(&root).await.unwrap();
        Workspace::create(&root).await.unwrap();
        assert!(root.exists());
    }
}
