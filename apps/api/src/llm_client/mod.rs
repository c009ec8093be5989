/// LLM Client: the single point of entry for all AI calls in ResumeForge.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module, and the rest of the
/// codebase consumes it only through the `SourceGenerator` trait.
///
/// Model: claude-sonnet-4-5 (hardcoded, do not make configurable to prevent drift)
use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::profile::{JobDescription, Profile};
use crate::models::question::{normalize_questions, Question, RawQuestion};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The model used for all LLM calls in ResumeForge.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "claude-sonnet-4-5";
const MAX_TOKENS: u32 = 4096;
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Produces LaTeX source and clarifying questions from profile + job data.
/// The pipeline depends on this trait, never on the concrete client, so
/// tests can substitute canned generators.
#[async_trait]
pub trait SourceGenerator: Send + Sync {
    /// Generates a complete LaTeX resume document tailored to the job.
    async fn generate_source(
        &self,
        profile: &Profile,
        job: &JobDescription,
        answers: &HashMap<String, String>,
        skeleton: &str,
    ) -> Result<String, LlmError>;

    /// Generates a complete LaTeX cover letter document.
    async fn generate_cover_letter(
        &self,
        profile: &Profile,
        job: &JobDescription,
        tone: &str,
        skeleton: &str,
    ) -> Result<String, LlmError>;

    /// Generates clarifying questions to fill gaps before generation.
    async fn generate_questions(
        &self,
        profile: &Profile,
        job: &JobDescription,
    ) -> Result<Vec<Question>, LlmError>;
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by all services in ResumeForge.
/// Wraps the Anthropic Messages API with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Makes a raw call to the Claude API, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: MODEL,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                // Try to parse error message
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: input_tokens={}, output_tokens={}",
                llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let response = self.call(prompt, system).await?;

        let text = response.text().ok_or(LlmError::EmptyContent)?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_code_fences(text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }

    /// Calls the LLM and returns the LaTeX document sliced out of the
    /// response. Models occasionally wrap the document in prose or fences;
    /// when no document markers are found the raw text is returned as-is and
    /// the pipeline's structural validation rejects it.
    async fn call_latex(&self, prompt: &str, system: &str) -> Result<String, LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_code_fences(text);
        Ok(extract_document(text).unwrap_or(text).to_string())
    }
}

#[async_trait]
impl SourceGenerator for LlmClient {
    async fn generate_source(
        &self,
        profile: &Profile,
        job: &JobDescription,
        answers: &HashMap<String, String>,
        skeleton: &str,
    ) -> Result<String, LlmError> {
        let prompt = prompts::build_resume_prompt(profile, job, answers, skeleton)?;
        self.call_latex(&prompt, prompts::RESUME_SYSTEM).await
    }

    async fn generate_cover_letter(
        &self,
        profile: &Profile,
        job: &JobDescription,
        tone: &str,
        skeleton: &str,
    ) -> Result<String, LlmError> {
        let prompt = prompts::build_cover_letter_prompt(profile, job, tone, skeleton)?;
        self.call_latex(&prompt, prompts::COVER_LETTER_SYSTEM).await
    }

    async fn generate_questions(
        &self,
        profile: &Profile,
        job: &JobDescription,
    ) -> Result<Vec<Question>, LlmError> {
        let prompt = prompts::build_questions_prompt(profile, job)?;
        let raw: Vec<RawQuestion> = self.call_json(&prompt, prompts::QUESTIONS_SYSTEM).await?;
        Ok(normalize_questions(raw))
    }
}

/// Strips ```latex / ```json / ``` code fences from LLM output.
fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    for tag in ["```latex", "```json", "```"] {
        if let Some(stripped) = text.strip_prefix(tag) {
            return stripped
                .trim_start()
                .strip_suffix("```")
                .map(|s| s.trim())
                .unwrap_or(stripped.trim_start());
        }
    }
    text
}

/// Slices the `\documentclass` … `\end{document}` span out of chatty model
/// output. Returns `None` when either marker is missing.
fn extract_document(text: &str) -> Option<&str> {
    const END: &str = "\\end{document}";
    let start = text.find("\\documentclass")?;
    let end = text.rfind(END)?;
    if end < start {
        return None;
    }
    Some(&text[start..end + END.len()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences_with_latex_tag() {
        let input = "```latex\n\\documentclass{article}\n```";
        assert_eq!(strip_code_fences(input), "\\documentclass{article}");
    }

    #[test]
    fn test_strip_code_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_code_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_code_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_document_slices_prose() {
        let input = "Here is your resume:\n\\documentclass{article}\n\\begin{document}\nHi\n\\end{document}\nLet me know!";
        let doc = extract_document(input).unwrap();
        assert!(doc.starts_with("\\documentclass"));
        assert!(doc.ends_with("\\end{document}"));
    }

    #[test]
    fn test_extract_document_missing_end_marker() {
        let input = "\\documentclass{article}\n\\begin{document}\ntruncated";
        assert!(extract_document(input).is_none());
    }

    #[test]
    fn test_extract_document_markers_out_of_order() {
        let input = "\\end{document} and then \\documentclass{article}";
        assert!(extract_document(input).is_none());
    }
}
