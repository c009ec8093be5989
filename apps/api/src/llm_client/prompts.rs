//! Prompt templates for the generation calls. All prompts demand raw output
//! (LaTeX or JSON) with no surrounding prose; the client still defends
//! against chatty responses by slicing out the document / stripping fences.

use std::collections::HashMap;

use crate::llm_client::LlmError;
use crate::models::profile::{JobDescription, Profile};

pub const RESUME_SYSTEM: &str = "You are an expert LaTeX resume writer. \
You return complete, compilable LaTeX documents and nothing else.";

pub const COVER_LETTER_SYSTEM: &str = "You are an expert career writer. \
You return complete, compilable LaTeX cover letters and nothing else.";

pub const QUESTIONS_SYSTEM: &str = "You are an expert resume writer and career coach. \
You return only valid JSON arrays, no prose.";

const RESUME_TEMPLATE: &str = r#"Generate professional LaTeX code for a resume based on the following information.

User Profile:
{profile_json}

Job Description:
{job_json}

Additional Answers:
{answers_json}

Base Template (adapt this skeleton, keep its preamble):
{skeleton}

Requirements:
1. Replace placeholder content with user data.
2. Tailor content to the job description.
3. Include quantifiable achievements.
4. Use action verbs and industry-specific keywords.
5. Ensure proper LaTeX syntax.
6. Use ONLY these packages: inputenc, fontenc, geometry, hyperref, xcolor, titlesec, enumitem.
7. DO NOT use fontawesome, tikz, or other complex packages.
8. Return ONLY the LaTeX code, no explanations.

Return the complete LaTeX document code:"#;

const COVER_LETTER_TEMPLATE: &str = r#"Generate a professional cover letter in LaTeX format based on the following information.

User Profile:
{profile_json}

Job Description:
{job_json}

Tone: {tone}

Base Template (adapt this skeleton, keep its preamble):
{skeleton}

Requirements:
1. Tailor the letter to the specific job and company.
2. Use a {tone} tone.
3. Reference specific skills and experiences from the profile.
4. Include a call to action.
5. Use proper LaTeX formatting.
6. Return ONLY the LaTeX code.

Return the complete LaTeX cover letter code:"#;

const QUESTIONS_TEMPLATE: &str = r#"Given the following user profile and job description, generate 5-8 highly relevant, diverse, and helpful questions that:
- Help fill in gaps in the resume
- Surface strong achievements
- Match user skills to the job requirements
- Use a variety of input types: "text", "textarea", "multiselect", "checkbox"
- For skills, certifications, and languages, use "multiselect" or "checkbox" and provide an options list extracted from the job description and common industry skills. Set can_add_more: true for these.

Each question object must include:
- question (string)
- input_type ("text" | "textarea" | "multiselect" | "checkbox")
- required (true/false)
- category ("summary" | "experience" | "skills" | "achievements" | "certifications" | "languages" | "education")
- options (string[], for multiselect/checkbox only)
- can_add_more (boolean, for skills/certifications/languages)

User Profile:
{profile_json}

Job Description:
{job_json}

Return ONLY a valid JSON array of questions as described above."#;

pub fn build_resume_prompt(
    profile: &Profile,
    job: &JobDescription,
    answers: &HashMap<String, String>,
    skeleton: &str,
) -> Result<String, LlmError> {
    Ok(RESUME_TEMPLATE
        .replace("{profile_json}", &serde_json::to_string_pretty(profile)?)
        .replace("{job_json}", &serde_json::to_string_pretty(job)?)
        .replace("{answers_json}", &serde_json::to_string_pretty(answers)?)
        .replace("{skeleton}", skeleton))
}

pub fn build_cover_letter_prompt(
    profile: &Profile,
    job: &JobDescription,
    tone: &str,
    skeleton: &str,
) -> Result<String, LlmError> {
    Ok(COVER_LETTER_TEMPLATE
        .replace("{profile_json}", &serde_json::to_string_pretty(profile)?)
        .replace("{job_json}", &serde_json::to_string_pretty(job)?)
        .replace("{tone}", tone)
        .replace("{skeleton}", skeleton))
}

pub fn build_questions_prompt(
    profile: &Profile,
    job: &JobDescription,
) -> Result<String, LlmError> {
    Ok(QUESTIONS_TEMPLATE
        .replace("{profile_json}", &serde_json::to_string_pretty(profile)?)
        .replace("{job_json}", &serde_json::to_string_pretty(job)?))
}
