//! Fallback Renderer: LaTeX to HTML to PDF via a headless browser.
//!
//! The LaTeX→HTML conversion is an ordered list of pattern rules covering
//! the constructs the generation prompt produces (sections, bold/italic,
//! links, line breaks, alignment blocks, lists). It is deliberately lossy:
//! unsupported constructs pass through untouched. It is not, and must not
//! grow into, a grammar-level LaTeX parser.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::render::RenderError;

/// Ordered rewrite rules. Order matters: the preamble strip runs first so
/// later rules only see document body.
static RULES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?s)\\documentclass.*?\\begin\{document\}", ""),
        (r"\\end\{document\}", ""),
        (r"\\section\*?\{([^}]*)\}", "<h2>$1</h2>"),
        (r"\\subsection\*?\{([^}]*)\}", "<h3>$1</h3>"),
        (r"\\textbf\{([^}]*)\}", "<strong>$1</strong>"),
        (r"\\textit\{([^}]*)\}", "<em>$1</em>"),
        (r"\\href\{([^}]*)\}\{([^}]*)\}", r#"<a href="$1">$2</a>"#),
        (
            r"\\vspace\{([^}]*)\}",
            r#"<div style="margin-top: $1;"></div>"#,
        ),
        (r"\\begin\{center\}", r#"<div style="text-align: center;">"#),
        (r"\\end\{center\}", "</div>"),
        (r"\\begin\{flushleft\}", r#"<div style="text-align: left;">"#),
        (r"\\end\{flushleft\}", "</div>"),
        (r"\\begin\{itemize\}(?:\[[^\]]*\])?", "<ul>"),
        (r"\\end\{itemize\}", "</ul>"),
        (r"\\item\s*", "<li>"),
        (r"\\hfill", " "),
        (r"\\\\(?:\[[^\]]*\])?", "<br>"),
    ]
    .into_iter()
    .map(|(pattern, replacement)| {
        (
            Regex::new(pattern).expect("hardcoded rule pattern must compile"),
            replacement,
        )
    })
    .collect()
});

/// Baseline stylesheet approximating a resume's visual structure.
const STYLESHEET: &str = r#"
body {
  font-family: 'Times New Roman', serif;
  font-size: 12pt;
  line-height: 1.4;
  margin: 0;
  padding: 20px;
  color: #333;
}
h1 {
  font-size: 24pt;
  font-weight: bold;
  text-align: center;
  margin-bottom: 10px;
  color: #2c3e50;
}
h2 {
  font-size: 16pt;
  font-weight: bold;
  margin-top: 20px;
  margin-bottom: 10px;
  color: #34495e;
  border-bottom: 2px solid #3498db;
  padding-bottom: 5px;
}
h3 {
  font-size: 14pt;
  font-weight: bold;
  margin-top: 15px;
  margin-bottom: 5px;
  color: #2c3e50;
}
p { margin: 5px 0; }
ul { margin: 5px 0; padding-left: 1.4em; }
.contact-info {
  text-align: center;
  margin-bottom: 20px;
}
.skills {
  display: flex;
  flex-wrap: wrap;
  gap: 10px;
}
.skill {
  background-color: #ecf0f1;
  padding: 5px 10px;
  border-radius: 15px;
  font-size: 11pt;
}
"#;

/// Best-effort structural translation from LaTeX to a standalone HTML page.
pub fn to_hypertext(source: &str) -> String {
    let mut body = source.to_string();
    for (pattern, replacement) in RULES.iter() {
        body = pattern.replace_all(&body, *replacement).into_owned();
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Document</title>
<style>{STYLESHEET}</style>
</head>
<body>
{body}
</body>
</html>"#
    )
}

/// Turns an in-memory HTML document into paginated PDF bytes within `limit`.
/// Implementations own the deadline: when it elapses they must fail AND
/// release whatever they launched (no detached browser processes).
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, html: &str, limit: Duration) -> Result<Vec<u8>, RenderError>;
}

/// Page geometry for the exported PDF. Defaults: A4, 0.5in margins.
#[derive(Debug, Clone, Copy)]
pub struct PageOptions {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub margin_in: f64,
}

impl Default for PageOptions {
    fn default() -> Self {
        PageOptions {
            paper_width_in: 8.27,
            paper_height_in: 11.69,
            margin_in: 0.5,
        }
    }
}

/// Headless-Chrome rasterizer. A fresh browser is launched per call with the
/// call's deadline wired into its launch and per-tab timeouts, so a stalled
/// page fails inside the call and the `Browser` drop kills the Chrome
/// process. A browser that cannot start is fatal (`RendererUnavailable`)
/// since no further fallback exists.
pub struct ChromeRasterizer {
    chrome_bin: Option<PathBuf>,
    page: PageOptions,
}

impl ChromeRasterizer {
    pub fn new(chrome_bin: Option<PathBuf>, page: PageOptions) -> Self {
        ChromeRasterizer { chrome_bin, page }
    }
}

#[async_trait]
impl Rasterizer for ChromeRasterizer {
    async fn rasterize(&self, html: &str, limit: Duration) -> Result<Vec<u8>, RenderError> {
        let url = format!("data:text/html;base64,{}", BASE64_STANDARD.encode(html));
        let chrome_bin = self.chrome_bin.clone();
        let page = self.page;

        // headless_chrome is a blocking API; keep it off the async runtime.
        // The deadline lives inside print_pdf: every browser call is bounded
        // by `limit` and the Browser is dropped (Chrome killed) before the
        // task finishes, so nothing outlives this call detached.
        let bytes = tokio::task::spawn_blocking(move || print_pdf(chrome_bin, &url, page, limit))
            .await
            .map_err(|e| RenderError::RendererUnavailable(format!("render task panicked: {e}")))??;

        debug!("Fallback rasterization produced {} bytes", bytes.len());
        Ok(bytes)
    }
}

fn print_pdf(
    chrome_bin: Option<PathBuf>,
    url: &str,
    page: PageOptions,
    limit: Duration,
) -> Result<Vec<u8>, RenderError> {
    use headless_chrome::types::PrintToPdfOptions;
    use headless_chrome::{Browser, LaunchOptions};

    let unavailable = |e: &dyn std::fmt::Display| RenderError::RendererUnavailable(e.to_string());

    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false)
        .path(chrome_bin)
        .idle_browser_timeout(limit)
        .build()
        .map_err(|e| unavailable(&e))?;

    let browser = Browser::new(launch_options).map_err(|e| unavailable(&e))?;
    let tab = browser.new_tab().map_err(|e| unavailable(&e))?;
    tab.set_default_timeout(limit);

    tab.navigate_to(url)
        .map_err(|e| unavailable(&e))?
        .wait_until_navigated()
        .map_err(|e| unavailable(&e))?;

    let pdf_options = PrintToPdfOptions {
        landscape: Some(false),
        display_header_footer: Some(false),
        print_background: Some(true),
        paper_width: Some(page.paper_width_in),
        paper_height: Some(page.paper_height_in),
        margin_top: Some(page.margin_in),
        margin_bottom: Some(page.margin_in),
        margin_left: Some(page.margin_in),
        margin_right: Some(page.margin_in),
        ..Default::default()
    };

    tab.print_to_pdf(Some(pdf_options))
        .map_err(|e| unavailable(&e))
}
