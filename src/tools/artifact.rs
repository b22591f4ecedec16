//! Artifact generation
//!
//! Turns a finished markdown report into a standalone document on disk.
//! The file generator renders the markdown into a styled HTML page; rendering to PDF is left to
//! whatever consumes the page.

use crate::types::{AppError, ArtifactResult, Result, StylingOptions};
use async_trait::async_trait;
use pulldown_cmark::{html, Event, Options, Parser};
use std::path::{Path, PathBuf};

/// Capability that renders a report into an artifact
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArtifactGenerator: Send + Sync {
    async fn generate(
        &self,
        markdown: &str,
        title: &str,
        styling: Option<StylingOptions>,
    ) -> Result<ArtifactResult>;
}

/// Writes reports as HTML documents into a directory
pub struct FileArtifactGenerator {
    output_dir: PathBuf,
}

impl FileArtifactGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

fn slugify(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let slug = slug
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.is_empty() {
        "report".to_string()
    } else {
        slug
    }
}

/// Render untrusted text as escaped HTML
fn html_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    html::push_html(&mut out, std::iter::once(Event::Text(text.into())));
    out
}

/// Render markdown to HTML; raw HTML in the report is shown as text
fn render_markdown(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        other => other,
    });
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

fn render_document(markdown: &str, title: &str, styling: &StylingOptions) -> String {
    let font_size = styling.font_size.unwrap_or(12);
    let color = styling
        .primary_color
        .as_deref()
        .filter(|c| c.chars().all(|ch| ch == '#' || ch.is_ascii_alphanumeric()))
        .unwrap_or("#1a1a2e");

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title}</title>
<style>
body {{ font-family: Georgia, serif; font-size: {font_size}pt; max-width: 48em; margin: 2em auto; line-height: 1.5; }}
h1, h2, h3 {{ color: {color}; }}
header h1 {{ border-bottom: 2px solid {color}; }}
a {{ color: {color}; }}
table {{ border-collapse: collapse; }}
th, td {{ border: 1px solid #ccc; padding: 0.3em 0.6em; }}
code {{ font-family: Menlo, Consolas, monospace; font-size: 0.9em; }}
blockquote {{ border-left: 3px solid {color}; margin-left: 0; padding-left: 1em; color: #444; }}
</style>
</head>
<body>
<header><h1>{title}</h1></header>
<main>
{body}</main>
</body>
</html>
"##,
        title = html_text(title),
        font_size = font_size,
        color = color,
        body = render_markdown(markdown),
    )
}

#[async_trait]
impl ArtifactGenerator for FileArtifactGenerator {
    async fn generate(
        &self,
        markdown: &str,
        title: &str,
        styling: Option<StylingOptions>,
    ) -> Result<ArtifactResult> {
        if markdown.trim().is_empty() {
            return Ok(ArtifactResult::failed("report is empty"));
        }

        tokio::fs::create_dir_all(&self.output_dir).await.map_err(|e| {
            AppError::Capability(format!(
                "Failed to create artifact directory {:?}: {}",
                self.output_dir, e
            ))
        })?;

        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let file_name = format!("{}-{}.html", slugify(title), &suffix[..8]);
        let path = self.output_dir.join(file_name);

        let document = render_document(markdown, title, &styling.unwrap_or_default());
        tokio::fs::write(&path, document)
            .await
            .map_err(|e| AppError::Capability(format!("Failed to write {:?}: {}", path, e)))?;

        tracing::info!(path = %path.display(), "Artifact generated");
        Ok(ArtifactResult::generated(path.to_string_lossy()))
    }
}
