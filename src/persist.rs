//! Article persistence: title extraction, filename construction, writing.
//!
//! Every saved article becomes one HTML file named
//! `<timestamp>_<query>_<title>_<rank+1>.html` under the output directory,
//! with a `Source URL:` provenance line prepended to the raw document. The
//! rank suffix keeps filenames distinct when two articles in one run share
//! a timestamp and a sanitized title.

use crate::models::{SavedArticle, SearchQuery};
use chrono::{DateTime, Local};
use scraper::{Html, Selector};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Title used when the document carries no usable `<h1>`.
pub const PLACEHOLDER_TITLE: &str = "UnknownTitle";

/// Cap on the sanitized title segment, in characters, to keep the full
/// filename inside common filesystem limits.
const MAX_TITLE_CHARS: usize = 100;

/// The article could not be written; it is lost for this run.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to write article file: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes fetched articles into the output directory.
#[derive(Debug, Clone)]
pub struct ArticlePersister {
    output_dir: PathBuf,
}

impl ArticlePersister {
    /// Persister rooted at `output_dir`. The directory is created and
    /// probed at startup, not here.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Write one fetched document to disk.
    ///
    /// Extracts and sanitizes the title, composes the filename from the
    /// capture timestamp, query, title, and rank, and writes the content
    /// prefixed with its source URL. Content only reaches this function
    /// after a fully successful fetch, so a failed write never leaves a
    /// partial file for a failed fetch.
    #[instrument(level = "info", skip_all, fields(%url, rank))]
    pub async fn persist(
        &self,
        content: &str,
        url: &str,
        rank: usize,
        query: &SearchQuery,
    ) -> Result<SavedArticle, PersistError> {
        let captured_at = Local::now();
        let mut title = sanitize_title(&extract_title(content));
        if title.is_empty() {
            title = PLACEHOLDER_TITLE.to_string();
        }

        let filename = article_filename(&captured_at, &query.text, &title, rank);
        let path = self.output_dir.join(filename);

        let body = format!("Source URL: {url}\n\n{content}");
        fs::write(&path, body).await?;

        info!(path = %path.display(), bytes = content.len(), "Saved article");
        Ok(SavedArticle {
            path,
            source_url: url.to_string(),
            rank,
            captured_at,
        })
    }
}

/// First `<h1>` text in document order, whitespace-collapsed; the
/// placeholder when no such heading exists or it is empty.
pub fn extract_title(content: &str) -> String {
    let document = Html::parse_document(content);
    let h1 = Selector::parse("h1").unwrap();

    document
        .select(&h1)
        .next()
        .map(|el| {
            el.text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| PLACEHOLDER_TITLE.to_string())
}

/// Make a title safe for filenames.
///
/// Keeps alphanumeric characters, whitespace, and underscores; everything
/// else is stripped. Each whitespace character then becomes one underscore
/// and the result is capped at [`MAX_TITLE_CHARS`]. Underscores survive the
/// filter, so sanitizing an already-sanitized title is a no-op.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '_')
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Compose the output filename for one article.
///
/// The query text runs through the same sanitizer as the title; the rank
/// is 1-based in the filename to match how results are numbered on the
/// search page.
pub fn article_filename(
    captured_at: &DateTime<Local>,
    query_text: &str,
    sanitized_title: &str,
    rank: usize,
) -> String {
    format!(
        "{}_{}_{}_{}.html",
        captured_at.format("%Y%m%d%H%M%S"),
        sanitize_title(query_text),
        sanitized_title,
        rank + 1
    )
}
