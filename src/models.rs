//! Core domain types shared across the scrape pipeline.
//!
//! This module defines the data that flows between the discoverer, fetcher,
//! persister, and orchestrator:
//! - [`SearchQuery`]: what the user asked for, with a validated article limit
//! - [`CandidateLink`]: a discovered article URL and its position on the
//!   results page
//! - [`SavedArticle`]: the record of one article written to disk
//! - [`QuerySummary`]: per-query aggregate counts reported to the user

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of articles to scrape when the user does not give a limit.
pub const DEFAULT_ARTICLE_LIMIT: usize = 10;

/// One user search request.
///
/// Constructed once per loop iteration and treated as read-only afterwards.
/// The article limit is normalized at construction: anything absent or below
/// one falls back to [`DEFAULT_ARTICLE_LIMIT`].
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text search terms as typed by the user.
    pub text: String,
    /// Optional recency qualifier, e.g. `18h` to restrict results to the
    /// last eighteen hours.
    pub timeframe: Option<String>,
    /// Maximum number of candidate links to process; always >= 1.
    pub limit: usize,
}

impl SearchQuery {
    /// Build a query, normalizing the limit.
    pub fn new(text: impl Into<String>, timeframe: Option<String>, limit: Option<usize>) -> Self {
        Self {
            text: text.into(),
            timeframe,
            limit: limit.filter(|n| *n >= 1).unwrap_or(DEFAULT_ARTICLE_LIMIT),
        }
    }

    /// The full search term sent to the results page, with the recency
    /// qualifier appended when present (`rust cve` + `18h` -> `rust cve when:18h`).
    pub fn search_term(&self) -> String {
        match &self.timeframe {
            Some(tf) => format!("{} when:{}", self.text, tf),
            None => self.text.clone(),
        }
    }
}

/// A discovered article URL plus its 0-based position on the results page.
///
/// Rank drives output numbering; the same URL may legitimately appear at
/// several ranks on one results page and is collapsed to its first
/// occurrence before fetching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLink {
    /// Absolute article URL.
    pub url: String,
    /// 0-based position on the results page.
    pub rank: usize,
}

/// Record of one article successfully written to the output directory.
#[derive(Debug, Clone)]
pub struct SavedArticle {
    /// Where the article was written.
    pub path: PathBuf,
    /// The URL the content was fetched from.
    pub source_url: String,
    /// Discovery rank of the link that produced this article.
    pub rank: usize,
    /// When the content was captured.
    pub captured_at: DateTime<Local>,
}

/// Aggregate outcome of a single query run.
///
/// `discovered` counts candidate links before duplicate collapse; `skipped`
/// counts links dropped before any fetch started; `dispatched` counts fetch
/// tasks actually started; `saved` and `failed` partition the dispatched
/// tasks. `discovered == dispatched + skipped` holds for every summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuerySummary {
    /// The query text this summary describes.
    pub query: String,
    /// Candidate links returned by the discoverer.
    pub discovered: usize,
    /// Links dropped before dispatch: the URL was already processed, or
    /// repeated an earlier candidate in the same batch.
    pub skipped: usize,
    /// Fetch tasks dispatched after dedup filtering.
    pub dispatched: usize,
    /// Articles written to disk.
    pub saved: usize,
    /// Dispatched tasks that ended in exhaustion, permanent failure, or a
    /// persistence error.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_query_default_limit() {
        let q = SearchQuery::new("threat actor", None, None);
        assert_eq!(q.limit, DEFAULT_ARTICLE_LIMIT);
    }

    #[test]
    fn test_search_query_zero_limit_falls_back() {
        let q = SearchQuery::new("threat actor", None, Some(0));
        assert_eq!(q.limit, DEFAULT_ARTICLE_LIMIT);
    }

    #[test]
    fn test_search_query_explicit_limit() {
        let q = SearchQuery::new("threat actor", None, Some(3));
        assert_eq!(q.limit, 3);
    }

    #[test]
    fn test_search_term_without_timeframe() {
        let q = SearchQuery::new("zero day", None, None);
        assert_eq!(q.search_term(), "zero day");
    }

    #[test]
    fn test_search_term_with_timeframe() {
        let q = SearchQuery::new("zero day", Some("18h".to_string()), None);
        assert_eq!(q.search_term(), "zero day when:18h");
    }

    #[test]
    fn test_candidate_link_equality() {
        let a = CandidateLink {
            url: "https://example.com/a".to_string(),
            rank: 0,
        };
        let b = CandidateLink {
            url: "https://example.com/a".to_string(),
            rank: 0,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_summary_serialization() {
        let summary = QuerySummary {
            query: "threat actor".to_string(),
            discovered: 3,
            skipped: 1,
            dispatched: 2,
            saved: 2,
            failed: 0,
        };

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("threat actor"));
        assert!(json.contains("\"dispatched\":2"));

        let back: QuerySummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.saved, 2);
        assert_eq!(back.skipped, 1);
    }
}
