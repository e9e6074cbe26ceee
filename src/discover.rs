//! Candidate link discovery from a rendered search results page.
//!
//! One rendered fetch of the Google News results page per query. Result
//! entries are `<article>` elements; each contributes at most one link,
//! taken from its first anchor and resolved to an absolute URL. Entries
//! without an anchor are dropped without consuming the limit. Discovery is
//! deliberately retry-free: if the results page cannot be rendered the
//! whole query aborts with zero articles, which is cheaper than retrying a
//! page that is likely rate-limiting us.

use crate::identity::{IdentityPool, default_headers};
use crate::models::{CandidateLink, SearchQuery};
use crate::render::{RenderError, Renderer, WaitFor};
use crate::utils::truncate_for_log;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

const SEARCH_BASE: &str = "https://news.google.com/search";

/// CSS selector for one result entry on the search page.
const RESULT_REGION: &str = "article";

/// Discovery failed before any article could be attempted.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("search page could not be rendered: {0}")]
    Render(#[from] RenderError),
    #[error("search url could not be built: {0}")]
    InvalidSearchUrl(#[from] url::ParseError),
}

/// Build the results-page URL for a query.
///
/// The search term (with any `when:` qualifier already appended) is
/// percent-encoded into `q`; the locale parameters pin English/US results
/// so the result markup stays predictable.
pub fn search_url(query: &SearchQuery) -> String {
    format!(
        "{SEARCH_BASE}?q={}&hl=en-US&gl=US&ceid=US:en",
        urlencoding::encode(&query.search_term())
    )
}

/// Discover up to `query.limit` candidate article links.
///
/// Renders the search page with a fresh identity, waits for the result
/// region to appear, and extracts the first anchor of each entry in
/// document order. Duplicate URLs across ranks are preserved here; the
/// orchestrator collapses them before dispatch.
///
/// # Errors
///
/// [`DiscoveryError`] when the page cannot be rendered or the result region
/// never appears. A page that renders but yields no parseable links is an
/// empty list, not an error.
#[instrument(level = "info", skip_all, fields(query = %query.text, limit = query.limit))]
pub async fn discover<R: Renderer>(
    renderer: &R,
    identities: &IdentityPool,
    query: &SearchQuery,
) -> Result<Vec<CandidateLink>, DiscoveryError> {
    let url = search_url(query);
    let base = Url::parse(&url)?;

    let identity = identities.next_identity(&default_headers()).await;
    debug!(%url, user_agent = %identity.user_agent, "Rendering search page");
    let html = renderer
        .render(&url, &identity, &WaitFor::Css(RESULT_REGION.to_string()))
        .await?;

    let links = extract_candidate_links(&html, &base, query.limit);
    if links.is_empty() {
        warn!(
            preview = %truncate_for_log(&html, 300),
            "Search page rendered but no article links parsed"
        );
    }
    info!(count = links.len(), "Discovered candidate links");
    Ok(links)
}

/// Pull candidate links out of a rendered results page.
///
/// Ranks are assigned in document order over the entries that actually
/// carried a resolvable anchor, so dropped entries never leave gaps.
fn extract_candidate_links(html: &str, base: &Url, limit: usize) -> Vec<CandidateLink> {
    let document = Html::parse_document(html);
    let region_selector = Selector::parse(RESULT_REGION).unwrap();
    let anchor_selector = Selector::parse("a[href]").unwrap();

    let mut links = Vec::new();
    for region in document.select(&region_selector) {
        if links.len() == limit {
            break;
        }
        if let Some(anchor) = region.select(&anchor_selector).next() {
            if let Some(href) = anchor.value().attr("href") {
                if let Ok(resolved) = base.join(href) {
                    links.push(CandidateLink {
                        url: resolved.to_string(),
                        rank: links.len(),
                    });
                }
            }
        }
    }

    debug!(links = ?links, "Extracted candidate links");
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::testing::{FakeOutcome, FakeRenderer};

    const RESULTS_PAGE: &str = r#"
        <html><body>
          <article><h3><a href="./articles/one">First story</a></h3></article>
          <article><div>promo tile without any link</div></article>
          <article><a href="./articles/two">Second story</a><a href="./authors/x">byline</a></article>
          <article><a href="https://elsewhere.example.com/three">Third story</a></article>
        </body></html>
    "#;

    fn base() -> Url {
        Url::parse("https://news.google.com/search?q=x").unwrap()
    }

    #[test]
    fn test_search_url_encodes_query_and_timeframe() {
        let q = SearchQuery::new("threat actor", Some("18h".to_string()), Some(3));
        let url = search_url(&q);
        assert!(url.starts_with("https://news.google.com/search?q="));
        assert!(url.contains("q=threat%20actor%20when%3A18h"));
        assert!(url.contains("hl=en-US"));
        assert!(url.contains("gl=US"));
        assert!(url.contains("ceid=US%3Aen") || url.contains("ceid=US:en"));
    }

    #[test]
    fn test_extract_resolves_relative_hrefs_and_drops_anchorless_entries() {
        let links = extract_candidate_links(RESULTS_PAGE, &base(), 10);
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].url, "https://news.google.com/articles/one");
        assert_eq!(links[0].rank, 0);
        // The anchorless promo tile is dropped without leaving a rank gap.
        assert_eq!(links[1].url, "https://news.google.com/articles/two");
        assert_eq!(links[1].rank, 1);
        assert_eq!(links[2].url, "https://elsewhere.example.com/three");
        assert_eq!(links[2].rank, 2);
    }

    #[test]
    fn test_extract_takes_first_anchor_per_entry() {
        let links = extract_candidate_links(RESULTS_PAGE, &base(), 10);
        assert!(!links.iter().any(|l| l.url.contains("/authors/")));
    }

    #[test]
    fn test_extract_truncates_to_limit() {
        let links = extract_candidate_links(RESULTS_PAGE, &base(), 2);
        assert_eq!(links.len(), 2);
        assert_eq!(links[1].rank, 1);
    }

    #[test]
    fn test_extract_keeps_duplicate_urls_at_distinct_ranks() {
        let html = r#"
            <article><a href="./articles/same">A</a></article>
            <article><a href="./articles/same">B</a></article>
        "#;
        let links = extract_candidate_links(html, &base(), 10);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, links[1].url);
        assert_eq!(links[1].rank, 1);
    }

    #[tokio::test]
    async fn test_discover_returns_ranked_links() {
        let q = SearchQuery::new("threat actor", None, Some(10));
        let renderer = FakeRenderer::new();
        renderer.script(
            &search_url(&q),
            vec![FakeOutcome::Document(RESULTS_PAGE.to_string())],
        );
        let identities = IdentityPool::seeded(vec![], 1);

        let links = discover(&renderer, &identities, &q).await.unwrap();
        assert_eq!(links.len(), 3);
        assert_eq!(links[0].rank, 0);
    }

    #[tokio::test]
    async fn test_discover_render_failure_is_discovery_error() {
        let q = SearchQuery::new("threat actor", None, Some(10));
        let renderer = FakeRenderer::new();
        renderer.script(&search_url(&q), vec![FakeOutcome::TransientFailure]);
        let identities = IdentityPool::seeded(vec![], 1);

        let result = discover(&renderer, &identities, &q).await;
        assert!(matches!(result, Err(DiscoveryError::Render(_))));
    }

    #[tokio::test]
    async fn test_discover_empty_page_is_ok_and_empty() {
        let q = SearchQuery::new("threat actor", None, Some(10));
        let renderer = FakeRenderer::new();
        renderer.script(
            &search_url(&q),
            vec![FakeOutcome::Document("<html><body></body></html>".to_string())],
        );
        let identities = IdentityPool::seeded(vec![], 1);

        let links = discover(&renderer, &identities, &q).await.unwrap();
        assert!(links.is_empty());
    }
}
