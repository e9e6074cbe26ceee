//! Proxy list retrieval.
//!
//! The proxy source is a plain-text document of `host:port` endpoints, one
//! per line, fetched exactly once at startup. An unreachable source or an
//! empty document degrades to direct connections; it never stops the run.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::get;
use tracing::{error, info, instrument, warn};

/// `host:port` where host is a hostname or IPv4 address.
static PROXY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*:\d{1,5}$").unwrap());

/// Fetch the proxy list from `url`.
///
/// Returns the valid `host:port` entries found in the response body. Any
/// failure (connection, status, body read) is logged and yields an empty
/// list, meaning all requests go out directly.
#[instrument(level = "info", skip_all, fields(%url))]
pub async fn fetch_proxy_list(url: &str) -> Vec<String> {
    let body = match get(url).await {
        Ok(resp) => match resp.error_for_status() {
            Ok(resp) => match resp.text().await {
                Ok(body) => body,
                Err(e) => {
                    error!(error = %e, "Failed to read proxy list body; continuing without proxies");
                    return Vec::new();
                }
            },
            Err(e) => {
                error!(error = %e, "Proxy source returned an error status; continuing without proxies");
                return Vec::new();
            }
        },
        Err(e) => {
            error!(error = %e, "Failed to reach proxy source; continuing without proxies");
            return Vec::new();
        }
    };

    let proxies = parse_proxy_list(&body);
    info!(count = proxies.len(), "Loaded proxy list");
    proxies
}

/// Extract valid `host:port` entries from a proxy list document.
///
/// Lines are trimmed; blank lines are ignored and malformed lines are
/// dropped with a warning.
pub fn parse_proxy_list(body: &str) -> Vec<String> {
    let mut proxies = Vec::new();
    for line in body.lines() {
        let entry = line.trim();
        if entry.is_empty() {
            continue;
        }
        if PROXY_LINE.is_match(entry) {
            proxies.push(entry.to_string());
        } else {
            warn!(line = entry, "Dropping malformed proxy entry");
        }
    }
    proxies
}
