//! # Newsraker
//!
//! An interactive scraper that searches Google News for a topic, renders the
//! results and each linked article in a real browser session, and saves every
//! new article to disk as an HTML file.
//!
//! ## Features
//!
//! - Renders search results and articles through a WebDriver browser session
//! - Presents a fresh identity per fetch attempt: rotated user agent, randomized
//!   viewport, extra headers, and an optional proxy drawn from a remote list
//! - Retries transient fetch failures with exponential backoff and jitter
//! - Remembers processed URLs across runs in a newline-delimited list, so a
//!   URL is fetched at most once
//! - Prefixes each saved article with its source URL for provenance
//!
//! ## Usage
//!
//! ```sh
//! newsraker -o ./Saved_Articles --timeframe 18h
//! ```
//!
//! ## Architecture
//!
//! Each query entered at the prompt flows through a pipeline:
//! 1. **Discovery**: render the results page once and collect candidate links
//! 2. **Dedup**: collapse repeated URLs and skip already-processed ones
//! 3. **Fetching**: concurrent per-link fetches, fresh identity per attempt
//! 4. **Persistence**: write each article under a timestamped filename

use clap::Parser;
use dialoguer::Input;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod dedup;
mod discover;
mod fetch;
mod identity;
mod models;
mod orchestrator;
mod persist;
mod proxy;
mod render;
mod utils;

use cli::Cli;
use dedup::DedupStore;
use fetch::RetryPolicy;
use identity::IdentityPool;
use models::{DEFAULT_ARTICLE_LIMIT, SearchQuery};
use orchestrator::Orchestrator;
use persist::ArticlePersister;
use render::WebDriverRenderer;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("newsraker starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args.output_dir, ?args.webdriver_url, "Parsed CLI arguments");

    // Early check: ensure the article output dir is writable
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // ---- Assemble the pipeline ----
    let proxies = match args.proxy_list_url.as_deref() {
        Some(url) => proxy::fetch_proxy_list(url).await,
        None => Vec::new(),
    };
    let identities = Arc::new(IdentityPool::new(proxies));
    if identities.has_proxies() {
        info!("Proxy rotation enabled");
    } else {
        info!("No proxies configured; connecting directly");
    }

    let store = Arc::new(DedupStore::load(&args.dedup_file).await);
    info!(
        known_urls = store.len().await,
        path = %args.dedup_file,
        "Dedup store ready"
    );

    let renderer = Arc::new(WebDriverRenderer::new(
        args.webdriver_url.clone(),
        !args.headful,
    ));
    let policy = RetryPolicy {
        max_attempts: args.max_retries.max(1),
        ..RetryPolicy::default()
    };
    let orchestrator = Orchestrator::new(
        renderer,
        identities,
        Arc::clone(&store),
        ArticlePersister::new(&args.output_dir),
        policy,
    );

    // ---- Interactive query loop ----
    loop {
        let raw: String = Input::new()
            .with_prompt("Search query ('exit' to quit)")
            .interact_text()?;
        let text = raw.trim();
        if text.eq_ignore_ascii_case("exit") {
            break;
        }
        if text.is_empty() {
            continue;
        }

        let limit_raw: String = Input::new()
            .with_prompt(format!("Article limit (Enter for {DEFAULT_ARTICLE_LIMIT})"))
            .allow_empty(true)
            .interact_text()?;
        // Blank, non-numeric, and zero all fall back to the default.
        let limit = limit_raw.trim().parse::<usize>().ok();

        let query = SearchQuery::new(text, args.timeframe.clone(), limit);
        match orchestrator.run_query(&query).await {
            Ok(summary) => {
                info!(
                    query = %summary.query,
                    discovered = summary.discovered,
                    saved = summary.saved,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    "Run finished"
                );
                println!(
                    "Saved {} article(s), skipped {}, failed {}.",
                    summary.saved, summary.skipped, summary.failed
                );
            }
            Err(e) => {
                error!(query = %query.text, error = %e, "Query aborted");
                println!("Search failed for that query; see the log for details.");
            }
        }
    }

    // ---- Flush state and exit ----
    if let Err(e) = store.persist().await {
        warn!(
            error = %e,
            path = %store.path().display(),
            "Failed to write processed-URL list on exit"
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
