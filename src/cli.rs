//! Command-line interface definitions for newsraker.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! All arguments can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for the newsraker application.
///
/// Queries themselves are entered interactively after startup; these options
/// configure where articles land, which WebDriver endpoint renders pages,
/// and how persistent the fetcher should be.
///
/// # Examples
///
/// ```sh
/// # Basic usage with the bundled defaults
/// newsraker
///
/// # Custom output directory and a rotating proxy pool
/// newsraker -o ./articles --proxy-list-url https://proxies.example.com/list.txt
///
/// # Restrict every query to the last 18 hours, watching the browser work
/// newsraker --timeframe 18h --headful
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory where fetched articles are written
    #[arg(short, long, default_value = "Saved_Articles")]
    pub output_dir: String,

    /// Path of the processed-URL list carried between runs
    #[arg(long, default_value = "processed_urls.txt")]
    pub dedup_file: String,

    /// WebDriver endpoint used to render pages
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:4444")]
    pub webdriver_url: String,

    /// URL serving a newline-delimited host:port proxy list (fetched once at startup)
    #[arg(long, env = "PROXY_LIST_URL")]
    pub proxy_list_url: Option<String>,

    /// Fetch attempts per article before giving up
    #[arg(long, default_value_t = 3)]
    pub max_retries: usize,

    /// Recency window applied to every query, e.g. `18h` or `7d`
    #[arg(long)]
    pub timeframe: Option<String>,

    /// Run the browser with a visible window instead of headless
    #[arg(long)]
    pub headful: bool,
}
