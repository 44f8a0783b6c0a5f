//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every argument can be provided via a command-line flag or an environment
//! variable.

use clap::Parser;
use std::time::Duration;

/// Command-line arguments for the news scraper service.
///
/// # Examples
///
/// ```sh
/// # Serve the built-in sources on the default address
/// crypto_news_scraper
///
/// # Custom adapter table and tighter limits
/// crypto_news_scraper --sources ./sources.yaml --global-concurrency 8
///
/// # Same, via the environment
/// SCRAPER_BIND=127.0.0.1:9000 SCRAPER_REQUEST_TIMEOUT_SECS=10 crypto_news_scraper
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Address to listen on
    #[arg(short, long, env = "SCRAPER_BIND", default_value = "0.0.0.0:8000")]
    pub bind: String,

    /// Optional path to a sources YAML file replacing the built-in adapters
    #[arg(short, long, env = "SCRAPER_SOURCES")]
    pub sources: Option<String>,

    /// Timeout applied to every outbound request, in seconds
    #[arg(long, env = "SCRAPER_REQUEST_TIMEOUT_SECS", default_value_t = 20)]
    pub request_timeout_secs: u64,

    /// Maximum in-flight page fetches per source
    #[arg(long, env = "SCRAPER_PER_SOURCE_CONCURRENCY", default_value_t = 8)]
    pub per_source_concurrency: usize,

    /// Maximum in-flight page fetches across all sources
    #[arg(long, env = "SCRAPER_GLOBAL_CONCURRENCY", default_value_t = 32)]
    pub global_concurrency: usize,
}

impl Cli {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
