//! # Crypto News Scraper
//!
//! HTTP service exposing one endpoint per configured news source plus an
//! aggregate endpoint that runs them all.
//!
//! ## Usage
//!
//! ```sh
//! crypto_news_scraper --bind 0.0.0.0:8000
//! curl localhost:8000/coinDeskScrapped
//! curl localhost:8000/runAllEndpoints
//! ```

use clap::Parser;
use crypto_news_scraper::api::{self, AppState};
use crypto_news_scraper::cli::Cli;
use crypto_news_scraper::config::SourceRegistry;
use crypto_news_scraper::observe::{PipelineObserver, TracingObserver};
use crypto_news_scraper::scrapers::pipeline::Limits;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[tokio::main]
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

    info!("crypto_news_scraper starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let registry = match &args.sources {
        Some(path) => SourceRegistry::from_path(path)?,
        None => SourceRegistry::builtin()?,
    };
    for source in registry.sources() {
        debug!(source = %source.name, endpoint = %source.endpoint(), "Registered endpoint");
    }

    let limits = Limits::new(
        args.request_timeout(),
        args.per_source_concurrency,
        args.global_concurrency,
    );
    let observer: Arc<dyn PipelineObserver> = Arc::new(TracingObserver);
    info!(
        sources = registry.len(),
        observer = observer.name(),
        timeout_secs = args.request_timeout_secs,
        per_source = limits.per_source,
        global = args.global_concurrency,
        "Configured pipelines"
    );

    let app = api::router(AppState::new(registry, limits, observer));
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
