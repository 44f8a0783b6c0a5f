//! # Crypto News Scraper
//!
//! Discovers recently published articles from a fixed set of crypto news
//! publishers, extracts structured fields from each page, and serves them as
//! normalized JSON records over HTTP.
//!
//! ## Architecture
//!
//! 1. **Discovery**: fetch each source's sitemap or listing page once
//! 2. **Filtering**: keep candidates dated inside the source's recency window
//! 3. **Extraction**: fetch accepted pages concurrently and apply the source's selector rules
//! 4. **Assembly**: turn complete extractions into [`models::Article`] records
//! 5. **Aggregation**: run every source at once and flatten in registration order
//!
//! Publishers are described as data in [`config`]; one generic
//! [`scrapers::pipeline::SourcePipeline`] serves them all.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod observe;
pub mod scrapers;
pub mod utils;
