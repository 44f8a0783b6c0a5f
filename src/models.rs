//! Data models for discovered candidates, extracted pages and output articles.
//!
//! This module defines the records that move through a source pipeline:
//! - [`CandidateUrl`]: a URL harvested from a sitemap or listing page
//! - [`Extraction`]: the raw fields pulled from one fetched page
//! - [`Article`]: the canonical output record returned to callers
//! - [`PipelineReport`]: one source's articles plus completeness counters
//!
//! [`Article`] serializes with the camelCase field names consumers expect,
//! hence the `#[serde(rename_all = "camelCase")]` attributes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const TITLE_NOT_FOUND: &str = "Title not found";
pub const CONTENT_NOT_FOUND: &str = "Content not found";
pub const AUTHOR_NOT_FOUND: &str = "Author not found";
pub const IMAGE_NOT_FOUND: &str = "Image URL not found";

/// A discovered article URL that has not yet been fetched.
///
/// Produced by the resolver, consumed by the recency filter. Listing-page
/// sources produce candidates with no recency metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateUrl {
    /// Absolute article URL.
    pub location: String,
    /// Raw text of the configured date element, if present.
    pub recency_value: Option<String>,
    /// `<news:language>` value, if present.
    pub language_tag: Option<String>,
    /// `<news:title>` value, if present.
    pub news_title: Option<String>,
}

impl CandidateUrl {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            recency_value: None,
            language_tag: None,
            news_title: None,
        }
    }
}

/// Fields extracted from one article page. Each is independently optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub title: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub image_uri: String,
}

impl Extraction {
    /// Names of the required fields that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.title) {
            missing.push("title");
        }
        if is_blank(&self.content) {
            missing.push("content");
        }
        if is_blank(&self.author) {
            missing.push("author");
        }
        missing
    }

    /// Complete iff title, author and content are all non-empty.
    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().is_none_or(|s| s.trim().is_empty())
}

/// Canonical output record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub article_id: Uuid,
    pub title: String,
    pub link: String,
    #[serde(rename = "imageURI")]
    pub image_uri: String,
    /// Reserved; always empty.
    pub translated_articles: BTreeMap<String, serde_json::Value>,
    pub metadata: ArticleMetadata,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetadata {
    pub article_source: String,
    pub article_base_url: String,
    /// Microseconds since the Unix epoch.
    pub article_time_stamp_extracted: i64,
    pub category: String,
    pub article_published_on: String,
    pub tags: String,
    pub article_metrics: ArticleMetrics,
    pub author: String,
    pub article_last_updated_on: String,
}

/// Engagement counters. Seeded with fixed values, never computed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArticleMetrics {
    pub article_liked: u32,
    pub article_disliked: u32,
}

impl Default for ArticleMetrics {
    fn default() -> Self {
        Self {
            article_liked: 20,
            article_disliked: 0,
        }
    }
}

/// Outcome of a single source pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    /// Articles in fan-in completion order.
    pub articles: Vec<Article>,
    pub complete_count: usize,
    pub incomplete_count: usize,
}

impl PipelineReport {
    /// Number of candidates that passed the recency filter.
    pub fn accepted(&self) -> usize {
        self.complete_count + self.incomplete_count
    }
}
