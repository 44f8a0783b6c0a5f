//! Article assembler.
//!
//! Builds the canonical [`Article`] from an extraction. The pipeline only
//! assembles complete extractions; blank fields still fall back to the
//! sentinel strings so a record is never emitted with an empty title, body
//! or author.

use crate::config::{PublishedOn, Source};
use crate::models::{
    Article, ArticleMetadata, ArticleMetrics, CandidateUrl, Extraction, AUTHOR_NOT_FOUND,
    CONTENT_NOT_FOUND, TITLE_NOT_FOUND,
};
use crate::scrapers::recency;
use crate::utils::extraction_date_label;
use chrono::{Local, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Assemble an article, stamping a fresh id and the current instant.
pub fn assemble(extraction: Extraction, source: &Source, candidate: &CandidateUrl) -> Article {
    let Extraction {
        title,
        author,
        content,
        image_uri,
    } = extraction;

    let published_on = match source.published_on {
        PublishedOn::SitemapDate => candidate
            .recency_value
            .as_deref()
            .and_then(|raw| recency::published_label(raw, source.recency.format)),
        PublishedOn::ExtractionDate => None,
    }
    .unwrap_or_else(|| extraction_date_label(Local::now().date_naive()));

    let link = candidate.location.clone();

    Article {
        article_id: Uuid::new_v4(),
        title: or_sentinel(title, TITLE_NOT_FOUND),
        link: link.clone(),
        image_uri,
        translated_articles: BTreeMap::new(),
        metadata: ArticleMetadata {
            article_source: source.name.clone(),
            article_base_url: link,
            article_time_stamp_extracted: Utc::now().timestamp_micros(),
            category: String::new(),
            article_published_on: published_on,
            tags: String::new(),
            article_metrics: ArticleMetrics::default(),
            author: or_sentinel(author, AUTHOR_NOT_FOUND),
            article_last_updated_on: "N/A".to_string(),
        },
        content: or_sentinel(content, CONTENT_NOT_FOUND),
    }
}

fn or_sentinel(field: Option<String>, sentinel: &str) -> String {
    field
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| sentinel.to_string())
}
