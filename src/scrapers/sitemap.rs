//! Sitemap and listing-page resolver.
//!
//! Turns a source's discovery document into [`CandidateUrl`] values:
//!
//! - **Sitemap XML**: every `<url>` entry yields one candidate carrying its
//!   `<loc>`, the configured date element, and the optional
//!   `<news:language>` / `<news:title>` values.
//! - **Listing HTML**: every anchor matching the source's listing selector
//!   yields one candidate with no recency metadata. Relative links are
//!   resolved against the discovery URL and duplicates collapsed.
//!
//! Parsing is pure, so the same body always yields the same candidates in
//! the same order.

use crate::config::{DateField, Discovery, Source};
use crate::error::DiscoveryError;
use crate::models::CandidateUrl;
use crate::scrapers::fetch::Session;
use crate::utils::truncate_for_log;
use itertools::Itertools;
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::{Html, Selector};
use tracing::{debug, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    Date,
    Language,
    NewsTitle,
}

/// Fetch the discovery document once and harvest candidates from it.
#[instrument(level = "info", skip_all, fields(source = %source.name, url = %source.discovery_url))]
pub async fn resolve(session: &Session, source: &Source) -> Result<Vec<CandidateUrl>, DiscoveryError> {
    let body = session.fetch(source.discovery_url.as_str()).await?;
    let candidates = match &source.discovery {
        Discovery::Sitemap => parse_sitemap(&body, source.recency.field)?,
        Discovery::Listing { anchors } => parse_listing(&body, anchors, &source.discovery_url),
    };
    debug!(count = candidates.len(), "Resolved candidates");
    Ok(candidates)
}

/// Parse a `<urlset>` document.
///
/// A `<sitemapindex>` root is accepted and yields no candidates. Any other
/// root element, or malformed XML, is an error.
pub fn parse_sitemap(body: &str, date_field: DateField) -> Result<Vec<CandidateUrl>, DiscoveryError> {
    let date_element = date_field.element_name();
    let mut reader = Reader::from_str(body);

    let mut candidates = Vec::new();
    let mut current: Option<CandidateUrl> = None;
    let mut field: Option<Field> = None;
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let qname = e.name();
                let name = String::from_utf8_lossy(qname.as_ref());
                if !saw_root {
                    if name != "urlset" && name != "sitemapindex" {
                        return Err(DiscoveryError::Sitemap(format!(
                            "unexpected root element <{name}> in {}",
                            truncate_for_log(body, 120)
                        )));
                    }
                    saw_root = true;
                    continue;
                }
                if name == "url" {
                    current = Some(CandidateUrl::new(String::new()));
                    continue;
                }
                if current.is_some() {
                    field = match &*name {
                        "loc" => Some(Field::Loc),
                        "news:language" => Some(Field::Language),
                        "news:title" => Some(Field::NewsTitle),
                        other if Some(other) == date_element => Some(Field::Date),
                        _ => None,
                    };
                    text.clear();
                }
            }
            Ok(Event::Text(e)) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::GeneralRef(e)) if field.is_some() => {
                text.push('&');
                text.push_str(&String::from_utf8_lossy(&e));
                text.push(';');
            }
            Ok(Event::CData(e)) if field.is_some() => {
                let raw = String::from_utf8_lossy(&e).into_owned();
                text.push_str(&quick_xml::escape::escape(raw.as_str()));
            }
            Ok(Event::End(e)) => {
                let qname = e.name();
                let name = String::from_utf8_lossy(qname.as_ref());
                if name == "url" {
                    if let Some(candidate) = current.take() {
                        if candidate.location.is_empty() {
                            warn!("Sitemap <url> entry without <loc>; skipping");
                        } else {
                            candidates.push(candidate);
                        }
                    }
                    field = None;
                    continue;
                }
                if let (Some(f), Some(candidate)) = (field.take(), current.as_mut()) {
                    let value = unescape_lossy(&text);
                    let value = value.trim().to_string();
                    text.clear();
                    match f {
                        Field::Loc => candidate.location = value,
                        Field::Date => candidate.recency_value = Some(value),
                        Field::Language => candidate.language_tag = Some(value),
                        Field::NewsTitle => candidate.news_title = Some(value),
                    }
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(DiscoveryError::Sitemap(format!(
                    "at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
        }
    }

    if !saw_root {
        return Err(DiscoveryError::Sitemap("document has no root element".to_string()));
    }
    Ok(candidates)
}

fn unescape_lossy(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(value) => value.into_owned(),
        Err(_) => raw.to_string(),
    }
}

/// Harvest anchors from a listing page.
pub fn parse_listing(body: &str, anchors: &Selector, base: &Url) -> Vec<CandidateUrl> {
    let document = Html::parse_document(body);
    document
        .select(anchors)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .map(|url| url.to_string())
        .unique()
        .map(CandidateUrl::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEWS_SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:news="http://www.google.com/schemas/sitemap-news/0.9"
        xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
  <url>
    <loc>https://example.com/a?x=1&amp;y=2</loc>
    <lastmod>2024-05-10T08:15:00+00:00</lastmod>
    <news:news>
      <news:publication><news:name>Example</news:name><news:language>en</news:language></news:publication>
      <news:publication_date>2024-05-09T22:00:00Z</news:publication_date>
      <news:title>Bitcoin &amp; friends</news:title>
    </news:news>
    <image:image><image:loc>https://cdn.example.com/a.jpg</image:loc></image:image>
  </url>
  <url>
    <loc><![CDATA[https://example.com/b]]></loc>
    <news:news><news:publication><news:language>es</news:language></news:publication></news:news>
  </url>
  <url>
    <lastmod>2024-05-10</lastmod>
  </url>
</urlset>"#;

    #[test]
    fn test_parse_sitemap_reads_lastmod_language_and_title() {
        let candidates = parse_sitemap(NEWS_SITEMAP, DateField::LastMod).unwrap();
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.location, "https://example.com/a?x=1&y=2");
        assert_eq!(first.recency_value.as_deref(), Some("2024-05-10T08:15:00+00:00"));
        assert_eq!(first.language_tag.as_deref(), Some("en"));
        assert_eq!(first.news_title.as_deref(), Some("Bitcoin & friends"));

        let second = &candidates[1];
        assert_eq!(second.location, "https://example.com/b");
        assert_eq!(second.recency_value, None);
        assert_eq!(second.language_tag.as_deref(), Some("es"));
    }

    #[test]
    fn test_parse_sitemap_reads_publication_date() {
        let candidates = parse_sitemap(NEWS_SITEMAP, DateField::PublicationDate).unwrap();
        assert_eq!(
            candidates[0].recency_value.as_deref(),
            Some("2024-05-09T22:00:00Z")
        );
    }

    #[test]
    fn test_image_loc_does_not_overwrite_article_loc() {
        let candidates = parse_sitemap(NEWS_SITEMAP, DateField::LastMod).unwrap();
        assert!(!candidates[0].location.contains("cdn.example.com"));
    }

    #[test]
    fn test_parse_sitemap_is_idempotent() {
        let first = parse_sitemap(NEWS_SITEMAP, DateField::LastMod).unwrap();
        let second = parse_sitemap(NEWS_SITEMAP, DateField::LastMod).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sitemap_index_yields_no_candidates() {
        let body = r#"<sitemapindex><sitemap><loc>https://example.com/s1.xml</loc></sitemap></sitemapindex>"#;
        assert!(parse_sitemap(body, DateField::LastMod).unwrap().is_empty());
    }

    #[test]
    fn test_html_body_is_rejected() {
        let body = "<html><body><p>Access denied</p></body></html>";
        let err = parse_sitemap(body, DateField::LastMod).unwrap_err();
        assert!(matches!(err, DiscoveryError::Sitemap(_)));
    }

    #[test]
    fn test_malformed_xml_is_rejected() {
        let body = "<urlset><url><loc>https://example.com</url></urlset>";
        assert!(parse_sitemap(body, DateField::LastMod).is_err());
    }

    #[test]
    fn test_empty_body_is_rejected() {
        assert!(parse_sitemap("", DateField::LastMod).is_err());
    }

    #[test]
    fn test_parse_listing_resolves_and_dedups() {
        let body = r#"
            <html><body>
              <a class="post-card-inline__title-link" href="/news/one">One</a>
              <a class="post-card-inline__title-link" href="https://example.com/news/two">Two</a>
              <a class="post-card-inline__title-link" href="/news/one">One again</a>
              <a class="post-card-inline__title-link" href="javascript:void(0)">Bad</a>
              <a class="other" href="/news/three">Three</a>
            </body></html>"#;
        let selector = Selector::parse("a.post-card-inline__title-link").unwrap();
        let base = Url::parse("https://example.com/tags/cryptocurrencies").unwrap();
        let candidates = parse_listing(body, &selector, &base);
        let locations: Vec<&str> = candidates.iter().map(|c| c.location.as_str()).collect();
        assert_eq!(
            locations,
            vec!["https://example.com/news/one", "https://example.com/news/two"]
        );
        assert!(candidates.iter().all(|c| c.recency_value.is_none()));
    }
}
