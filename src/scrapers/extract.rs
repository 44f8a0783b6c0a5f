//! Page extractor.
//!
//! Applies a source's [`ExtractionRules`] to one fetched article page. The
//! document is parsed, queried and dropped inside a single synchronous call,
//! so no parsed tree is ever held across an `.await`.
//!
//! # Content assembly
//!
//! 1. Select every node matching the paragraph selector, in document order.
//! 2. Stop before the first paragraph containing the stop marker, if any.
//! 3. Drop paragraphs matching any exclusion predicate, and empty ones.
//! 4. Join the rest with the source separator.
//! 5. Strip boilerplate phrases (case-insensitive) and trim.

use crate::config::{ContentRule, Exclusion, ExtractionRules, ImageRule, PageDateRule, TitleRule};
use crate::models::{CandidateUrl, Extraction, IMAGE_NOT_FOUND};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

/// Narrow query surface over a parsed page.
pub struct Page {
    document: Html,
}

impl Page {
    pub fn parse(body: &str) -> Self {
        Self {
            document: Html::parse_document(body),
        }
    }

    pub fn first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.document.select(selector).next()
    }

    pub fn all<'a>(&'a self, selector: &'a Selector) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.document.select(selector)
    }

    /// Text of the first match, whitespace-collapsed. `None` if absent or empty.
    pub fn first_text(&self, selector: &Selector) -> Option<String> {
        self.first(selector).map(text_of).filter(|t| !t.is_empty())
    }
}

/// All text under `element` with runs of whitespace collapsed to one space.
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).join(" ")
}

/// Fields pulled from one page, plus its own publication date if the
/// source declares a page-level date rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub extraction: Extraction,
    pub page_date: Option<String>,
}

/// Extract title, author, content and image from an article page body.
pub fn extract(body: &str, rules: &ExtractionRules, candidate: &CandidateUrl) -> ExtractedPage {
    let page = Page::parse(body);

    let title = match &rules.title {
        TitleRule::Page(selector) => page.first_text(selector),
        TitleRule::Sitemap => candidate
            .news_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string),
    };

    let extraction = Extraction {
        title,
        author: page.first_text(&rules.author),
        content: content(&page, &rules.content),
        image_uri: rules
            .image
            .as_ref()
            .map(|rule| image(&page, rule))
            .unwrap_or_default(),
    };

    ExtractedPage {
        extraction,
        page_date: rules.page_date.as_ref().and_then(|rule| page_date(&page, rule)),
    }
}

fn content(page: &Page, rule: &ContentRule) -> Option<String> {
    let mut kept = Vec::new();
    for paragraph in page.all(&rule.paragraphs) {
        let text = text_of(paragraph);
        if rule.stop_at.as_deref().is_some_and(|marker| text.contains(marker)) {
            break;
        }
        if text.is_empty() || rule.exclusions.iter().any(|ex| excludes(ex, paragraph, &text)) {
            continue;
        }
        kept.push(text);
    }

    let mut joined = kept.join(&rule.separator);
    for pattern in &rule.cleanup {
        joined = pattern.replace_all(&joined, "").into_owned();
    }
    let joined = joined.trim();
    (!joined.is_empty()).then(|| joined.to_string())
}

fn excludes(exclusion: &Exclusion, paragraph: ElementRef<'_>, text: &str) -> bool {
    match exclusion {
        Exclusion::Inside(selector) => paragraph
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| selector.matches(&ancestor)),
        Exclusion::Contains(selector) => paragraph
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .any(|child| selector.matches(&child)),
        Exclusion::Text(phrase) => text.contains(phrase.as_str()),
    }
}

fn image(page: &Page, rule: &ImageRule) -> String {
    page.first(&rule.selector)
        .and_then(|img| {
            rule.attributes
                .iter()
                .filter_map(|attr| img.value().attr(attr))
                .map(str::trim)
                .find(|value| !value.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| IMAGE_NOT_FOUND.to_string())
}

fn page_date(page: &Page, rule: &PageDateRule) -> Option<String> {
    let element = page.first(&rule.selector)?;
    let raw = match &rule.attribute {
        Some(attr) => element.value().attr(attr)?.trim().to_string(),
        None => text_of(element),
    };
    (!raw.is_empty()).then_some(raw)
}
