//! Source adapter configuration.
//!
//! Every publisher is described by data, not code. The YAML document in
//! `config/sources.yaml` is embedded at build time and can be replaced at
//! runtime with `--sources <path>`. Loading happens in two stages:
//!
//! 1. **Parse** the YAML into [`SourceSpec`] values (plain strings).
//! 2. **Compile** each spec into a [`Source`], parsing every CSS selector,
//!    cleanup pattern and URL up front so a typo fails at startup rather
//!    than on the first request.
//!
//! # Example
//!
//! ```yaml
//! - name: Coin Desk
//!   route: coinDesk
//!   discovery: sitemap_xml
//!   discovery_url: https://www.coindesk.com/arc/outboundfeeds/news-sitemap-index/?outputType=xml
//!   date_field: last_mod
//!   window_days: 1
//!   language: en
//!   rules:
//!     title: { selector: "h1" }
//!     author: "div.at-authors a"
//!     content:
//!       paragraphs: "section.at-body p"
//! ```

use crate::error::ConfigError;
use regex::{Regex, RegexBuilder};
use scraper::Selector;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use url::Url;

/// The built-in adapter table.
const BUILTIN_SOURCES: &str = include_str!("../config/sources.yaml");

/// Headers presented to sources that do not declare their own.
pub const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3",
    ),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
    ),
    ("Accept-Language", "en-US,en;q=0.5"),
    ("DNT", "1"),
    ("Upgrade-Insecure-Requests", "1"),
];

/// How candidate URLs are harvested from the discovery document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryKind {
    SitemapXml,
    ListingHtml,
}

/// Which sitemap element carries recency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    /// `<lastmod>`
    LastMod,
    /// `<news:publication_date>`
    PublicationDate,
    #[default]
    None,
}

impl DateField {
    /// Qualified element name inside a sitemap `<url>` entry.
    pub fn element_name(self) -> Option<&'static str> {
        match self {
            DateField::LastMod => Some("lastmod"),
            DateField::PublicationDate => Some("news:publication_date"),
            DateField::None => None,
        }
    }
}

/// Textual shape of the recency value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// ISO-8601 timestamp (`2024-05-10T08:00:00+00:00`, `...Z`, or no offset).
    /// A bare calendar date is tolerated.
    #[default]
    Timestamp,
    /// Strict `YYYY-MM-DD`.
    DateOnly,
}

/// Where `metadata.articlePublishedOn` comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishedOn {
    /// Extraction date, `"%d %B, %Y"`.
    #[default]
    ExtractionDate,
    /// The candidate's sitemap date, `"%B %d, %Y"`.
    SitemapDate,
}

// ---------------------------------------------------------------------------
// Raw YAML shapes
// ---------------------------------------------------------------------------

/// One adapter as written in YAML.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub route: String,
    pub discovery: DiscoveryKind,
    pub discovery_url: String,
    #[serde(default)]
    pub listing_selector: Option<String>,
    #[serde(default)]
    pub date_field: DateField,
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default)]
    pub window_days: u32,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub published_on: PublishedOn,
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    pub rules: RulesSpec,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RulesSpec {
    pub title: TitleSpec,
    pub author: String,
    pub content: ContentSpec,
    #[serde(default)]
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub page_date: Option<PageDateSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TitleSpec {
    #[serde(default)]
    pub selector: Option<String>,
    #[serde(default)]
    pub from_sitemap: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContentSpec {
    pub paragraphs: String,
    #[serde(default)]
    pub exclude: Vec<ExclusionSpec>,
    #[serde(default)]
    pub stop_at: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default)]
    pub cleanup: Vec<String>,
}

fn default_separator() -> String {
    "\n".to_string()
}

/// Exactly one of the three keys must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct ExclusionSpec {
    #[serde(default)]
    pub inside: Option<String>,
    #[serde(default)]
    pub contains: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageSpec {
    pub selector: String,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PageDateSpec {
    pub selector: String,
    #[serde(default)]
    pub attribute: Option<String>,
}

// ---------------------------------------------------------------------------
// Compiled shapes
// ---------------------------------------------------------------------------

/// A fully validated source adapter.
#[derive(Debug, Clone)]
pub struct Source {
    /// Display name, used as `metadata.articleSource`.
    pub name: String,
    /// Route key; the endpoint is `/<route>Scrapped`.
    pub route: String,
    pub discovery_url: Url,
    pub discovery: Discovery,
    pub recency: RecencyRule,
    pub published_on: PublishedOn,
    pub headers: Vec<(String, String)>,
    pub rules: ExtractionRules,
}

impl Source {
    pub fn endpoint(&self) -> String {
        format!("/{}Scrapped", self.route)
    }

    /// Message returned to callers when discovery fails.
    pub fn discovery_failure_message(&self) -> &'static str {
        match self.discovery {
            Discovery::Sitemap => "Failed to fetch sitemap.",
            Discovery::Listing { .. } => "Failed to fetch main page.",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Discovery {
    Sitemap,
    Listing { anchors: Selector },
}

#[derive(Debug, Clone)]
pub struct RecencyRule {
    pub field: DateField,
    pub format: DateFormat,
    pub window_days: u32,
    pub language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExtractionRules {
    pub title: TitleRule,
    pub author: Selector,
    pub content: ContentRule,
    pub image: Option<ImageRule>,
    pub page_date: Option<PageDateRule>,
}

#[derive(Debug, Clone)]
pub enum TitleRule {
    Page(Selector),
    /// Use the `<news:title>` carried by the sitemap entry.
    Sitemap,
}

#[derive(Debug, Clone)]
pub struct ContentRule {
    pub paragraphs: Selector,
    pub exclusions: Vec<Exclusion>,
    pub stop_at: Option<String>,
    pub separator: String,
    pub cleanup: Vec<Regex>,
}

/// Predicate that removes a paragraph from the article body.
#[derive(Debug, Clone)]
pub enum Exclusion {
    /// Paragraph has an ancestor matching the selector.
    Inside(Selector),
    /// Paragraph has a descendant matching the selector.
    Contains(Selector),
    /// Paragraph text contains the phrase.
    Text(String),
}

#[derive(Debug, Clone)]
pub struct ImageRule {
    pub selector: Selector,
    pub attributes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct PageDateRule {
    pub selector: Selector,
    /// Read this attribute; element text when `None`.
    pub attribute: Option<String>,
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

fn compile_selector(source_name: &str, raw: &str) -> Result<Selector, ConfigError> {
    Selector::parse(raw).map_err(|e| ConfigError::Selector {
        source_name: source_name.to_string(),
        selector: raw.to_string(),
        reason: e.to_string(),
    })
}

fn compile_cleanup(source_name: &str, phrase: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(&regex::escape(phrase))
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::Pattern {
            source_name: source_name.to_string(),
            pattern: phrase.to_string(),
            reason: e.to_string(),
        })
}

impl SourceSpec {
    /// Validate and compile into a [`Source`].
    pub fn compile(&self) -> Result<Source, ConfigError> {
        let name = self.name.as_str();
        let invalid = |reason: &str| ConfigError::Invalid {
            source_name: name.to_string(),
            reason: reason.to_string(),
        };

        if self.route.trim().is_empty() {
            return Err(invalid("route must not be empty"));
        }

        let discovery_url = Url::parse(&self.discovery_url).map_err(|e| ConfigError::Url {
            source_name: name.to_string(),
            url: self.discovery_url.clone(),
            reason: e.to_string(),
        })?;

        let discovery = match (self.discovery, &self.listing_selector) {
            (DiscoveryKind::SitemapXml, _) => Discovery::Sitemap,
            (DiscoveryKind::ListingHtml, Some(raw)) => Discovery::Listing {
                anchors: compile_selector(name, raw)?,
            },
            (DiscoveryKind::ListingHtml, None) => {
                return Err(invalid("listing_html discovery requires listing_selector"));
            }
        };

        if self.discovery == DiscoveryKind::SitemapXml && self.date_field == DateField::None {
            return Err(invalid("sitemap_xml discovery requires a date_field"));
        }
        if self.published_on == PublishedOn::SitemapDate && self.date_field == DateField::None {
            return Err(invalid("published_on: sitemap_date requires a date_field"));
        }

        let title = match (&self.rules.title.selector, self.rules.title.from_sitemap) {
            (Some(raw), false) => TitleRule::Page(compile_selector(name, raw)?),
            (None, true) if self.discovery == DiscoveryKind::SitemapXml => TitleRule::Sitemap,
            (None, true) => return Err(invalid("title.from_sitemap needs sitemap_xml discovery")),
            _ => return Err(invalid("title needs exactly one of selector / from_sitemap")),
        };

        let content = &self.rules.content;
        let mut exclusions = Vec::with_capacity(content.exclude.len());
        for ex in &content.exclude {
            let compiled = match (&ex.inside, &ex.contains, &ex.text) {
                (Some(sel), None, None) => Exclusion::Inside(compile_selector(name, sel)?),
                (None, Some(sel), None) => Exclusion::Contains(compile_selector(name, sel)?),
                (None, None, Some(phrase)) => Exclusion::Text(phrase.clone()),
                _ => return Err(invalid("each exclusion needs exactly one of inside / contains / text")),
            };
            exclusions.push(compiled);
        }

        let cleanup = content
            .cleanup
            .iter()
            .map(|phrase| compile_cleanup(name, phrase))
            .collect::<Result<Vec<_>, _>>()?;

        let image = match &self.rules.image {
            Some(spec) if spec.attributes.is_empty() => {
                return Err(invalid("image.attributes must list at least one attribute"));
            }
            Some(spec) => Some(ImageRule {
                selector: compile_selector(name, &spec.selector)?,
                attributes: spec.attributes.clone(),
            }),
            None => None,
        };

        let page_date = match &self.rules.page_date {
            Some(spec) => Some(PageDateRule {
                selector: compile_selector(name, &spec.selector)?,
                attribute: spec.attribute.clone(),
            }),
            None => None,
        };

        let headers = match &self.headers {
            Some(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => DEFAULT_HEADERS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        Ok(Source {
            name: self.name.clone(),
            route: self.route.clone(),
            discovery_url,
            discovery,
            recency: RecencyRule {
                field: self.date_field,
                format: self.date_format,
                window_days: self.window_days,
                language: self.language.clone(),
            },
            published_on: self.published_on,
            headers,
            rules: ExtractionRules {
                title,
                author: compile_selector(name, &self.rules.author)?,
                content: ContentRule {
                    paragraphs: compile_selector(name, &content.paragraphs)?,
                    exclusions,
                    stop_at: content.stop_at.clone(),
                    separator: content.separator.clone(),
                    cleanup,
                },
                image,
                page_date,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All configured sources, in registration order.
///
/// Registration order is the order of the YAML document and is the order in
/// which `/runAllEndpoints` concatenates results.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    sources: Vec<Arc<Source>>,
}

impl SourceRegistry {
    /// Compile the embedded adapter table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_SOURCES)
    }

    /// Load from a YAML file on disk.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let specs: Vec<SourceSpec> = serde_yaml::from_str(raw)?;
        Self::from_specs(&specs)
    }

    pub fn from_specs(specs: &[SourceSpec]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut sources = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.route.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateRoute(spec.route.clone()));
            }
            let source = spec.compile()?;
            debug!(source = %source.name, endpoint = %source.endpoint(), "Compiled source adapter");
            sources.push(Arc::new(source));
        }
        info!(count = sources.len(), "Loaded source adapters");
        Ok(Self { sources })
    }

    pub fn sources(&self) -> &[Arc<Source>] {
        &self.sources
    }

    /// Look up a source by route key, case-insensitively.
    pub fn get(&self, route: &str) -> Option<&Arc<Source>> {
        self.sources
            .iter()
            .find(|s| s.route.eq_ignore_ascii_case(route))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
