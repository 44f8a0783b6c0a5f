//! Source pipeline.
//!
//! One generic run per [`Source`]:
//!
//! ```text
//! Discovering ──fail──▶ DiscoveryFailed (error result)
//!      │
//!      ▼
//! Filtering ──▶ FetchingPages (bounded fan-out) ──▶ Done (PipelineReport)
//! ```
//!
//! Each accepted candidate is fetched and extracted independently. A page
//! that fails to fetch, times out, misses a required field, or turns out to
//! be outside the recency window is counted as incomplete and never cancels
//! its siblings. Fan-out is bounded twice: by `per_source` in-flight pages
//! for this source, and by a process-wide semaphore shared by every source.

use crate::config::{Source, TitleRule};
use crate::error::PipelineError;
use crate::models::{Article, CandidateUrl, PipelineReport};
use crate::observe::{PipelineEvent, PipelineObserver};
use crate::scrapers::fetch::Session;
use crate::scrapers::{assemble, extract, recency, sitemap};
use chrono::{Local, NaiveDate};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};

/// Runtime bounds applied to every pipeline.
#[derive(Debug, Clone)]
pub struct Limits {
    pub request_timeout: Duration,
    /// Maximum in-flight page fetches for one source.
    pub per_source: usize,
    /// Permits shared by all sources.
    pub global: Arc<Semaphore>,
}

impl Limits {
    pub fn new(request_timeout: Duration, per_source: usize, global: usize) -> Self {
        Self {
            request_timeout,
            per_source: per_source.max(1),
            global: Arc::new(Semaphore::new(global.clamp(1, Semaphore::MAX_PERMITS))),
        }
    }
}

enum PageOutcome {
    Complete(Box<Article>),
    Incomplete,
}

/// A configured pipeline for one source.
#[derive(Clone)]
pub struct SourcePipeline {
    source: Arc<Source>,
    observer: Arc<dyn PipelineObserver>,
    limits: Limits,
}

impl SourcePipeline {
    pub fn new(source: Arc<Source>, observer: Arc<dyn PipelineObserver>, limits: Limits) -> Self {
        Self {
            source,
            observer,
            limits,
        }
    }

    /// Run against the server's local date.
    pub async fn run(&self) -> Result<PipelineReport, PipelineError> {
        self.run_on(Local::now().date_naive()).await
    }

    /// Run with an explicit "today" for the recency window.
    ///
    /// # Returns
    ///
    /// The source's articles and completeness counters, or the discovery
    /// error that stopped the run. The HTTP session is dropped on return
    /// either way.
    #[instrument(level = "info", skip_all, fields(source = %self.source.name, %today))]
    pub async fn run_on(&self, today: NaiveDate) -> Result<PipelineReport, PipelineError> {
        let source = &self.source;
        let session = Session::for_source(source, self.limits.request_timeout)?;

        // Discovering
        let candidates = match sitemap::resolve(&session, source).await {
            Ok(candidates) => {
                self.observer.record(&PipelineEvent::DiscoveryFetched {
                    source: source.name.clone(),
                    url: source.discovery_url.to_string(),
                    candidates: candidates.len(),
                });
                candidates
            }
            Err(e) => {
                self.observer.record(&PipelineEvent::DiscoveryFailed {
                    source: source.name.clone(),
                    url: source.discovery_url.to_string(),
                    error: e.to_string(),
                });
                return Err(e.into());
            }
        };

        // Filtering
        let discovered = candidates.len();
        let accepted = recency::filter(candidates, &source.recency, today);
        self.observer.record(&PipelineEvent::CandidatesFiltered {
            source: source.name.clone(),
            discovered,
            accepted: accepted.len(),
        });

        // FetchingPages
        let outcomes: Vec<PageOutcome> = stream::iter(accepted)
            .map(|candidate| self.process_page(&session, candidate, today))
            .buffer_unordered(self.limits.per_source)
            .collect()
            .await;

        // Done
        let mut report = PipelineReport::default();
        for outcome in outcomes {
            match outcome {
                PageOutcome::Complete(article) => {
                    report.articles.push(*article);
                    report.complete_count += 1;
                }
                PageOutcome::Incomplete => report.incomplete_count += 1,
            }
        }

        self.observer.record(&PipelineEvent::PipelineCompleted {
            source: source.name.clone(),
            total_articles: report.articles.len(),
            complete: report.complete_count,
            incomplete: report.incomplete_count,
        });
        Ok(report)
    }

    async fn process_page(&self, session: &Session, candidate: CandidateUrl, today: NaiveDate) -> PageOutcome {
        let source = &self.source;

        if matches!(source.rules.title, TitleRule::Sitemap) && candidate.news_title.is_none() {
            self.incomplete(&candidate, vec!["title"]);
            return PageOutcome::Incomplete;
        }

        let body = {
            let _permit = match self.limits.global.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    self.page_failed(&candidate, e.to_string());
                    return PageOutcome::Incomplete;
                }
            };
            match session.fetch(&candidate.location).await {
                Ok(body) => body,
                Err(e) => {
                    self.page_failed(&candidate, e.to_string());
                    return PageOutcome::Incomplete;
                }
            }
        };

        let page = extract::extract(&body, &source.rules, &candidate);

        if let Some(published) = page.page_date.as_deref() {
            let stale = recency::parse_date(published, source.recency.format)
                .is_some_and(|date| !recency::in_window(date, today, source.recency.window_days));
            if stale {
                self.observer.record(&PipelineEvent::PageOutOfWindow {
                    source: source.name.clone(),
                    url: candidate.location.clone(),
                    published: published.to_string(),
                });
                return PageOutcome::Incomplete;
            }
        }

        let missing = page.extraction.missing_fields();
        if !missing.is_empty() {
            self.incomplete(&candidate, missing);
            return PageOutcome::Incomplete;
        }

        debug!(url = %candidate.location, "Extracted complete article");
        PageOutcome::Complete(Box::new(assemble::assemble(page.extraction, source, &candidate)))
    }

    fn page_failed(&self, candidate: &CandidateUrl, error: String) {
        self.observer.record(&PipelineEvent::PageFailed {
            source: self.source.name.clone(),
            url: candidate.location.clone(),
            error,
        });
    }

    fn incomplete(&self, candidate: &CandidateUrl, missing: Vec<&'static str>) {
        self.observer.record(&PipelineEvent::ArticleIncomplete {
            source: self.source.name.clone(),
            url: candidate.location.clone(),
            missing,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceRegistry;
    use crate::error::DiscoveryError;
    use crate::observe::RecordingObserver;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn sitemap_source(base: &str) -> Arc<Source> {
        let yaml = format!(
            r#"
- name: Mock News
  route: mockNews
  discovery: sitemap_xml
  discovery_url: {base}/sitemap.xml
  date_field: last_mod
  window_days: 1
  rules:
    title: {{ selector: "h1" }}
    author: "span.author"
    content:
      paragraphs: "article p"
"#
        );
        let registry = SourceRegistry::from_yaml_str(&yaml).unwrap();
        registry.sources()[0].clone()
    }

    fn listing_source(base: &str) -> Arc<Source> {
        let yaml = format!(
            r#"
- name: Mock Listing
  route: mockListing
  discovery: listing_html
  discovery_url: {base}/latest
  listing_selector: "a.story"
  window_days: 1
  rules:
    title: {{ selector: "h1" }}
    author: "span.author"
    content:
      paragraphs: "article p"
    page_date:
      selector: "time"
      attribute: datetime
"#
        );
        let registry = SourceRegistry::from_yaml_str(&yaml).unwrap();
        registry.sources()[0].clone()
    }

    fn page(author: Option<&str>, published: &str) -> String {
        let byline = author
            .map(|a| format!(r#"<span class="author">{a}</span>"#))
            .unwrap_or_default();
        format!(
            r#"<html><body><h1>Headline</h1>{byline}<time datetime="{published}"></time>
               <article><p>Body text.</p></article></body></html>"#
        )
    }

    async fn mount_page(server: &MockServer, route: &str, status: u16, body: String, hits: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .expect(hits)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_completeness_partition() {
        let server = MockServer::start().await;
        let base = server.uri();
        let sitemap = format!(
            r#"<urlset>
                 <url><loc>{base}/a</loc><lastmod>2024-05-10T08:00:00Z</lastmod></url>
                 <url><loc>{base}/b</loc><lastmod>2024-05-09T08:00:00Z</lastmod></url>
                 <url><loc>{base}/c</loc><lastmod>2024-05-01T08:00:00Z</lastmod></url>
                 <url><loc>{base}/d</loc><lastmod>2024-05-10T09:00:00Z</lastmod></url>
                 <url><loc>{base}/e</loc></url>
               </urlset>"#
        );
        mount_page(&server, "/sitemap.xml", 200, sitemap, 1).await;
        mount_page(&server, "/a", 200, page(Some("Jane Doe"), ""), 1).await;
        mount_page(&server, "/b", 200, page(None, ""), 1).await;
        mount_page(&server, "/c", 200, page(Some("Old"), ""), 0).await;
        mount_page(&server, "/d", 500, String::new(), 1).await;
        mount_page(&server, "/e", 200, page(Some("Undated"), ""), 0).await;

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = SourcePipeline::new(
            sitemap_source(&base),
            observer.clone(),
            Limits::new(Duration::from_secs(5), 2, 1),
        );
        let report = pipeline.run_on(today()).await.unwrap();

        assert_eq!(report.complete_count, 1);
        assert_eq!(report.incomplete_count, 2);
        assert_eq!(report.accepted(), 3);
        assert_eq!(report.articles.len(), 1);
        assert_eq!(report.articles[0].link, format!("{base}/a"));
        assert_eq!(report.articles[0].metadata.author, "Jane Doe");

        let events = observer.events();
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::ArticleIncomplete { missing, .. } if missing == &vec!["author"]
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::PageFailed { url, .. } if url.ends_with("/d"))));
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::CandidatesFiltered { discovered: 5, accepted: 3, .. }
        )));
        assert!(matches!(
            events.last(),
            Some(PipelineEvent::PipelineCompleted { total_articles: 1, complete: 1, incomplete: 2, .. })
        ));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_discovery_failure_is_an_error_result() {
        let server = MockServer::start().await;
        mount_page(&server, "/sitemap.xml", 503, String::new(), 1).await;

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = SourcePipeline::new(
            sitemap_source(&server.uri()),
            observer.clone(),
            Limits::new(Duration::from_secs(5), 4, 4),
        );
        let err = pipeline.run_on(today()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Discovery(DiscoveryError::Fetch(_))), "{err}");
        assert!(matches!(
            observer.events().as_slice(),
            [PipelineEvent::DiscoveryFailed { .. }]
        ));
    }

    #[tokio::test]
    async fn test_unparsable_sitemap_is_a_discovery_error() {
        let server = MockServer::start().await;
        mount_page(&server, "/sitemap.xml", 200, "<html>blocked</html>".into(), 1).await;

        let pipeline = SourcePipeline::new(
            sitemap_source(&server.uri()),
            Arc::new(RecordingObserver::new()),
            Limits::new(Duration::from_secs(5), 4, 4),
        );
        let err = pipeline.run_on(today()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Discovery(DiscoveryError::Sitemap(_))), "{err}");
    }

    #[tokio::test]
    async fn test_listing_source_checks_page_dates() {
        let server = MockServer::start().await;
        let listing = r#"<html><body>
              <a class="story" href="/fresh">Fresh</a>
              <a class="story" href="/stale">Stale</a>
              <a class="story" href="/fresh">Fresh again</a>
            </body></html>"#;
        mount_page(&server, "/latest", 200, listing.into(), 1).await;
        mount_page(&server, "/fresh", 200, page(Some("A"), "2024-05-10T06:00:00Z"), 1).await;
        mount_page(&server, "/stale", 200, page(Some("B"), "2024-04-01T06:00:00Z"), 1).await;

        let observer = Arc::new(RecordingObserver::new());
        let pipeline = SourcePipeline::new(
            listing_source(&server.uri()),
            observer.clone(),
            Limits::new(Duration::from_secs(5), 4, 4),
        );
        let report = pipeline.run_on(today()).await.unwrap();

        assert_eq!(report.complete_count, 1);
        assert_eq!(report.incomplete_count, 1);
        assert!(report.articles[0].link.ends_with("/fresh"));
        assert!(observer
            .events()
            .iter()
            .any(|e| matches!(e, PipelineEvent::PageOutOfWindow { url, .. } if url.ends_with("/stale"))));
        server.verify().await;
    }

    #[tokio::test]
    async fn test_slow_page_counts_as_incomplete() {
        let server = MockServer::start().await;
        let base = server.uri();
        let sitemap = format!(
            r#"<urlset><url><loc>{base}/slow</loc><lastmod>2024-05-10</lastmod></url></urlset>"#
        );
        mount_page(&server, "/sitemap.xml", 200, sitemap, 1).await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page(Some("A"), ""))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let pipeline = SourcePipeline::new(
            sitemap_source(&base),
            Arc::new(RecordingObserver::new()),
            Limits::new(Duration::from_millis(100), 4, 4),
        );
        let report = pipeline.run_on(today()).await.unwrap();
        assert_eq!(report.complete_count, 0);
        assert_eq!(report.incomplete_count, 1);
    }

    async fn mount_delayed_pages(server: &MockServer, count: usize, delay: Duration) -> String {
        let base = server.uri();
        let urls: String = (0..count)
            .map(|i| format!("<url><loc>{base}/p{i}</loc><lastmod>2024-05-10</lastmod></url>"))
            .collect();
        mount_page(server, "/sitemap.xml", 200, format!("<urlset>{urls}</urlset>"), 1).await;
        for i in 0..count {
            Mock::given(method("GET"))
                .and(path(format!("/p{i}")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_string(page(Some("A"), ""))
                        .set_delay(delay),
                )
                .mount(server)
                .await;
        }
        base
    }

    #[tokio::test]
    async fn test_per_source_cap_serializes_page_fetches() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(200);
        let base = mount_delayed_pages(&server, 4, delay).await;

        let pipeline = SourcePipeline::new(
            sitemap_source(&base),
            Arc::new(RecordingObserver::new()),
            Limits::new(Duration::from_secs(5), 1, 8),
        );
        let started = std::time::Instant::now();
        let report = pipeline.run_on(today()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.complete_count, 4);
        // one page in flight at a time: four full delays back to back
        assert!(elapsed >= delay * 4, "finished in {elapsed:?}");
    }

    #[tokio::test]
    async fn test_wider_per_source_cap_overlaps_page_fetches() {
        let server = MockServer::start().await;
        let delay = Duration::from_millis(200);
        let base = mount_delayed_pages(&server, 4, delay).await;

        let pipeline = SourcePipeline::new(
            sitemap_source(&base),
            Arc::new(RecordingObserver::new()),
            Limits::new(Duration::from_secs(5), 4, 8),
        );
        let started = std::time::Instant::now();
        let report = pipeline.run_on(today()).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.complete_count, 4);
        assert!(elapsed < delay * 4, "finished in {elapsed:?}");
    }

    #[test]
    fn test_limits_are_clamped() {
        let limits = Limits::new(Duration::from_secs(1), 0, usize::MAX);
        assert_eq!(limits.per_source, 1);
        assert_eq!(limits.global.available_permits(), Semaphore::MAX_PERMITS);

        let limits = Limits::new(Duration::from_secs(1), 3, 0);
        assert_eq!(limits.per_source, 3);
        assert_eq!(limits.global.available_permits(), 1);
    }
}
