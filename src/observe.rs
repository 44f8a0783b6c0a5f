//! Pipeline observation.
//!
//! Pipelines never log through a global sink directly. Each one is handed an
//! `Arc<dyn PipelineObserver>` at construction and reports what happened as
//! [`PipelineEvent`] values. [`TracingObserver`] turns those into structured
//! `tracing` events; [`RecordingObserver`] keeps them in memory for tests.

use crate::utils::clock_labels;
use chrono::Local;
use std::sync::Mutex;
use tracing::{error, info, warn};

/// Events a pipeline can report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    DiscoveryFetched {
        source: String,
        url: String,
        candidates: usize,
    },
    DiscoveryFailed {
        source: String,
        url: String,
        error: String,
    },
    CandidatesFiltered {
        source: String,
        discovered: usize,
        accepted: usize,
    },
    PageFailed {
        source: String,
        url: String,
        error: String,
    },
    ArticleIncomplete {
        source: String,
        url: String,
        missing: Vec<&'static str>,
    },
    PageOutOfWindow {
        source: String,
        url: String,
        published: String,
    },
    PipelineCompleted {
        source: String,
        total_articles: usize,
        complete: usize,
        incomplete: usize,
    },
    SourceAborted {
        source: String,
        error: String,
    },
    AggregateCompleted {
        sources: usize,
        articles: usize,
    },
    AggregateFailed {
        error: String,
    },
}

/// Logging collaborator injected into every pipeline.
pub trait PipelineObserver: Send + Sync {
    fn record(&self, event: &PipelineEvent);

    fn name(&self) -> &str;
}

/// Emits each event through `tracing` at a level matching its severity.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn record(&self, event: &PipelineEvent) {
        match event {
            PipelineEvent::DiscoveryFetched {
                source,
                url,
                candidates,
            } => {
                info!(%source, %url, candidates, "Successfully fetched the sitemap.");
            }
            PipelineEvent::DiscoveryFailed { source, url, error } => {
                error!(%source, %url, %error, "Failed to fetch discovery document");
            }
            PipelineEvent::CandidatesFiltered {
                source,
                discovered,
                accepted,
            } => {
                info!(%source, discovered, accepted, "Filtered candidates to recency window");
            }
            PipelineEvent::PageFailed { source, url, error } => {
                error!(%source, %url, %error, "Failed to fetch page content");
            }
            PipelineEvent::ArticleIncomplete {
                source,
                url,
                missing,
            } => {
                warn!(
                    %source,
                    %url,
                    missing_fields = %missing.join(", "),
                    "Incomplete article"
                );
            }
            PipelineEvent::PageOutOfWindow {
                source,
                url,
                published,
            } => {
                warn!(%source, %url, %published, "Page published outside recency window");
            }
            PipelineEvent::PipelineCompleted {
                source,
                total_articles,
                complete,
                incomplete,
            } => {
                let (date, time) = clock_labels(Local::now());
                info!(
                    %source,
                    totalArticlesExtracted = total_articles,
                    completeArticles = complete,
                    incompleteArticles = incomplete,
                    currentDate = %date,
                    currentTime = %time,
                    "Source pipeline finished"
                );
            }
            PipelineEvent::SourceAborted { source, error } => {
                error!(%source, %error, "Source pipeline task aborted; contributing no articles");
            }
            PipelineEvent::AggregateCompleted { sources, articles } => {
                info!(sources, articles, "All endpoints executed successfully");
            }
            PipelineEvent::AggregateFailed { error } => {
                error!(%error, "Error executing endpoints");
            }
        }
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl PipelineObserver for RecordingObserver {
    fn record(&self, event: &PipelineEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }

    fn name(&self) -> &str {
        "recording"
    }
}
