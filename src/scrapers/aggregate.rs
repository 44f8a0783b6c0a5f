//! Aggregator over every registered source.
//!
//! Each pipeline runs on its own tokio task. Results are joined in
//! registration order and flattened, so source A's articles always precede
//! source B's when A is registered first. A source whose discovery fails, or
//! whose task dies outright, contributes nothing and its siblings are
//! unaffected. The collection step itself runs on a task too; only its
//! failure is an [`AggregateError`].

use crate::config::SourceRegistry;
use crate::error::AggregateError;
use crate::models::Article;
use crate::observe::{PipelineEvent, PipelineObserver};
use crate::scrapers::pipeline::{Limits, SourcePipeline};
use chrono::{Local, NaiveDate};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{instrument, warn};

/// Run every source concurrently against the server's local date.
pub async fn run_all(
    registry: &SourceRegistry,
    observer: Arc<dyn PipelineObserver>,
    limits: &Limits,
) -> Result<Vec<Article>, AggregateError> {
    run_all_on(registry, observer, limits, Local::now().date_naive()).await
}

/// Run every source concurrently with an explicit "today".
#[instrument(level = "info", skip_all, fields(sources = registry.len(), %today))]
pub async fn run_all_on(
    registry: &SourceRegistry,
    observer: Arc<dyn PipelineObserver>,
    limits: &Limits,
    today: NaiveDate,
) -> Result<Vec<Article>, AggregateError> {
    let collect = collect_all(registry.clone(), observer.clone(), limits.clone(), today);
    match tokio::spawn(collect).await {
        Ok(articles) => Ok(articles),
        Err(join_error) => {
            let err = AggregateError::Aborted {
                reason: join_error.to_string(),
            };
            observer.record(&PipelineEvent::AggregateFailed {
                error: err.to_string(),
            });
            Err(err)
        }
    }
}

async fn collect_all(
    registry: SourceRegistry,
    observer: Arc<dyn PipelineObserver>,
    limits: Limits,
    today: NaiveDate,
) -> Vec<Article> {
    let (names, handles): (Vec<String>, Vec<_>) = registry
        .sources()
        .iter()
        .map(|source| {
            let pipeline = SourcePipeline::new(source.clone(), observer.clone(), limits.clone());
            let handle = tokio::spawn(async move { pipeline.run_on(today).await });
            (source.name.clone(), handle)
        })
        .unzip();
    let joined = join_all(handles).await;

    let mut articles = Vec::new();
    for (name, result) in names.into_iter().zip(joined) {
        match result {
            Ok(Ok(report)) => articles.extend(report.articles),
            Ok(Err(e)) => {
                warn!(source = %name, error = %e, "Source contributed no articles");
            }
            Err(join_error) => {
                observer.record(&PipelineEvent::SourceAborted {
                    source: name,
                    error: join_error.to_string(),
                });
            }
        }
    }

    observer.record(&PipelineEvent::AggregateCompleted {
        sources: registry.len(),
        articles: articles.len(),
    });
    articles
}
