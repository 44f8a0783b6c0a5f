//! Error types for the ingestion pipeline.
//!
//! Failures are scoped to the smallest unit that can absorb them:
//!
//! | Error | Scope | Recovery |
//! |-------|-------|----------|
//! | [`FetchError`] | one HTTP request | page: counted incomplete; discovery: wrapped in [`DiscoveryError`] |
//! | [`DiscoveryError`] | one source | source returns `{"error": ...}`, siblings unaffected |
//! | [`PipelineError`] | one source | unexpected orchestration failure, same surface as discovery |
//! | [`AggregateError`] | whole run | `{"status": "Failed", "error": ...}` |
//! | [`ConfigError`] | startup | process refuses to start |

use std::time::Duration;

/// A single HTTP request failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("received status code {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Classify a reqwest error, keeping timeouts distinct from transport faults.
    pub fn from_reqwest(url: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout,
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// The discovery document (sitemap or listing page) could not be used.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unparsable sitemap body: {0}")]
    Sitemap(String),
}

/// A source pipeline could not produce a result.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("failed to build HTTP session: {0}")]
    Session(#[source] reqwest::Error),

    #[error("invalid request header {name:?}")]
    Header { name: String },
}

/// The aggregate run failed as a whole. Failures inside one source's
/// pipeline never produce this.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("aggregate run aborted: {reason}")]
    Aborted { reason: String },
}

/// Source configuration could not be loaded or compiled.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading sources file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing sources YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("source {source_name}: invalid selector {selector:?}: {reason}")]
    Selector {
        source_name: String,
        selector: String,
        reason: String,
    },

    #[error("source {source_name}: invalid cleanup pattern {pattern:?}: {reason}")]
    Pattern {
        source_name: String,
        pattern: String,
        reason: String,
    },

    #[error("source {source_name}: invalid discovery URL {url:?}: {reason}")]
    Url {
        source_name: String,
        url: String,
        reason: String,
    },

    #[error("duplicate route key {0:?}")]
    DuplicateRoute(String),

    #[error("source {source_name}: {reason}")]
    Invalid { source_name: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_message() {
        let e = FetchError::Status {
            url: "https://example.com/sitemap.xml".into(),
            status: 503,
        };
        assert_eq!(
            e.to_string(),
            "received status code 503 from https://example.com/sitemap.xml"
        );
    }

    #[test]
    fn test_discovery_error_is_transparent_over_fetch() {
        let e: DiscoveryError = FetchError::Status {
            url: "https://example.com".into(),
            status: 404,
        }
        .into();
        assert!(e.to_string().contains("404"));
    }
}
