//! Per-source HTTP session.
//!
//! Sites expect different User-Agent and Accept headers, so every pipeline
//! run builds its own [`Session`] from the source's header table. The session
//! is owned by the run and dropped when the run returns, whichever exit path
//! it takes.

use crate::config::Source;
use crate::error::{FetchError, PipelineError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct Session {
    client: reqwest::Client,
    timeout: Duration,
}

impl Session {
    /// Build a client presenting `source.headers`, with `timeout` applied to
    /// every request.
    pub fn for_source(source: &Source, timeout: Duration) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::with_capacity(source.headers.len());
        for (name, value) in &source.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| PipelineError::Header { name: name.clone() })?;
            let header_value =
                HeaderValue::from_str(value).map_err(|_| PipelineError::Header { name: name.clone() })?;
            headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(PipelineError::Session)?;

        Ok(Self { client, timeout })
    }

    /// GET `url` and return the body. Any non-2xx status is an error.
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, self.timeout, e))?;
        debug!(bytes = body.len(), status = status.as_u16(), "Fetched");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceRegistry;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> Source {
        let registry = SourceRegistry::builtin().unwrap();
        registry.get("beinCrypto").unwrap().as_ref().clone()
    }

    #[tokio::test]
    async fn test_session_presents_source_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header(
                "user-agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let session = Session::for_source(&source(), Duration::from_secs(5)).unwrap();
        let body = session.fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
        server.verify().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let session = Session::for_source(&source(), Duration::from_secs(5)).unwrap();
        let err = session.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let session = Session::for_source(&source(), Duration::from_millis(50)).unwrap();
        let err = session.fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }), "{err}");
    }
}
