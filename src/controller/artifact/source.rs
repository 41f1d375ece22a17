//! # Artifact Source
//!
//! Remote source artifacts are downloaded from: plain HTTP GET over the
//! URL template `base/{version}/{filename}`. Only HTTP 200 with a readable
//! body counts as success.

use crate::observability::metrics;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info_span, warn, Instrument};

/// Why a single download failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Remote source of artifact bytes
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Download the full body at `url`
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchFailure>;
}

/// `base/{version}/{filename}` URL template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    base: String,
}

impl UrlTemplate {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    /// Render the URL for `filename` at `version`
    ///
    /// Joins with exactly one `/` between segments whether or not the base
    /// carries a trailing slash. Sub-path groupings in `filename` are kept.
    #[must_use]
    pub fn render(&self, version: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base.trim_end_matches('/'),
            version.trim_matches('/'),
            filename.trim_start_matches('/')
        )
    }
}

/// [`ArtifactSource`] backed by `reqwest`
#[derive(Debug, Clone)]
pub struct HttpArtifactSource {
    client: reqwest::Client,
}

impl HttpArtifactSource {
    /// Create a source whose downloads time out after `timeout`
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchFailure> {
        let span = info_span!("artifact.fetch", artifact.url = url);
        async {
            let start = Instant::now();
            metrics::increment_artifact_downloads_total();

            let response = self.client.get(url).send().await.map_err(|e| {
                warn!("Failed to download artifact from {}: {}", url, e);
                metrics::increment_artifact_download_errors_total();
                FetchFailure::Transport(e.to_string())
            })?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                warn!(
                    "Artifact download failed: HTTP {} {} from URL: {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown"),
                    url
                );
                metrics::increment_artifact_download_errors_total();
                return Err(FetchFailure::Status(status.as_u16()));
            }

            let body = response.bytes().await.map_err(|e| {
                metrics::increment_artifact_download_errors_total();
                FetchFailure::Transport(format!("failed to read body: {e}"))
            })?;

            metrics::observe_artifact_download_duration(start.elapsed().as_secs_f64());
            debug!("Downloaded {} bytes from {}", body.len(), url);
            Ok(body.to_vec())
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_joins_with_single_slashes() {
        let template = UrlTemplate::new("https://raw.githubusercontent.com/jboss-fuse/application-templates/");
        assert_eq!(
            template.render("master", "quickstarts/karaf-cxf-rest-template.json"),
            "https://raw.githubusercontent.com/jboss-fuse/application-templates/master/quickstarts/karaf-cxf-rest-template.json"
        );

        let template = UrlTemplate::new("http://localhost:8080");
        assert_eq!(
            template.render("1.0", "fis-image-streams.json"),
            "http://localhost:8080/1.0/fis-image-streams.json"
        );
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(FetchFailure::Status(500).to_string(), "HTTP status 500");
    }
}
