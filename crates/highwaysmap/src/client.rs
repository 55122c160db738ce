//! Closure sources.
//!
//! A [`ClosureSource`] hands back the raw closures payload and, through the
//! provided `fetch` method, the closure records decoded from it. The live
//! implementation talks to the National Highways API; the file-backed one
//! replays a payload saved earlier with `highwaysmap fetch`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header;
use tracing::{debug, info};

use crate::closure::ClosureRecord;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::payload;

/// Header carrying the API subscription key.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// How much of an error body to keep in an error message.
const ERROR_BODY_LIMIT: usize = 200;

/// Somewhere closure data comes from.
#[async_trait]
pub trait ClosureSource: Send + Sync + std::fmt::Debug {
    /// The name of this source (for logging/debugging).
    fn name(&self) -> &'static str;

    /// Fetch the raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be obtained.
    async fn fetch_raw(&self) -> Result<Vec<u8>>;

    /// Fetch and decode the closures that are current right now.
    ///
    /// # Errors
    ///
    /// Returns the source's error, or a parse error for a malformed payload.
    async fn fetch(&self) -> Result<Vec<ClosureRecord>> {
        let body = self.fetch_raw().await?;
        payload::parse_closures(&body, Utc::now())
    }
}

/// Client for the National Highways closures API.
#[derive(Debug, Clone)]
pub struct HighwaysClient {
    http: reqwest::Client,
    api_url: String,
    subscription_key: Option<String>,
}

impl HighwaysClient {
    /// Create a client from upstream configuration.
    ///
    /// A missing subscription key is not an error here; it is reported on
    /// each fetch instead, so a server can start and explain the problem.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("highwaysmap/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: config.api_url.clone(),
            subscription_key: config.key().map(str::to_string),
        })
    }

    /// The endpoint this client requests.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Whether a subscription key is configured.
    #[must_use]
    pub fn has_key(&self) -> bool {
        self.subscription_key.is_some()
    }
}

#[async_trait]
impl ClosureSource for HighwaysClient {
    fn name(&self) -> &'static str {
        "national-highways"
    }

    async fn fetch_raw(&self) -> Result<Vec<u8>> {
        let key = self
            .subscription_key
            .as_deref()
            .ok_or(Error::MissingApiKey)?;

        info!(url = %self.api_url, "Fetching closures from API");
        let response = self
            .http
            .get(&self.api_url)
            .header(SUBSCRIPTION_KEY_HEADER, key)
            .header("X-Response-MediaType", "application/json")
            .header("X-Djson-Format", "DATEXII")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| Error::from_transport(&self.api_url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::UpstreamStatus {
                status: status.as_u16(),
                message: body.trim().chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_transport(&self.api_url, e))?;
        debug!(bytes = body.len(), "Received closures payload");
        Ok(body.to_vec())
    }
}

/// Replays a payload saved to disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Create a source reading from `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The file this source reads.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClosureSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch_raw(&self) -> Result<Vec<u8>> {
        info!(path = %self.path.display(), "Loading closures from file");
        tokio::fs::read(&self.path)
            .await
            .map_err(|source| Error::File {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::Router;

    use super::*;
    use crate::payload::tests::{fixture_now, FIXTURE};

    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/closures")
    }

    async fn closures_handler(headers: HeaderMap) -> (StatusCode, String) {
        let key = headers
            .get(SUBSCRIPTION_KEY_HEADER)
            .and_then(|v| v.to_str().ok());
        let format = headers.get("X-Djson-Format").and_then(|v| v.to_str().ok());
        match (key, format) {
            (Some("test-key"), Some("DATEXII")) => (StatusCode::OK, FIXTURE.to_string()),
            _ => (StatusCode::UNAUTHORIZED, "Access denied due to invalid subscription key".to_string()),
        }
    }

    fn upstream_config(api_url: String, key: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            api_url,
            subscription_key: key.map(String::from),
            ..UpstreamConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let config = upstream_config("http://127.0.0.1:1/closures".to_string(), None);
        let client = HighwaysClient::new(&config).unwrap();
        assert!(!client.has_key());

        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
    }

    #[tokio::test]
    async fn test_empty_key_counts_as_missing() {
        let config = upstream_config("http://127.0.0.1:1/closures".to_string(), Some(""));
        let client = HighwaysClient::new(&config).unwrap();
        let err = client.fetch_raw().await.unwrap_err();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_fetch_sends_key_and_parses() {
        let url = spawn_upstream(Router::new().route("/closures", get(closures_handler))).await;
        let client = HighwaysClient::new(&upstream_config(url, Some("test-key"))).unwrap();

        let body = client.fetch_raw().await.unwrap();
        let closures = payload::parse_closures(&body, fixture_now()).unwrap();
        assert_eq!(closures.len(), 3);

        // Against the real clock only the open-ended record is still live.
        let live = client.fetch().await.unwrap();
        assert!(live.iter().any(|c| c.id == "GUID-D"));
    }

    #[tokio::test]
    async fn test_bad_key_is_upstream_status() {
        let url = spawn_upstream(Router::new().route("/closures", get(closures_handler))).await;
        let client = HighwaysClient::new(&upstream_config(url, Some("wrong"))).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert!(err.is_network());
        match err {
            Error::UpstreamStatus { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid subscription key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_garbage_body_is_parse_error() {
        let router = Router::new().route("/closures", get(|| async { "<html>down for maintenance</html>" }));
        let url = spawn_upstream(router).await;
        let client = HighwaysClient::new(&upstream_config(url, Some("test-key"))).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert!(err.is_parse());
    }

    #[tokio::test]
    async fn test_slow_upstream_is_timeout() {
        let router = Router::new().route(
            "/closures",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                FIXTURE
            }),
        );
        let url = spawn_upstream(router).await;
        let config = UpstreamConfig {
            timeout_secs: 1,
            ..upstream_config(url.clone(), Some("test-key"))
        };
        let client = HighwaysClient::new(&config).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert!(err.is_network());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        match err {
            Error::Timeout { url: timed_out } => assert_eq!(timed_out, url),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = upstream_config(format!("http://{addr}/closures"), Some("test-key"));
        let client = HighwaysClient::new(&config).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(err.is_network());
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn test_file_source() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), FIXTURE).unwrap();

        let source = FileSource::new(file.path());
        assert_eq!(source.name(), "file");
        let body = source.fetch_raw().await.unwrap();
        assert_eq!(body, FIXTURE.as_bytes());
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("nope.json"));
        let err = source.fetch_raw().await.unwrap_err();
        assert!(matches!(err, Error::File { .. }));
    }
}
