//! Store API interaction: article CRUD, metrics, status and log sinks.
//!
//! The orchestrator only sees two traits:
//! - [`ArticleStore`]: reads and writes article records and run metrics
//! - [`StatusSink`]: best-effort status upserts and log lines
//!
//! [`ApiClient`] implements both against the HTTP persistence service.
//!
//! # Endpoints
//!
//! | Call | Method | Path |
//! |------|--------|------|
//! | `list_articles` | GET | `/bild/articles` |
//! | `create_article` | POST | `/bild/articles` |
//! | `update_article` | PATCH | `/bild/articles/{id}` |
//! | `post_metrics` | POST | `/bild/metrics` |
//! | `append_log` | POST | `/bild/logs` |
//! | `upsert_status` | POST | `/status` |
//!
//! Every write carries the `X-API-Key` header.

use crate::error::{FetchError, NotifyError, WriteError};
use crate::models::{ArticleRecord, ArticleUpdate, RunMetrics, Status};
use crate::utils::truncate_for_log;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

/// Maximum number of response body characters kept in error messages.
const ERROR_BODY_PREVIEW: usize = 500;

/// Persistence for article records and run metrics.
pub trait ArticleStore {
    /// Fetch every stored article keyed by id.
    async fn list_articles(&self) -> Result<HashMap<String, ArticleRecord>, FetchError>;

    /// Persist a newly observed article.
    ///
    /// Returns the record as stored, or the sent record when the store
    /// acknowledges with an empty body.
    async fn create_article(&self, record: &ArticleRecord) -> Result<ArticleRecord, WriteError>;

    /// Apply a premium-to-free transition to an existing article.
    ///
    /// Returns the updated record when the store echoes it, `None` when the
    /// store acknowledges with an empty body.
    async fn update_article(
        &self,
        id: &str,
        update: &ArticleUpdate,
    ) -> Result<Option<ArticleRecord>, WriteError>;

    /// Record the aggregate counts of one cycle.
    async fn post_metrics(&self, metrics: &RunMetrics) -> Result<(), WriteError>;
}

/// Best-effort reporting of scraper status and log lines.
pub trait StatusSink {
    async fn upsert_status(
        &self,
        source_id: &str,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError>;

    async fn append_log(&self, message: &str, timestamp: &str) -> Result<(), NotifyError>;
}

/// Why a single HTTP request failed.
#[derive(Debug)]
enum RequestError {
    /// Connection, timeout or body read failure.
    Transport(String),
    /// The service answered with a non-2xx status.
    Status(String),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Transport(msg) | RequestError::Status(msg) => f.write_str(msg),
        }
    }
}

impl From<RequestError> for FetchError {
    fn from(e: RequestError) -> Self {
        FetchError::Http(e.to_string())
    }
}

impl From<RequestError> for WriteError {
    fn from(e: RequestError) -> Self {
        match e {
            RequestError::Transport(msg) => WriteError::Http(msg),
            RequestError::Status(msg) => WriteError::Rejected(msg),
        }
    }
}

impl From<RequestError> for NotifyError {
    fn from(e: RequestError) -> Self {
        NotifyError(e.to_string())
    }
}

#[derive(Serialize)]
struct LogPayload<'a> {
    message: &'a str,
    timestamp: &'a str,
}

#[derive(Serialize)]
struct StatusPayload<'a> {
    raspberry: &'a str,
    status: Status,
    message: &'a str,
}

/// HTTP client for the persistence service.
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ApiClient {
    /// Build a client for `base_url` (for example `http://host:8000/api`).
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root; a trailing slash is ignored
    /// * `api_key` - Sent as `X-API-Key` on writes
    /// * `timeout` - Upper bound for each request, connect included
    ///
    /// # Returns
    ///
    /// The client, or the `reqwest` error if the TLS backend can't be set up.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let api = ApiClient::new("http://127.0.0.1:8000/api", "dev-secret", Duration::from_secs(12))?;
    /// let known = api.list_articles().await?;
    /// ```
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url, api_key))
    }

    /// Wrap an already configured [`reqwest::Client`].
    pub fn with_client(client: Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and return the response body as text.
    async fn request<B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<String, RequestError>
    where
        B: Serialize + ?Sized,
    {
        let url = self.endpoint(path);
        let is_write = method != Method::GET;
        let t0 = Instant::now();

        let mut req = self
            .client
            .request(method.clone(), &url)
            .header(ACCEPT, "application/json");
        if is_write {
            req = req.header("X-API-Key", &self.api_key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RequestError::Transport(format!("{method} {url} failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| RequestError::Transport(format!("{method} {url} failed: {e}")))?;

        debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = t0.elapsed().as_millis(),
            "API request finished"
        );

        if !status.is_success() {
            return Err(RequestError::Status(format!(
                "{method} {url} -> HTTP {}: {}",
                status.as_u16(),
                truncate_for_log(&text, ERROR_BODY_PREVIEW)
            )));
        }
        Ok(text)
    }
}

/// Decode an echoed record. An empty 2xx body is an acknowledgement, not an error.
fn decode_record(body: &str) -> Result<Option<ArticleRecord>, WriteError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(body).map(Some).map_err(|e| {
        WriteError::Decode(format!(
            "{e}: {}",
            truncate_for_log(body, ERROR_BODY_PREVIEW)
        ))
    })
}

impl ArticleStore for ApiClient {
    #[instrument(level = "info", skip_all)]
    async fn list_articles(&self) -> Result<HashMap<String, ArticleRecord>, FetchError> {
        let body = self
            .request::<()>(Method::GET, "/bild/articles", None)
            .await?;
        if body.trim().is_empty() {
            return Ok(HashMap::new());
        }
        let rows: Vec<ArticleRecord> = serde_json::from_str(&body)
            .map_err(|e| FetchError::Parse(format!("GET /bild/articles: {e}")))?;
        debug!(count = rows.len(), "Loaded stored articles");
        Ok(rows.into_iter().map(|r| (r.id.clone(), r)).collect())
    }

    #[instrument(level = "info", skip_all, fields(id = %record.id))]
    async fn create_article(&self, record: &ArticleRecord) -> Result<ArticleRecord, WriteError> {
        let body = self
            .request(Method::POST, "/bild/articles", Some(record))
            .await?;
        Ok(decode_record(&body)?.unwrap_or_else(|| record.clone()))
    }

    #[instrument(level = "info", skip_all, fields(%id))]
    async fn update_article(
        &self,
        id: &str,
        update: &ArticleUpdate,
    ) -> Result<Option<ArticleRecord>, WriteError> {
        let path = format!("/bild/articles/{}", urlencoding::encode(id));
        let body = self.request(Method::PATCH, &path, Some(update)).await?;
        decode_record(&body)
    }

    #[instrument(level = "info", skip_all, fields(ts_hour = %metrics.ts_hour))]
    async fn post_metrics(&self, metrics: &RunMetrics) -> Result<(), WriteError> {
        self.request(Method::POST, "/bild/metrics", Some(metrics))
            .await?;
        Ok(())
    }
}

impl StatusSink for ApiClient {
    #[instrument(level = "debug", skip_all, fields(%source_id, %status))]
    async fn upsert_status(
        &self,
        source_id: &str,
        status: Status,
        message: &str,
    ) -> Result<(), NotifyError> {
        let payload = StatusPayload {
            raspberry: source_id,
            status,
            message,
        };
        self.request(Method::POST, "/status", Some(&payload))
            .await?;
        Ok(())
    }

    async fn append_log(&self, message: &str, timestamp: &str) -> Result<(), NotifyError> {
        let payload = LogPayload { message, timestamp };
        self.request(Method::POST, "/bild/logs", Some(&payload))
            .await?;
        Ok(())
    }
}
