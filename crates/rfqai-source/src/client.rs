//! Read-only client for the paginated source-table API.
//!
//! One `queryTables`-style POST endpoint serves every table. Each
//! [`PageCursor::next_page`] call issues exactly one request, carrying the
//! continuation token in whichever style the source supplied last (never
//! both). Transient failures are retried with capped exponential backoff;
//! permanent failures abort immediately.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use rfqai_core::defaults::{
    SOURCE_HTTP_TIMEOUT_SECS, SOURCE_PAGE_ROWS_DEFAULT, SOURCE_PAGE_ROWS_MAX,
    SOURCE_RETRY_BASE_MS, SOURCE_RETRY_CAP_MS, SOURCE_RETRY_MAX_ATTEMPTS,
};
use rfqai_core::{Error, Page, Result, Settings, TokenKind};

use crate::normalize::normalize_response;

/// Configuration for the source API client.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub endpoint: String,
    pub api_key: String,
    pub app_id: String,
}

impl SourceConfig {
    /// Build a config, refusing any endpoint whose path contains a
    /// mutate-style segment. The engine is read-only by contract; this is
    /// a misconfiguration guard, not authorization.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, app_id: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        if endpoint.to_lowercase().contains("mutate") {
            return Err(Error::Config(format!(
                "refusing mutate-style source endpoint: {endpoint}"
            )));
        }
        Ok(Self {
            endpoint,
            api_key: api_key.into(),
            app_id: app_id.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.source_endpoint.clone(),
            settings.source_api_key.clone(),
            settings.source_app_id.clone(),
        )
    }
}

/// Raw result of one transport-level query: HTTP status plus parsed body.
#[derive(Debug, Clone)]
pub struct SourceResponse {
    pub status: u16,
    pub body: Value,
}

/// The single seam around the network. Production uses [`HttpTransport`];
/// tests substitute scripted responses.
#[async_trait]
pub trait SourceTransport: Send + Sync {
    /// Issue one query POST. Transport-level failures (connect, timeout)
    /// surface as `Error::Request` and are treated as transient.
    async fn post_query(&self, payload: &Value) -> Result<SourceResponse>;
}

/// reqwest-backed transport with bearer auth.
pub struct HttpTransport {
    client: reqwest::Client,
    config: SourceConfig,
}

impl HttpTransport {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOURCE_HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SourceTransport for HttpTransport {
    async fn post_query(&self, payload: &Value) -> Result<SourceResponse> {
        let resp = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        // Non-JSON error bodies still need to flow into retry classification.
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        Ok(SourceResponse { status, body })
    }
}

/// Client over one source application, generic over transport.
pub struct SourceClient<T: SourceTransport> {
    transport: T,
    app_id: String,
}

impl SourceClient<HttpTransport> {
    pub fn new(config: SourceConfig) -> Result<Self> {
        let app_id = config.app_id.clone();
        Ok(Self {
            transport: HttpTransport::new(config)?,
            app_id,
        })
    }
}

impl<T: SourceTransport> SourceClient<T> {
    pub fn with_transport(transport: T, app_id: impl Into<String>) -> Self {
        Self {
            transport,
            app_id: app_id.into(),
        }
    }

    /// Effective rows-per-call limit: clamp to the hard ceiling, fall back
    /// to the default when the hint is zero or negative.
    pub fn effective_limit(&self, hint: i64) -> i64 {
        if hint <= 0 {
            SOURCE_PAGE_ROWS_DEFAULT
        } else {
            hint.min(SOURCE_PAGE_ROWS_MAX)
        }
    }

    /// Begin paginating one table. Rows per page = `effective_limit(hint)`.
    pub fn fetch_pages<'a>(&'a self, table_name: &str, page_size_hint: i64) -> PageCursor<'a, T> {
        PageCursor {
            client: self,
            table_name: table_name.to_string(),
            limit: self.effective_limit(page_size_hint),
            token: None,
            done: false,
        }
    }

    /// POST with retry on transient failure classes (429, 5xx, transport
    /// errors): capped exponential backoff, bounded attempts. Permanent
    /// rejections (other 4xx) fail immediately.
    async fn post_with_retry(&self, payload: &Value) -> Result<Value> {
        let mut backoff_ms = SOURCE_RETRY_BASE_MS;
        let mut last_error = String::new();

        for attempt in 1..=SOURCE_RETRY_MAX_ATTEMPTS {
            match self.transport.post_query(payload).await {
                Ok(resp) if resp.status < 400 => return Ok(resp.body),
                Ok(resp) if resp.status == 429 || resp.status >= 500 => {
                    last_error = format!("source returned HTTP {}", resp.status);
                }
                Ok(resp) => {
                    return Err(Error::Request(format!(
                        "source rejected request with HTTP {}: {}",
                        resp.status, resp.body
                    )));
                }
                Err(Error::Request(msg)) => {
                    last_error = msg;
                }
                Err(other) => return Err(other),
            }

            if attempt < SOURCE_RETRY_MAX_ATTEMPTS {
                warn!(
                    subsystem = "source",
                    component = "fetcher",
                    op = "retry",
                    attempt,
                    backoff_ms,
                    error = %last_error,
                    "Transient source failure, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(SOURCE_RETRY_CAP_MS);
            }
        }

        Err(Error::Request(format!(
            "source request failed after {SOURCE_RETRY_MAX_ATTEMPTS} attempts: {last_error}"
        )))
    }
}

/// Lazy page sequence over one table.
///
/// Termination: an empty row set (page not yielded) or an absent
/// continuation token (page yielded, next call returns None).
pub struct PageCursor<'a, T: SourceTransport> {
    client: &'a SourceClient<T>,
    table_name: String,
    limit: i64,
    token: Option<(TokenKind, String)>,
    done: bool,
}

impl<T: SourceTransport> PageCursor<'_, T> {
    /// Fetch the next page; one request per call.
    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.done {
            return Ok(None);
        }

        let mut query = json!({
            "tableName": self.table_name,
            "limit": self.limit,
        });
        if let Some((kind, token)) = &self.token {
            query[kind.as_str()] = json!(token);
        }
        let payload = json!({
            "appID": self.client.app_id,
            "queries": [query],
        });

        let raw = self.client.post_with_retry(&payload).await?;
        let page = normalize_response(&raw);

        debug!(
            subsystem = "source",
            component = "fetcher",
            op = "fetch_page",
            table = %self.table_name,
            row_count = page.rows.len(),
            has_token = page.next_token.is_some(),
            "Fetched source page"
        );

        if page.rows.is_empty() {
            self.done = true;
            return Ok(None);
        }

        match (&page.next_token, page.token_kind) {
            (Some(token), Some(kind)) => {
                self.token = Some((kind, token.clone()));
            }
            _ => {
                self.done = true;
            }
        }

        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Scripted transport: pops responses in order and records payloads.
    struct StubTransport {
        responses: Mutex<Vec<SourceResponse>>,
        payloads: Mutex<Vec<Value>>,
    }

    impl StubTransport {
        fn new(responses: Vec<SourceResponse>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                payloads: Mutex::new(Vec::new()),
            }
        }

        fn ok(body: Value) -> SourceResponse {
            SourceResponse { status: 200, body }
        }

        fn status(status: u16) -> SourceResponse {
            SourceResponse {
                status,
                body: Value::Null,
            }
        }
    }

    #[async_trait]
    impl SourceTransport for StubTransport {
        async fn post_query(&self, payload: &Value) -> Result<SourceResponse> {
            self.payloads.lock().unwrap().push(payload.clone());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Self::ok(json!({"rows": []}))))
        }
    }

    fn client(responses: Vec<SourceResponse>) -> SourceClient<StubTransport> {
        SourceClient::with_transport(StubTransport::new(responses), "app-1")
    }

    #[test]
    fn limit_clamped_to_hard_ceiling() {
        let c = client(vec![]);
        assert_eq!(c.effective_limit(500_000), SOURCE_PAGE_ROWS_MAX);
        assert_eq!(c.effective_limit(SOURCE_PAGE_ROWS_MAX), SOURCE_PAGE_ROWS_MAX);
        assert_eq!(c.effective_limit(250), 250);
    }

    #[test]
    fn non_positive_limit_falls_back_to_default() {
        let c = client(vec![]);
        assert_eq!(c.effective_limit(0), SOURCE_PAGE_ROWS_DEFAULT);
        assert_eq!(c.effective_limit(-5), SOURCE_PAGE_ROWS_DEFAULT);
    }

    #[test]
    fn mutate_endpoint_refused() {
        let err = SourceConfig::new(
            "https://api.glideapp.io/api/function/mutateTables",
            "key",
            "app",
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        assert!(SourceConfig::new(
            "https://api.glideapp.io/api/function/queryTables",
            "key",
            "app"
        )
        .is_ok());
    }

    #[tokio::test]
    async fn paginates_until_token_absent() {
        let c = client(vec![
            StubTransport::ok(json!({"rows": [{"rowID": "r1"}, {"rowID": "r2"}], "next": "n1"})),
            StubTransport::ok(json!({"rows": [{"rowID": "r3"}]})),
        ]);

        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        let mut ids = Vec::new();
        let mut pages = 0;
        while let Some(page) = cursor.next_page().await.unwrap() {
            pages += 1;
            for row in &page.rows {
                ids.push(row["rowID"].as_str().unwrap().to_string());
            }
        }

        assert_eq!(pages, 2);
        assert_eq!(ids, ["r1", "r2", "r3"]);
    }

    #[tokio::test]
    async fn terminates_on_empty_row_set() {
        let c = client(vec![StubTransport::ok(json!({"rows": [], "next": "n1"}))]);
        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        assert!(cursor.next_page().await.unwrap().is_none());
        assert!(cursor.next_page().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mixed_token_styles_round_trip_into_requests() {
        let c = client(vec![
            StubTransport::ok(json!({"rows": [{"rowID": "r1"}], "next": "tok-1"})),
            StubTransport::ok(json!({"results": [{"rows": [{"rowID": "r2"}], "cursor": "cur-1"}]})),
            StubTransport::ok(json!({"rows": [{"rowID": "r3"}]})),
        ]);

        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        let mut ids = Vec::new();
        while let Some(page) = cursor.next_page().await.unwrap() {
            for row in &page.rows {
                ids.push(row["rowID"].as_str().unwrap().to_string());
            }
        }
        assert_eq!(ids, ["r1", "r2", "r3"]);

        let payloads = cursor.client.transport.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 3);

        // First request: no token at all.
        let q0 = &payloads[0]["queries"][0];
        assert!(q0.get("startAt").is_none());
        assert!(q0.get("cursor").is_none());

        // Second request: pointer-style only.
        let q1 = &payloads[1]["queries"][0];
        assert_eq!(q1["startAt"], "tok-1");
        assert!(q1.get("cursor").is_none());

        // Third request: cursor-style only.
        let q2 = &payloads[2]["queries"][0];
        assert_eq!(q2["cursor"], "cur-1");
        assert!(q2.get("startAt").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_then_succeed() {
        let c = client(vec![
            StubTransport::status(429),
            StubTransport::status(503),
            StubTransport::ok(json!({"rows": [{"rowID": "r1"}]})),
        ]);

        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        let page = cursor.next_page().await.unwrap().unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(cursor.client.transport.payloads.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_exhaust_attempts() {
        let c = client(
            (0..SOURCE_RETRY_MAX_ATTEMPTS)
                .map(|_| StubTransport::status(500))
                .collect(),
        );

        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        let err = cursor.next_page().await.unwrap_err();
        assert!(matches!(err, Error::Request(_)));
        assert_eq!(
            cursor.client.transport.payloads.lock().unwrap().len(),
            SOURCE_RETRY_MAX_ATTEMPTS as usize
        );
    }

    #[tokio::test]
    async fn permanent_rejection_fails_without_retry() {
        let c = client(vec![StubTransport::status(401)]);

        let mut cursor = c.fetch_pages("ALL_RFQ", 100);
        let err = cursor.next_page().await.unwrap_err();
        assert!(matches!(err, Error::Request(_)));
        assert_eq!(cursor.client.transport.payloads.lock().unwrap().len(), 1);
    }
}
