//! The transport seam every API call goes through.
//!
//! [`Transport`] is the only capability the data source and query code
//! relies on. [`HttpTransport`] talks to a real Grafana over reqwest;
//! [`FakeTransport`] replays scripted replies and records what was sent.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{Auth, TransportConfig};
use crate::error::{ApiError, ConfigError};

// ------------------------------------------------------------------ //
//  Trait                                                              //
// ------------------------------------------------------------------ //

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Executes one API call and returns the raw response body.
///
/// Implementations report non-success statuses through
/// [`ApiError::from_status`] and timeouts as [`ApiError::Timeout`]. They
/// must not retry on their own.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&BTreeMap<String, String>>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError>;
}

// ------------------------------------------------------------------ //
//  HttpTransport (production)                                         //
// ------------------------------------------------------------------ //

pub struct HttpTransport {
    base_url: String,
    auth: Option<Auth>,
    org_id: Option<i64>,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self {
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            auth: config.auth.clone(),
            org_id: config.org_id,
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&BTreeMap<String, String>>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        let mut req = self.http.request(method.into(), self.url(path));

        if let Some(query) = query {
            req = req.query(query);
        }
        req = match &self.auth {
            Some(Auth::Bearer(token)) => req.bearer_auth(token),
            Some(Auth::Basic { user, password }) => req.basic_auth(user, Some(password)),
            None => req,
        };
        if let Some(org_id) = self.org_id {
            req = req.header("X-Grafana-Org-Id", org_id.to_string());
        }
        if let Some(body) = body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }

        debug!(%method, path, "sending Grafana API request");
        let resp = req.send().await.map_err(request_error)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(request_error)?;
        debug!(%method, path, %status, "received Grafana API response");

        if !status.is_success() {
            let message = error_message(&bytes);
            warn!(%method, path, %status, error = %message, "Grafana API returned an error");
            return Err(ApiError::from_status(status.as_u16(), message));
        }

        Ok(bytes.to_vec())
    }
}

fn request_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}

/// Grafana wraps most errors as `{"message": "..."}`; fall back to the raw body.
fn error_message(body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}

// ------------------------------------------------------------------ //
//  FakeTransport (for tests)                                          //
// ------------------------------------------------------------------ //

/// One call observed by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<BTreeMap<String, String>>,
    pub body: Option<Vec<u8>>,
}

impl RecordedRequest {
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_slice(b).ok())
    }
}

/// In-memory transport that answers with scripted replies in order.
///
/// Once the script runs out every call fails with [`ApiError::Network`].
#[derive(Debug, Default, Clone)]
pub struct FakeTransport {
    replies: Arc<Mutex<VecDeque<Result<Vec<u8>, ApiError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_json(&self, body: serde_json::Value) -> &Self {
        self.reply_raw(body.to_string().into_bytes())
    }

    pub fn reply_raw(&self, body: Vec<u8>) -> &Self {
        self.replies.lock().unwrap().push_back(Ok(body));
        self
    }

    pub fn reply_error(&self, err: ApiError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    /// Non-destructive snapshot of the calls made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: Option<&BTreeMap<String, String>>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            path: path.to_string(),
            query: query.cloned(),
            body,
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ApiError::Network(format!("no scripted reply for {method} {path}"))))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn error_message_prefers_json_message() {
        assert_eq!(
            error_message(br#"{"message":"Data source not found","traceID":""}"#),
            "Data source not found"
        );
        assert_eq!(error_message(b"  upstream timeout \n"), "upstream timeout");
    }

    #[test]
    fn url_joins_without_double_slashes() {
        let config = TransportConfig::new("http://grafana:3000/sub/").unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.url("/api/datasources"),
            "http://grafana:3000/sub/api/datasources"
        );
        assert_eq!(transport.url("api/ds/query"), "http://grafana:3000/sub/api/ds/query");
    }

    #[tokio::test]
    async fn fake_replays_in_order_and_records() {
        let fake = FakeTransport::new();
        fake.reply_json(json!({"id": 1}))
            .reply_error(ApiError::from_status(404, "nope"));

        let first = fake
            .execute(Method::Post, "/a", None, Some(b"{}".to_vec()))
            .await
            .unwrap();
        assert_eq!(first, br#"{"id":1}"#.to_vec());

        let second = fake.execute(Method::Get, "/b", None, None).await;
        assert!(second.unwrap_err().is_not_found());

        let third = fake.execute(Method::Delete, "/c", None, None).await;
        assert!(matches!(third, Err(ApiError::Network(_))));

        let requests = fake.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, Method::Post);
        assert_eq!(requests[0].json_body(), Some(json!({})));
        assert_eq!(requests[2].path, "/c");
    }
}
