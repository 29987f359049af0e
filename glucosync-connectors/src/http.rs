//! HTTP transport shared by the remote clients
//!
//! ## Overview
//!
//! Both remote services speak plain HTTPS with JSON or form bodies. This
//! module wraps a `ureq` agent with the pieces they share:
//!
//! - base URL joining and query encoding
//! - the hashed `api-secret` header
//! - status code mapping (401 becomes `HttpError::Auth`)
//! - request counters
//!
//! `ureq` is blocking, so each request runs on the blocking pool via
//! `tokio::task::spawn_blocking` and the async callers just await it.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use glucosync_connectors::http::{HttpConfig, HttpConnector};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpConfig::new("https://ns.example.com")
//!     .api_secret("shared-token")
//!     .timeout_secs(15);
//!
//! let http = HttpConnector::new(config)?;
//! let body = http.get("api/v1/entries.json", &[("count", "10".into())]).await?;
//! println!("{body}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use glucosync_core::RemoteError;
use log::debug;
use serde::Serialize;
use sha1::{Digest, Sha1};
use thiserror::Error;

use crate::ConnectionStats;

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server answered 401
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Server returned another error status
    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<HttpError> for RemoteError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Auth(_) => RemoteError::Unauthorized,
            HttpError::Serialization(msg) => RemoteError::Decode(msg),
            other => RemoteError::Transport(other.to_string()),
        }
    }
}

/// SHA-1 hex digest of a shared token, as expected in the `api-secret` header
pub fn hash_secret(token: &str) -> String {
    hex::encode(Sha1::digest(token.as_bytes()))
}

/// HTTP configuration
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Hashed shared secret sent as `api-secret`
    pub api_secret: Option<String>,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            api_secret: None,
            headers: HashMap::new(),
            user_agent: format!("GlucoSync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Send the SHA-1 of `token` in the `api-secret` header
    pub fn api_secret(mut self, token: &str) -> Self {
        self.api_secret = Some(hash_secret(token));
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Override the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Request body variants the remote services accept
#[derive(Debug, Clone)]
enum Body {
    Empty,
    Json(String),
    Form(Vec<(String, String)>),
}

/// HTTP connector using lightweight ureq client
pub struct HttpConnector {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl HttpConnector {
    /// Create new HTTP connector
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Counters since the connector was created
    pub fn stats(&self) -> ConnectionStats {
        self.lock_stats().clone()
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, path: &str) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    /// Send GET request, returning the response body
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<String, HttpError> {
        self.send("GET", path, query, Body::Empty).await
    }

    /// Send DELETE request, returning the response body
    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<String, HttpError> {
        self.send("DELETE", path, query, Body::Empty).await
    }

    /// POST a JSON document
    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, data: &T) -> Result<String, HttpError> {
        let json = serde_json::to_string(data).map_err(|e| HttpError::Serialization(e.to_string()))?;
        self.send("POST", path, &[], Body::Json(json)).await
    }

    /// POST an url-encoded form
    pub async fn post_form(&self, path: &str, fields: &[(&str, String)]) -> Result<String, HttpError> {
        let fields = fields.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        self.send("POST", path, &[], Body::Form(fields)).await
    }

    fn lock_stats(&self) -> MutexGuard<'_, ConnectionStats> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Build request with authentication and headers
    fn build_request(&self, method: &str, path: &str, query: &[(&str, String)]) -> ureq::Request {
        let mut request = self.agent.request(method, &self.url(path));

        for (name, value) in query {
            request = request.query(name, value);
        }

        if let Some(secret) = &self.config.api_secret {
            request = request.set("api-secret", secret);
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request.set("Accept", "application/json")
    }

    async fn send(
        &self,
        method: &'static str,
        path: &str,
        query: &[(&str, String)],
        body: Body,
    ) -> Result<String, HttpError> {
        let request = self.build_request(method, path, query);
        debug!("{method} {}", request.url());

        let sent_bytes = match &body {
            Body::Empty => 0,
            Body::Json(json) => json.len(),
            Body::Form(fields) => fields.iter().map(|(k, v)| k.len() + v.len() + 2).sum(),
        };

        let result = tokio::task::spawn_blocking(move || execute(request, body))
            .await
            .map_err(|e| HttpError::Request(format!("request task failed: {e}")))?;

        let mut stats = self.lock_stats();
        match &result {
            Ok(_) => {
                stats.requests_sent += 1;
                stats.bytes_sent += sent_bytes as u64;
            }
            Err(e) => {
                stats.requests_failed += 1;
                stats.last_error = Some(e.to_string());
            }
        }
        result
    }
}

/// Run one blocking request and map the outcome
fn execute(request: ureq::Request, body: Body) -> Result<String, HttpError> {
    let response = match body {
        Body::Empty => request.call(),
        Body::Json(json) => request.set("Content-Type", "application/json").send_string(&json),
        Body::Form(fields) => {
            let pairs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
            request.send_form(&pairs)
        }
    };

    match response {
        Ok(resp) => {
            let status = resp.status();
            let text = resp.into_string().map_err(|e| HttpError::Request(e.to_string()))?;
            debug!("response ({status}): {text}");
            Ok(text)
        }
        Err(ureq::Error::Status(401, resp)) => Err(HttpError::Auth(resp.into_string().unwrap_or_default())),
        Err(ureq::Error::Status(code, resp)) => Err(HttpError::ServerError {
            status: code,
            message: resp.into_string().unwrap_or_default(),
        }),
        Err(ureq::Error::Transport(e)) => Err(HttpError::Request(e.to_string())),
    }
}
