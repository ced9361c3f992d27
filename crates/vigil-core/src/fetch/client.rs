//! Single-attempt HTTP executor.
//!
//! One [`HttpClient`] is shared by every caching layer. A call is exactly one
//! network attempt: no retries, no fallback URLs. Anything that goes wrong,
//! from a refused connection to an extractor that finds nothing useful,
//! surfaces as a [`FetchError`] and the caller decides what to serve instead.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error};

use super::errors::FetchError;

/// Connection settings for the shared HTTP client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// TCP connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Default end-to-end request timeout in milliseconds. Individual calls
    /// may override this.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// How long idle pooled connections are kept around, in seconds.
    #[serde(default = "default_pool_idle_timeout_secs")]
    pub pool_idle_timeout_secs: u64,
    /// Maximum idle connections kept per host.
    #[serde(default = "default_pool_max_idle_per_host")]
    pub pool_max_idle_per_host: usize,
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_pool_idle_timeout_secs() -> u64 {
    90
}

fn default_pool_max_idle_per_host() -> usize {
    16
}

fn default_user_agent() -> String {
    concat!("vigil/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            pool_idle_timeout_secs: default_pool_idle_timeout_secs(),
            pool_max_idle_per_host: default_pool_max_idle_per_host(),
            user_agent: default_user_agent(),
        }
    }
}

/// Shape of a single outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestShape {
    /// Plain GET with no body.
    Get,
    /// JSON POST. Bodies carrying a `method` field go out wrapped in a
    /// JSON-RPC 2.0 envelope; all other payloads are sent verbatim.
    Post(Value),
}

impl RequestShape {
    /// The caller-facing body before any envelope is applied. `None` for GET.
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Get => None,
            Self::Post(body) => Some(body),
        }
    }
}

/// Wraps JSON-RPC style payloads in the standard envelope; anything without a
/// `method` field passes through untouched.
fn to_wire_body(body: &Value) -> Value {
    let Some(obj) = body.as_object() else {
        return body.clone();
    };
    let Some(method) = obj.get("method") else {
        return body.clone();
    };

    let mut wrapped = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
    });
    if let Some(params) = obj.get("params") {
        wrapped["params"] = params.clone();
    }
    wrapped
}

/// HTTP client wrapper that performs exactly one attempt per call.
pub struct HttpClient {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl HttpClient {
    /// Builds the shared client from connection settings.
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = reqwest::ClientBuilder::new()
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .http2_adaptive_window(true)
            .use_rustls_tls()
            .user_agent(config.user_agent.clone())
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| {
                error!(error = %e, "failed to build HTTP client");
                FetchError::ClientBuild(e.to_string())
            })?;

        Ok(Self {
            client,
            default_timeout: Duration::from_millis(config.request_timeout_ms),
        })
    }

    /// The end-to-end timeout applied when a call does not supply its own.
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Executes one request and runs `extract` over the parsed response.
    ///
    /// The response body is parsed as JSON when possible; non-JSON bodies
    /// (a Prometheus text page, say) arrive at the extractor as a JSON
    /// string. An extractor returning `None` fails the call exactly like a
    /// network error would.
    pub async fn execute<F>(
        &self,
        url: &str,
        shape: &RequestShape,
        extract: F,
        timeout: Option<Duration>,
    ) -> Result<Value, FetchError>
    where
        F: FnOnce(&Value) -> Option<Value>,
    {
        let request = match shape {
            RequestShape::Get => self.client.get(url),
            RequestShape::Post(body) => self.client.post(url).json(&to_wire_body(body)),
        };
        let request = match timeout {
            Some(t) => request.timeout(t),
            None => request,
        };

        debug!(url = url, "executing remote call");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::ConnectionFailed(sanitize_network_error(&e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let raw_text = response.text().await.unwrap_or_default();
            let message = if raw_text.chars().count() > 256 {
                let prefix: String = raw_text.chars().take(256).collect();
                format!("{prefix}... (truncated)")
            } else {
                raw_text
            };
            return Err(FetchError::HttpStatus(status.as_u16(), message));
        }

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Body(sanitize_network_error(&e))
            }
        })?;

        let payload = parse_payload(&bytes);
        extract(&payload).ok_or_else(|| {
            FetchError::Extract("extractor returned no value".to_string())
        })
    }
}

/// Parses a response body as JSON, falling back to a plain string value for
/// non-JSON payloads.
fn parse_payload(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Maps reqwest error categories to short stable strings so upstream error
/// details never leak into metrics or logs verbatim.
fn sanitize_network_error(error: &reqwest::Error) -> String {
    if error.is_connect() {
        "connection refused or unreachable".to_string()
    } else if error.is_timeout() {
        "request timed out".to_string()
    } else if error.is_request() {
        "malformed request".to_string()
    } else if error.is_body() || error.is_decode() {
        "response body error".to_string()
    } else if error.is_redirect() {
        "redirect limit exceeded".to_string()
    } else {
        "network error".to_string()
    }
}
