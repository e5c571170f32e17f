//! The service under audit.
//!
//! Phases only ever talk to a [`Target`]. [`HttpTarget`] is the production
//! implementation; tests substitute scripted or mocked targets.

use async_trait::async_trait;
use loadscope_core::Outcome;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while calling the target.
#[derive(Debug, Error)]
pub enum TargetError {
    /// The base URL could not be parsed or joined.
    #[error("Invalid target URL {url}: {reason}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Connection, TLS or protocol failure.
    #[error("Request to {url} failed: {source}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The client gave up waiting for a response.
    #[error("Request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The response body could not be decoded.
    #[error("Could not decode response from {url}: {reason}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Decoder message.
        reason: String,
    },

    /// The health interface answered with a non-success status.
    #[error("Health check at {url} returned HTTP {status}")]
    Unhealthy {
        /// Requested URL.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// Failure raised by a non-HTTP target.
    #[error("{0}")]
    Other(String),
}

/// HTTP method of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        })
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

/// One named unit of work against the target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Name used in reports.
    pub name: String,
    /// HTTP method.
    #[serde(default)]
    pub method: Method,
    /// Path relative to the base URL.
    pub path: String,
    /// Optional JSON request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-operation timeout overriding the call-site default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Operation {
    /// GET operation.
    pub fn get(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: Method::Get,
            path: path.into(),
            body: None,
            timeout_ms: None,
        }
    }

    /// POST operation with a JSON body.
    pub fn post(name: impl Into<String>, path: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            method: Method::Post,
            path: path.into(),
            body: Some(body),
            timeout_ms: None,
        }
    }

    /// Override the timeout for this operation.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Timeout to use, falling back to the call-site default.
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_ms.map(Duration::from_millis).unwrap_or(default)
    }
}

/// The audited service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Target: Send + Sync {
    /// Human-readable location of the target, used in reports.
    fn describe(&self) -> String;

    /// Perform one operation and report what came back.
    async fn call(&self, operation: &Operation) -> Result<Outcome, TargetError>;

    /// Read the self-reported health body.
    async fn health(&self) -> Result<Value, TargetError>;
}

/// [`Target`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTarget {
    client: reqwest::Client,
    base_url: reqwest::Url,
    health_path: String,
}

impl HttpTarget {
    /// Target rooted at `base_url`, reading health from `health_path`.
    pub fn new(base_url: &str, health_path: impl Into<String>) -> Result<Self, TargetError> {
        let mut base_url = reqwest::Url::parse(base_url).map_err(|e| TargetError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // Operation paths resolve under the base path, so it must end in a slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("loadscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| TargetError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self {
            client,
            base_url,
            health_path: health_path.into(),
        })
    }

    fn url_for(&self, path: &str) -> Result<reqwest::Url, TargetError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TargetError::InvalidUrl {
                url: format!("{}{}", self.base_url, path),
                reason: e.to_string(),
            })
    }
}

impl TargetError {
    fn from_client(url: &reqwest::Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            TargetError::Timeout {
                url: url.to_string(),
            }
        } else {
            TargetError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Read the optional `cached: bool` marker from a JSON body.
pub fn cached_flag(body: &[u8]) -> bool {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("cached").and_then(Value::as_bool))
        .unwrap_or(false)
}

#[async_trait]
impl Target for HttpTarget {
    fn describe(&self) -> String {
        self.base_url.to_string()
    }

    async fn call(&self, operation: &Operation) -> Result<Outcome, TargetError> {
        let url = self.url_for(&operation.path)?;
        let mut request = self.client.request(operation.method.into(), url.clone());
        if let Some(body) = &operation.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|source| TargetError::from_client(&url, source))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|source| TargetError::from_client(&url, source))?;

        Ok(Outcome {
            status,
            payload_size: body.len() as u64,
            cached: cached_flag(&body),
        })
    }

    async fn health(&self) -> Result<Value, TargetError> {
        let url = self.url_for(&self.health_path)?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TargetError::from_client(&url, source))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TargetError::Unhealthy {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| TargetError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
