use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use log::debug;

use super::types::{RequestOptions, Response};

/// Errors that can occur below the HTTP layer.
#[derive(Debug, Clone)]
pub enum FetchError {
    /// Network-level failure (DNS, connection refused, reset).
    Network(String),
    /// The request could not be built (bad method, bad URL).
    InvalidRequest(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "network error: {msg}"),
            FetchError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

/// The raw HTTP capability halnav sits on.
///
/// Implementations only move bytes: status classification and timeouts are
/// applied on top by [`Transport`](super::Transport).
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Response, FetchError>;
}

/// [`Fetch`] backed by a `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestFetch {
    client: reqwest::Client,
}

impl ReqwestFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Fetch for ReqwestFetch {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Response, FetchError> {
        let method = options.method.as_deref().unwrap_or("GET").to_ascii_uppercase();
        let method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|e| FetchError::InvalidRequest(e.to_string()))?;

        let mut request = self.client.request(method.clone(), url);
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &options.body {
            request = request.body(body.clone());
        }

        debug!("{method} {url}");
        let response = request.send().await.map_err(|e| {
            if e.is_builder() {
                FetchError::InvalidRequest(e.to_string())
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        debug!("{method} {url} -> {} ({} bytes)", status.as_u16(), body.len());
        Ok(Response::new(status.as_u16(), body)
            .with_status_text(status.canonical_reason().unwrap_or_default())
            .with_headers(headers))
    }
}
