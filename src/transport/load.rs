use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use super::fetch::Fetch;
use super::types::{RequestOptions, Response};
use crate::core::config::DEFAULT_TIMEOUT_MS;
use crate::error::Error;

/// Why a load did not produce a successful response.
#[derive(Debug, Clone)]
pub enum TransportFailure {
    /// The server answered outside 2xx, or nobody answered and a
    /// synthesized 503 stands in.
    Response(Response),
    /// A classified error raised before any response existed (timeout),
    /// or one raised by a middleware.
    Error(Error),
}

impl From<Error> for TransportFailure {
    fn from(err: Error) -> Self {
        TransportFailure::Error(err)
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportFailure::Response(r) => {
                write!(f, "HTTP {} {}", r.status(), r.status_text())
            }
            TransportFailure::Error(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TransportFailure {}

pub type LoadResult = Result<Response, TransportFailure>;

/// The innermost link of the chain: default options, timeout race and
/// status classification around a [`Fetch`].
#[derive(Clone)]
pub struct Transport {
    fetch: Arc<dyn Fetch>,
    defaults: RequestOptions,
}

impl Transport {
    pub fn new(fetch: Arc<dyn Fetch>, defaults: RequestOptions) -> Self {
        Self { fetch, defaults }
    }

    /// Loads `url`, racing the request against its timeout.
    ///
    /// Whichever side settles first decides the outcome; the other future is
    /// dropped and never reports.
    pub async fn load(&self, url: &str, options: RequestOptions) -> LoadResult {
        let effective = RequestOptions::layered(&[&self.defaults, &options]);
        // Zero means "not set".
        let timeout = options
            .timeout
            .or(effective.timeout)
            .filter(|&ms| ms > 0)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        let outcome = tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(timeout)) => {
                warn!("Request to {url} timed out after {timeout}ms");
                return Err(Error::timeout(timeout).into());
            }
            outcome = self.fetch.fetch(url, &effective) => outcome,
        };

        match outcome {
            Ok(response) if response.is_success() => {
                debug!("{url} -> {}", response.status());
                Ok(response)
            }
            Ok(response) => {
                warn!("{url} -> HTTP {} {}", response.status(), response.status_text());
                Err(TransportFailure::Response(response))
            }
            Err(e) => {
                warn!("{url} -> no response: {e}");
                Err(TransportFailure::Response(Response::unavailable()))
            }
        }
    }
}
