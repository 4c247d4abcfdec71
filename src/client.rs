//! # Client
//!
//! Entry point of a navigation session. A client owns the homepage URL,
//! live options, its middleware stack and the link-identity table, and
//! memoizes the homepage request:
//!
//! ```text
//! fetch() ──▶ memo empty? ──yes──▶ start request, store shared future
//!                │                         │
//!                no                        ▼ settles
//!                ▼               success: keep if cache_homepage
//!          join the pending      failure: always forget
//!          (or cached) future
//! ```
//!
//! Callers that arrive while the homepage is in flight share one request.

use std::sync::{Arc, Mutex, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use serde_json::Value;

use crate::core::config::{ClientOptions, ConfigError, VERSION};
use crate::core::merge;
use crate::error::{Error, ErrorCode};
use crate::hal::{Data, FetchResult, Resource};
use crate::session::{Session, lock};
use crate::transport::{Fetch, Middleware, ReqwestFetch, RequestOptions, TransportFailure};

type Homepage = Shared<BoxFuture<'static, Result<FetchResult, Error>>>;
type Memo = Mutex<Option<Homepage>>;

/// Releases the link-identity table when the last client handle goes.
///
/// Registered resources hold the session, so the table would otherwise
/// keep itself alive.
struct LinkTableOwner(Arc<Session>);

impl Drop for LinkTableOwner {
    fn drop(&mut self) {
        self.0.clear_links();
    }
}

/// A HAL API client. Clones share everything, including the homepage memo.
#[derive(Clone)]
pub struct Client {
    session: Arc<Session>,
    homepage: Arc<Memo>,
    _links: Arc<LinkTableOwner>,
}

impl Client {
    pub const VERSION: &'static str = VERSION;

    /// Builds a client over reqwest. Starts the homepage request right away
    /// when `preload_homepage` is set and a tokio runtime is running.
    pub fn new(endpoint: impl Into<String>, options: ClientOptions) -> Self {
        Self::with_fetch(endpoint, options, Arc::new(ReqwestFetch::new()))
    }

    pub fn with_fetch(
        endpoint: impl Into<String>,
        options: ClientOptions,
        fetch: Arc<dyn Fetch>,
    ) -> Self {
        let preload = options.preload_homepage;
        let session = Arc::new(Session::new(endpoint.into(), options, fetch));
        let client = Client {
            _links: Arc::new(LinkTableOwner(session.clone())),
            session,
            homepage: Arc::new(Mutex::new(None)),
        };

        if preload && !client.endpoint().is_empty() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    let pending = client.homepage();
                    handle.spawn(async move {
                        let _ = pending.await;
                    });
                }
                Err(_) => debug!("No tokio runtime, homepage preload skipped"),
            }
        }
        client
    }

    pub fn endpoint(&self) -> &str {
        self.session.endpoint()
    }

    /// Loads the homepage as a root resource.
    ///
    /// Fails with `0000` when no endpoint is configured, `0001` when the
    /// request fails (response attached) and `0002` when the body is not a
    /// JSON object. Timeouts pass through as `0011`.
    pub async fn fetch(&self) -> Result<FetchResult, Error> {
        if self.endpoint().is_empty() {
            return Err(Error::new(ErrorCode::NoEndpoint));
        }
        self.homepage().await
    }

    fn homepage(&self) -> Homepage {
        let mut memo = lock(&self.homepage);
        if let Some(pending) = memo.as_ref() {
            debug!("Joining memoized homepage request");
            return pending.clone();
        }

        let pending = load_homepage(self.session.clone(), Arc::downgrade(&self.homepage))
            .boxed()
            .shared();
        *memo = Some(pending.clone());
        pending
    }

    /// Snapshot of the current options.
    pub fn options(&self) -> ClientOptions {
        self.session.options()
    }

    /// Deep-merges `patch` into the live options. Requests already sent keep
    /// the options they started with.
    pub fn set_options(&self, patch: impl Into<merge::Value>) -> Result<(), ConfigError> {
        self.session.set_options(&patch.into())
    }

    /// Wraps `json` as a root resource without any I/O. A non-object value
    /// yields an empty resource.
    pub fn parse(&self, json: Value) -> Resource {
        let map = match json {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Resource::parse(self.session.clone(), self.endpoint(), map)
    }

    /// Adds `layer` around every middleware installed so far.
    pub fn use_middleware(&self, layer: Arc<dyn Middleware>) {
        self.session.wrap_middleware(layer);
    }

    /// Installs `layers` with the first-listed one innermost.
    pub fn apply_middleware_stack(&self, layers: Vec<Arc<dyn Middleware>>) {
        self.session.apply_middleware(layers);
    }
}

async fn load_homepage(session: Arc<Session>, memo: Weak<Memo>) -> Result<FetchResult, Error> {
    let forget = || {
        if let Some(memo) = memo.upgrade() {
            *lock(&memo) = None;
        }
    };

    let endpoint = session.endpoint().to_string();
    let request = RequestOptions {
        method: Some("GET".to_string()),
        action: Some("homepage".to_string()),
        ..RequestOptions::default()
    };

    info!("Loading homepage {endpoint}");
    match session.send(&endpoint, request).await {
        Ok(response) => {
            if !session.options().cache_homepage {
                forget();
            }
            let text = response.text();
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(json)) => Ok(FetchResult {
                    action: None,
                    data: Data::Resource(Resource::parse(session.clone(), endpoint, json)),
                    xhr: Some(response),
                }),
                _ => {
                    warn!("Homepage at {endpoint} is not a JSON object");
                    Err(Error::new(ErrorCode::HomepageInvalid).with_xhr(response))
                }
            }
        }
        Err(TransportFailure::Response(response)) => {
            forget();
            Err(Error::new(ErrorCode::HomepageFailed).with_xhr(response))
        }
        Err(TransportFailure::Error(err)) => {
            forget();
            Err(err)
        }
    }
}
