//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::config::ClientOptions;
use crate::hal::Resource;
use crate::session::Session;
use crate::transport::{Fetch, FetchError, RequestOptions, Response};

pub const BASE: &str = "http://api.test/";

/// In-memory [`Fetch`] serving canned responses by exact URL.
///
/// Unrouted URLs fail like an unreachable host. Every call is recorded
/// before the optional delay, so a pending request already counts.
#[derive(Default)]
pub struct MockFetch {
    routes: HashMap<String, (u16, String)>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(String, RequestOptions)>>,
}

impl MockFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(url.to_string(), (status, body.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<(String, RequestOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_call(&self) -> Option<(String, RequestOptions)> {
        self.calls.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Fetch for MockFetch {
    async fn fetch(&self, url: &str, options: &RequestOptions) -> Result<Response, FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.routes.get(url) {
            Some((status, body)) => Ok(Response::new(*status, body.as_str())),
            None => Err(FetchError::Network(format!("no route for {url}"))),
        }
    }
}

/// A session over `fetch` with default options.
pub(crate) fn session_with(fetch: Arc<MockFetch>) -> Arc<Session> {
    session_with_options(fetch, ClientOptions::default())
}

pub(crate) fn session_with_options(fetch: Arc<MockFetch>, options: ClientOptions) -> Arc<Session> {
    Arc::new(Session::new(BASE.to_string(), options, fetch))
}

/// Parses `json` as a root resource at [`BASE`], returning the fetch behind
/// it for call assertions.
pub fn resource_on(fetch: MockFetch, json: Value) -> (Arc<MockFetch>, Resource) {
    let fetch = Arc::new(fetch);
    let map = match json {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let resource = Resource::parse(session_with(fetch.clone()), BASE, map);
    (fetch, resource)
}

/// Parses `json` as a root resource with no routes behind it.
pub fn resource_with(json: Value) -> Resource {
    resource_on(MockFetch::new(), json).1
}
