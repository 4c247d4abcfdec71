//! Per-client state shared by every resource and action the client hands out.
//!
//! ```text
//! Session
//! ├── endpoint: String                    // homepage URL
//! ├── options: RwLock<ClientOptions>      // live, patchable options
//! ├── fetch: Arc<dyn Fetch>               // raw HTTP capability
//! ├── middleware: RwLock<MiddlewareStack> // onion around the transport
//! └── links: Mutex<HashMap<..>>           // link-identity table
//! ```
//!
//! The link-identity table maps a self-link URL to the resource last built
//! for it. Entries are strong, so a link stays resolvable after the caller
//! drops the document it came from. Documents point back at the session,
//! so the owning [`Client`](crate::Client) clears the table once its last
//! handle is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use log::debug;

use crate::core::config::{ClientOptions, ConfigError};
use crate::core::merge::Value;
use crate::hal::resource::Resource;
use crate::transport::{
    Fetch, LoadResult, Middleware, MiddlewareStack, RequestOptions, Transport,
};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct Session {
    endpoint: String,
    options: RwLock<ClientOptions>,
    fetch: Arc<dyn Fetch>,
    middleware: RwLock<MiddlewareStack>,
    links: Mutex<HashMap<String, Resource>>,
}

impl Session {
    pub(crate) fn new(endpoint: String, options: ClientOptions, fetch: Arc<dyn Fetch>) -> Self {
        Self {
            endpoint,
            options: RwLock::new(options),
            fetch,
            middleware: RwLock::new(MiddlewareStack::new()),
            links: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn options(&self) -> ClientOptions {
        self.options
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn set_options(&self, patch: &Value) -> Result<(), ConfigError> {
        self.options
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(patch)
    }

    /// Client-wide transport defaults as request options.
    pub(crate) fn xhr_defaults(&self) -> RequestOptions {
        RequestOptions::from(&self.options().xhr)
    }

    pub(crate) fn wrap_middleware(&self, layer: Arc<dyn Middleware>) {
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .wrap(layer);
    }

    pub(crate) fn apply_middleware(&self, layers: Vec<Arc<dyn Middleware>>) {
        self.middleware
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(layers);
    }

    pub(crate) fn register(&self, url: &str, resource: &Resource) {
        debug!("Registering self link {url}");
        lock(&self.links).insert(url.to_string(), resource.clone());
    }

    /// The resource registered under `url`, if any.
    pub(crate) fn lookup(&self, url: &str) -> Option<Resource> {
        lock(&self.links).get(url).cloned()
    }

    /// Drops every registered resource.
    pub(crate) fn clear_links(&self) {
        let dropped = std::mem::take(&mut *lock(&self.links));
        debug!("Released {} registered link(s)", dropped.len());
    }

    /// Sends a request through the middleware stack and the transport.
    pub(crate) async fn send(&self, url: &str, options: RequestOptions) -> LoadResult {
        let stack = self
            .middleware
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let transport = Transport::new(self.fetch.clone(), self.xhr_defaults());
        stack.send(&transport, url.to_string(), options).await
    }
}
