//! # Middleware
//!
//! Every request a client makes passes through its middleware stack before
//! reaching the [`Transport`]. A layer sees the URL and options, may change
//! them, and either continues with `next.run(..)` or answers on its own.
//!
//! ```text
//! client ─▶ outermost ─▶ ... ─▶ innermost ─▶ Transport ─▶ Fetch
//! ```
//!
//! [`MiddlewareStack::wrap`] puts a layer outside everything installed so
//! far. [`MiddlewareStack::apply`] installs a whole list so that the
//! first-listed layer ends up innermost, next to the transport.

use std::sync::Arc;

use async_trait::async_trait;

use super::load::{LoadResult, Transport};
use super::types::RequestOptions;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, url: String, options: RequestOptions, next: Next<'_>) -> LoadResult;
}

/// The rest of the chain, as seen from one layer.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    layers: &'a [Arc<dyn Middleware>],
    transport: &'a Transport,
}

impl<'a> Next<'a> {
    /// Continues with the next layer, or the transport once layers run out.
    pub async fn run(self, url: String, options: RequestOptions) -> LoadResult {
        match self.layers.split_first() {
            Some((layer, rest)) => {
                let next = Next {
                    layers: rest,
                    transport: self.transport,
                };
                layer.handle(url, options, next).await
            }
            None => self.transport.load(&url, options).await,
        }
    }
}

/// Ordered layers, outermost first.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wraps the current chain: `layer` becomes the outermost.
    pub fn wrap(&mut self, layer: Arc<dyn Middleware>) {
        self.layers.insert(0, layer);
    }

    /// Installs `layers` so the first-listed one sits innermost.
    pub fn apply(&mut self, layers: Vec<Arc<dyn Middleware>>) {
        for layer in layers {
            self.wrap(layer);
        }
    }

    pub async fn send(&self, transport: &Transport, url: String, options: RequestOptions) -> LoadResult {
        Next {
            layers: &self.layers,
            transport,
        }
        .run(url, options)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockFetch;
    use crate::transport::{Response, TransportFailure};
    use std::sync::Mutex;

    /// Records its tag on the way in and out.
    struct Tracer {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Tracer {
        async fn handle(&self, url: String, options: RequestOptions, next: Next<'_>) -> LoadResult {
            self.log.lock().unwrap().push(format!("{}>", self.tag));
            let result = next.run(url, options).await;
            self.log.lock().unwrap().push(format!("<{}", self.tag));
            result
        }
    }

    struct ShortCircuit;

    #[async_trait]
    impl Middleware for ShortCircuit {
        async fn handle(&self, _url: String, _options: RequestOptions, _next: Next<'_>) -> LoadResult {
            Ok(Response::new(200, "cached"))
        }
    }

    struct AddHeader;

    #[async_trait]
    impl Middleware for AddHeader {
        async fn handle(&self, url: String, options: RequestOptions, next: Next<'_>) -> LoadResult {
            next.run(url, options.with_header("Authorization", "Bearer t")).await
        }
    }

    fn tracer(tag: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Middleware> {
        Arc::new(Tracer {
            tag,
            log: log.clone(),
        })
    }

    #[tokio::test]
    async fn test_apply_puts_first_listed_innermost() {
        let fetch = Arc::new(MockFetch::new().route("http://api.test/", 200, "{}"));
        let transport = Transport::new(fetch, RequestOptions::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut stack = MiddlewareStack::new();
        stack.apply(vec![tracer("a", &log), tracer("b", &log), tracer("c", &log)]);
        stack
            .send(&transport, "http://api.test/".into(), RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["c>", "b>", "a>", "<a", "<b", "<c"]
        );
    }

    #[tokio::test]
    async fn test_wrap_goes_outermost() {
        let fetch = Arc::new(MockFetch::new().route("http://api.test/", 200, "{}"));
        let transport = Transport::new(fetch, RequestOptions::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut stack = MiddlewareStack::new();
        stack.wrap(tracer("inner", &log));
        stack.wrap(tracer("outer", &log));
        stack
            .send(&transport, "http://api.test/".into(), RequestOptions::new())
            .await
            .unwrap();

        assert_eq!(log.lock().unwrap()[0], "outer>");
        assert_eq!(stack.len(), 2);
    }

    #[tokio::test]
    async fn test_short_circuit_skips_transport() {
        let fetch = Arc::new(MockFetch::new());
        let transport = Transport::new(fetch.clone(), RequestOptions::new());
        let mut stack = MiddlewareStack::new();
        stack.wrap(Arc::new(ShortCircuit));

        let response = stack
            .send(&transport, "http://api.test/".into(), RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(response.text(), "cached");
        assert_eq!(fetch.call_count(), 0);
    }

    #[tokio::test]
    async fn test_layer_can_rewrite_options() {
        let fetch = Arc::new(MockFetch::new().route("http://api.test/", 401, ""));
        let transport = Transport::new(fetch.clone(), RequestOptions::new());
        let mut stack = MiddlewareStack::new();
        stack.wrap(Arc::new(AddHeader));

        let result = stack
            .send(&transport, "http://api.test/".into(), RequestOptions::new())
            .await;
        assert!(matches!(result, Err(TransportFailure::Response(ref r)) if r.status() == 401));
        let (_, sent) = fetch.last_call().unwrap();
        assert_eq!(sent.header("Authorization"), Some("Bearer t"));
    }
}
