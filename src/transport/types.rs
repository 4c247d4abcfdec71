use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::config::XhrOptions;
use crate::core::merge::{Value, merged};

fn is_false(b: &bool) -> bool {
    !*b
}

/// Options for one outgoing request.
///
/// `method`, `headers`, `body` and `timeout` reach the transport. `force`
/// and `url` are read by [`Action::fetch`](crate::hal::Action::fetch).
/// Anything in `extra` is passed through untouched for middleware to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Milliseconds before the request is abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Name of the action that issued the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Overrides the action's resolved URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Bypass the link-identity table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub force: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_timeout(mut self, ms: u64) -> Self {
        self.timeout = Some(ms);
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self)
            .map(Value::from)
            .unwrap_or_else(|_| Value::object())
    }

    /// Deep-merges `layers` left to right into a fresh set of options.
    ///
    /// If the merged tree no longer fits the option shape (an `extra` key
    /// shadowing a typed field with the wrong type), the last layer wins
    /// outright.
    pub fn layered(layers: &[&RequestOptions]) -> RequestOptions {
        let values: Vec<Value> = layers.iter().map(|layer| layer.to_value()).collect();
        let refs: Vec<&Value> = values.iter().collect();
        let tree = merged(&refs);

        match serde_json::from_value(tree.into()) {
            Ok(options) => options,
            Err(e) => {
                warn!("Request options did not merge cleanly: {e}");
                layers.last().map(|o| (*o).clone()).unwrap_or_default()
            }
        }
    }
}

impl From<&XhrOptions> for RequestOptions {
    fn from(xhr: &XhrOptions) -> Self {
        RequestOptions {
            headers: xhr.headers.clone(),
            timeout: xhr.timeout,
            ..Default::default()
        }
    }
}

/// A fully buffered HTTP response.
///
/// Cheap to clone; clones share the body and its "already read" flag.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    status_text: String,
    headers: BTreeMap<String, String>,
    body: Arc<str>,
    body_used: Arc<AtomicBool>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self {
            status,
            status_text: String::new(),
            headers: BTreeMap::new(),
            body: Arc::from(body),
            body_used: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Stand-in for a transport failure that produced no response at all.
    pub fn unavailable() -> Self {
        Self::new(503, "").with_status_text("Possible CORS error")
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Header lookup, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn body_used(&self) -> bool {
        self.body_used.load(Ordering::SeqCst)
    }

    /// Reads the body as text and marks it used.
    pub fn text(&self) -> String {
        self.body_used.store(true, Ordering::SeqCst);
        self.body.to_string()
    }

    /// Reads the body and parses it as JSON.
    pub fn json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layered_later_layers_win() {
        let base = RequestOptions::new().with_method("GET").with_header("Accept", "a");
        let defaults = RequestOptions::new()
            .with_header("Accept", "b")
            .with_header("X-Trace", "1")
            .with_timeout(100);
        let call = RequestOptions::new()
            .with_method("PUT")
            .with_extra("retry", json!({"max": 2}));

        let merged = RequestOptions::layered(&[&base, &defaults, &call]);
        assert_eq!(merged.method.as_deref(), Some("PUT"));
        assert_eq!(merged.header("accept"), Some("b"));
        assert_eq!(merged.header("X-Trace"), Some("1"));
        assert_eq!(merged.timeout, Some(100));
        assert_eq!(merged.extra.get("retry"), Some(&json!({"max": 2})));
        assert!(!merged.force);
    }

    #[test]
    fn test_layered_leaves_inputs_alone() {
        let defaults = RequestOptions::new().with_header("Accept", "a");
        let call = RequestOptions::new().with_header("Authorization", "x");
        let _ = RequestOptions::layered(&[&defaults, &call]);
        assert_eq!(defaults.headers.len(), 1);
        assert_eq!(call.headers.len(), 1);
    }

    #[test]
    fn test_response_classification() {
        assert!(Response::new(200, "").is_success());
        assert!(Response::new(204, "").is_success());
        assert!(!Response::new(302, "").is_success());
        assert!(!Response::new(500, "").is_success());
        let unavailable = Response::unavailable();
        assert_eq!(unavailable.status(), 503);
        assert_eq!(unavailable.status_text(), "Possible CORS error");
    }

    #[test]
    fn test_body_used_is_shared_between_clones() {
        let response = Response::new(200, r#"{"a":1}"#);
        let clone = response.clone();
        assert!(!clone.body_used());
        assert_eq!(response.json().unwrap(), json!({"a": 1}));
        assert!(clone.body_used());
    }
}
