//! # Actions
//!
//! One invocable link or form of a resource. An action resolves its URL
//! and payload from the params it is bound to, then fetches:
//!
//! ```text
//! set_params(params)
//!   ├── url      = expand(raw_url) joined on curie href / base
//!   └── payload  = fields ← params, defaults  (forms)
//!                  GET/HEAD: fields move into the query string
//!
//! fetch(options)
//!   ├── no url              → 0020
//!   ├── GET, link known     → registered resource, no request
//!   └── send ─▶ 204         → ""
//!             ├ JSON object → new Resource (base = request url)
//!             ├ other body  → text
//!             └ non-2xx     → 0021 with the response
//! ```

use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use serde_json::{Map, Value};

use super::resource::Resource;
use super::result::{Data, FetchResult};
use crate::core::config::is_bodyless;
use crate::core::template::{expand, extract_params};
use crate::core::urls::{url_serialize, urljoin};
use crate::error::{Error, ErrorCode};
use crate::session::{Session, lock};
use crate::transport::{RequestOptions, Response, TransportFailure};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Link,
    Form,
    /// Stands in for a missing action; fetching it fails with `0020`.
    None,
}

/// A compact-URI namespace declared under `curies`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Curie {
    pub name: String,
    pub href: String,
    pub templated: bool,
}

impl Curie {
    pub(crate) fn from_json(name: &str, entry: &Map<String, Value>) -> Self {
        Curie {
            name: name.to_string(),
            href: entry
                .get("href")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            templated: entry
                .get("templated")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// What a form sends.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    Empty,
    /// Declared fields filled from params or their defaults.
    Fields(Map<String, Value>),
    /// Params serialized as JSON text, for forms without declared fields.
    Raw(String),
}

#[derive(Default)]
struct Binding {
    url: String,
    payload: Payload,
}

struct ActionInner {
    session: Arc<Session>,
    base: String,
    name: String,
    kind: ActionKind,
    raw_url: String,
    method: String,
    templated: bool,
    title: String,
    fields: Map<String, Value>,
    declares_fields: bool,
    curie: Option<Curie>,
    binding: Mutex<Binding>,
}

/// Handle to an action. Clones share state, so rebinding through one
/// handle is visible through every other.
#[derive(Clone)]
pub struct Action {
    inner: Arc<ActionInner>,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn text_of(def: &Map<String, Value>, key: &str) -> Option<String> {
    def.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl Action {
    pub(crate) fn new(
        session: Arc<Session>,
        base: String,
        name: &str,
        kind: ActionKind,
        def: &Map<String, Value>,
        curie: Option<Curie>,
        params: &Value,
    ) -> Self {
        let raw_url = text_of(def, "href")
            .or_else(|| text_of(def, "action"))
            .unwrap_or_default();
        let raw_url = raw_url.strip_prefix('#').unwrap_or(&raw_url).to_string();
        let method = text_of(def, "method").unwrap_or_else(|| match kind {
            ActionKind::Form => "POST".to_string(),
            _ => "GET".to_string(),
        });
        let declared = match kind {
            ActionKind::Form => def.get("fields").and_then(Value::as_object),
            _ => None,
        };

        let action = Action {
            inner: Arc::new(ActionInner {
                session,
                base,
                name: name.to_string(),
                kind,
                raw_url,
                method,
                templated: def.get("templated").and_then(Value::as_bool).unwrap_or(false),
                title: text_of(def, "title").unwrap_or_default(),
                fields: declared.cloned().unwrap_or_default(),
                declares_fields: declared.is_some(),
                curie,
                binding: Mutex::new(Binding::default()),
            }),
        };
        action.set_params(params);
        action
    }

    pub(crate) fn none(session: Arc<Session>, base: String, name: &str) -> Self {
        Action::new(session, base, name, ActionKind::None, &Map::new(), None, &Value::Null)
    }

    /// True when both handles are the same action.
    pub fn ptr_eq(a: &Action, b: &Action) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Rebinds the action to `params`, recomputing its URL and payload from
    /// scratch.
    pub fn set_params(&self, params: &Value) {
        let inner = &self.inner;

        let mut url = if inner.templated {
            let empty = Map::new();
            expand(&inner.raw_url, params.as_object().unwrap_or(&empty))
        } else {
            inner.raw_url.clone()
        };
        if !url.is_empty() {
            let base = inner
                .curie
                .as_ref()
                .map_or(inner.base.as_str(), |curie| curie.href.as_str());
            url = urljoin(base, &url);
        }

        let mut payload = Payload::Empty;
        if inner.kind == ActionKind::Form {
            payload = match params {
                Value::Object(given) if inner.declares_fields => Payload::Fields(
                    inner
                        .fields
                        .iter()
                        .filter_map(|(field, declared)| {
                            given
                                .get(field)
                                .or_else(|| declared.get("default"))
                                .map(|value| (field.clone(), value.clone()))
                        })
                        .collect(),
                ),
                other if is_truthy(other) => Payload::Raw(other.to_string()),
                _ => Payload::Empty,
            };

            if is_bodyless(&inner.method)
                && let Payload::Fields(fields) = &payload
            {
                url = urljoin(&url, &format!("?{}", url_serialize(fields)));
                payload = Payload::Empty;
            }
        }

        *lock(&inner.binding) = Binding { url, payload };
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn kind(&self) -> ActionKind {
        self.inner.kind
    }

    /// The resolved URL for the current params; empty when the action has
    /// none.
    pub fn url(&self) -> String {
        lock(&self.inner.binding).url.clone()
    }

    /// `href` or `action` as declared, minus a leading `#`.
    pub fn raw_url(&self) -> &str {
        &self.inner.raw_url
    }

    pub fn method(&self) -> &str {
        &self.inner.method
    }

    /// Template variables the raw URL expects.
    pub fn params(&self) -> Vec<String> {
        extract_params(&self.inner.raw_url)
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn is_templated(&self) -> bool {
        self.inner.templated
    }

    /// Declared form fields; empty for links.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.inner.fields
    }

    pub fn payload(&self) -> Payload {
        lock(&self.inner.binding).payload.clone()
    }

    pub fn curie(&self) -> Option<&Curie> {
        self.inner.curie.as_ref()
    }

    /// Documentation URL for a curie-qualified action.
    pub fn doc_url(&self) -> Option<String> {
        let curie = self.inner.curie.as_ref()?;
        let mut vars = Map::new();
        if let Some(rel) = self.inner.name.split(':').nth(1) {
            vars.insert("rel".to_string(), Value::String(rel.to_string()));
        }
        Some(expand(&curie.href, &vars))
    }

    /// Runs the action.
    ///
    /// `options` is layered over `{method, action}` and the client's
    /// transport defaults. `options.url` overrides the resolved URL and
    /// `options.force` skips the link-identity table.
    pub async fn fetch(&self, options: RequestOptions) -> Result<FetchResult, Error> {
        let inner = &self.inner;
        let (bound_url, payload) = {
            let binding = lock(&inner.binding);
            (binding.url.clone(), binding.payload.clone())
        };

        let url = options
            .url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or(bound_url);
        if url.is_empty() {
            return Err(Error::new(ErrorCode::NoActionUrl).with_action(&inner.name));
        }

        let seed = RequestOptions {
            method: Some(inner.method.clone()),
            action: Some(inner.name.clone()),
            ..RequestOptions::default()
        };
        let mut request =
            RequestOptions::layered(&[&seed, &inner.session.xhr_defaults(), &options]);
        let method = request
            .method
            .clone()
            .unwrap_or_else(|| inner.method.clone());

        if !is_bodyless(&method) {
            match payload {
                Payload::Fields(fields) => {
                    request
                        .headers
                        .retain(|name, _| !name.eq_ignore_ascii_case("Content-Type"));
                    request
                        .headers
                        .insert("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string());
                    request.body = Some(url_serialize(&fields));
                }
                Payload::Raw(text) => {
                    if request.header("Content-Type").is_none() {
                        request
                            .headers
                            .insert("Content-Type".to_string(), JSON_CONTENT_TYPE.to_string());
                    }
                    request.body = Some(text);
                }
                Payload::Empty => {}
            }
        }

        if method.eq_ignore_ascii_case("GET")
            && !options.force
            && let Some(resource) = inner.session.lookup(&inner.raw_url)
        {
            debug!("{} served from the link table ({})", inner.raw_url, inner.name);
            return Ok(FetchResult {
                action: Some(inner.name.clone()),
                data: Data::Resource(resource),
                xhr: None,
            });
        }

        debug!("{method} {url} ({})", inner.name);
        match inner.session.send(&url, request).await {
            Ok(response) => Ok(self.settle(&url, response)),
            Err(TransportFailure::Response(response)) => Err(Error::new(ErrorCode::ActionFailed)
                .with_action(&inner.name)
                .with_xhr(response)),
            Err(TransportFailure::Error(err)) => Err(err),
        }
    }

    fn settle(&self, url: &str, response: Response) -> FetchResult {
        let data = if response.status() == 204 {
            Data::Text(String::new())
        } else {
            let text = response.text();
            match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(json)) => {
                    Data::Resource(Resource::parse(self.inner.session.clone(), url, json))
                }
                Ok(_) => Data::Text(text),
                Err(e) => {
                    warn!("{} returned a non-JSON body: {e}", self.inner.name);
                    Data::Text(text)
                }
            }
        };

        FetchResult {
            action: Some(self.inner.name.clone()),
            data,
            xhr: Some(response),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.inner.name)
            .field("kind", &self.inner.kind)
            .field("method", &self.inner.method)
            .field("url", &self.url())
            .finish()
    }
}
