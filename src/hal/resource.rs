//! # Resources
//!
//! A fetched HAL document becomes an arena of nodes shared behind one
//! `Arc`. The root node is the document itself, every other node is an
//! entry from some `_embedded` section:
//!
//! ```text
//! Document (base = request URL)
//! ├── [0] root            parent: client
//! ├── [1] _embedded.owner parent: 0
//! ├── [2] _embedded.items[0] parent: 0
//! └── [3] _embedded.items[1] parent: 0
//! ```
//!
//! A [`Resource`] is a handle to one node. Parent links are indices, so the
//! tree has no reference cycles, and every node resolves relative URLs
//! against the document base.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use log::debug;
use serde_json::{Map, Value};

use super::action::{Action, ActionKind, Curie};
use super::result::FetchResult;
use crate::core::config::is_reserved;
use crate::error::Error;
use crate::session::{Session, lock};
use crate::transport::RequestOptions;

enum Slot {
    One(usize),
    Many(Vec<usize>),
}

struct Node {
    /// `None` at the root, whose parent is the client itself.
    parent: Option<usize>,
    props: Map<String, Value>,
    links: Map<String, Value>,
    forms: Map<String, Value>,
    embedded: Vec<(String, Slot)>,
    self_link: Option<String>,
    source: Option<Value>,
    /// Actions by name, built on first request and rebound afterwards.
    actions: Mutex<HashMap<String, Vec<Action>>>,
}

pub(crate) struct Document {
    base: String,
    nodes: Vec<Node>,
    session: Arc<Session>,
}

/// A node of the hypermedia graph: a fetched document or one of its
/// embedded entries.
///
/// Cloning is cheap and yields a handle to the same resource; use
/// [`Resource::ptr_eq`] for identity.
#[derive(Clone)]
pub struct Resource {
    doc: Arc<Document>,
    id: usize,
}

/// What an `_embedded` key holds: one object or an ordered list.
#[derive(Debug, Clone)]
pub enum Embedded {
    One(Resource),
    Many(Vec<Resource>),
}

/// Declared link and form names, `curies` excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionList {
    pub links: Vec<String>,
    pub forms: Vec<String>,
}

fn into_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn build(
    nodes: &mut Vec<Node>,
    completed: &mut Vec<usize>,
    json: Map<String, Value>,
    parent: Option<usize>,
    debug: bool,
) -> usize {
    let id = nodes.len();
    let source = debug.then(|| Value::Object(json.clone()));

    let mut props = Map::new();
    let mut links = Map::new();
    let mut forms = Map::new();
    let mut embedded_json = Map::new();
    for (key, value) in json {
        if !is_reserved(&key) {
            props.insert(key, value);
            continue;
        }
        match key.as_str() {
            "_links" => links = into_object(value),
            "_forms" => forms = into_object(value),
            _ => embedded_json = into_object(value),
        }
    }

    let self_link = links
        .get("self")
        .and_then(|link| link.get("href"))
        .and_then(Value::as_str)
        .filter(|href| !href.is_empty())
        .map(str::to_string);

    nodes.push(Node {
        parent,
        props,
        links,
        forms,
        embedded: Vec::new(),
        self_link,
        source,
        actions: Mutex::new(HashMap::new()),
    });

    let mut embedded = Vec::with_capacity(embedded_json.len());
    for (key, value) in embedded_json {
        let slot = match value {
            Value::Array(items) => Slot::Many(
                items
                    .into_iter()
                    .map(|item| build(nodes, completed, into_object(item), Some(id), debug))
                    .collect(),
            ),
            other => Slot::One(build(nodes, completed, into_object(other), Some(id), debug)),
        };
        embedded.push((key, slot));
    }
    nodes[id].embedded = embedded;

    completed.push(id);
    id
}

fn parse_curies(section: &Map<String, Value>) -> HashMap<String, Curie> {
    let mut curies = HashMap::new();
    if let Some(Value::Array(entries)) = section.get("curies") {
        for entry in entries.iter().filter_map(Value::as_object) {
            if let Some(name) = entry.get("name").and_then(Value::as_str)
                && !name.is_empty()
            {
                curies.insert(name.to_string(), Curie::from_json(name, entry));
            }
        }
    }
    curies
}

fn entries<'a>(section: &'a Map<String, Value>, name: &str) -> Vec<&'a Map<String, Value>> {
    match section.get(name) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        Some(Value::Object(entry)) => vec![entry],
        _ => Vec::new(),
    }
}

fn declared(section: &Map<String, Value>) -> Vec<String> {
    section
        .keys()
        .filter(|key| key.as_str() != "curies")
        .cloned()
        .collect()
}

impl Resource {
    /// Builds a root resource from a JSON object and registers every self
    /// link it (and its embedded entries) declares.
    pub(crate) fn parse(
        session: Arc<Session>,
        base: impl Into<String>,
        json: Map<String, Value>,
    ) -> Resource {
        let debug = session.options().debug;
        let mut nodes = Vec::new();
        let mut completed = Vec::new();
        build(&mut nodes, &mut completed, json, None, debug);

        let doc = Arc::new(Document {
            base: base.into(),
            nodes,
            session,
        });

        // Children finish before their parents, so on a duplicate self link
        // the outer resource is the one left in the table.
        for id in completed {
            if let Some(url) = &doc.nodes[id].self_link {
                let resource = Resource {
                    doc: doc.clone(),
                    id,
                };
                doc.session.register(url, &resource);
            }
        }

        Resource { doc, id: 0 }
    }

    fn node(&self) -> &Node {
        &self.doc.nodes[self.id]
    }

    fn at(&self, id: usize) -> Resource {
        Resource {
            doc: self.doc.clone(),
            id,
        }
    }

    /// True when both handles point at the same resource.
    pub fn ptr_eq(a: &Resource, b: &Resource) -> bool {
        Arc::ptr_eq(&a.doc, &b.doc) && a.id == b.id
    }

    /// URL that relative action URLs are resolved against.
    pub fn base(&self) -> &str {
        &self.doc.base
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// The resource this one is embedded in; `None` at the root.
    pub fn parent(&self) -> Option<Resource> {
        self.node().parent.map(|id| self.at(id))
    }

    /// Walks up the embedding chain to the fetched document.
    pub fn root(&self) -> Resource {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    pub fn prop(&self, name: &str) -> Option<&Value> {
        self.node().props.get(name)
    }

    /// Every property except `_links`, `_forms` and `_embedded`.
    pub fn props(&self) -> &Map<String, Value> {
        &self.node().props
    }

    pub fn self_link(&self) -> Option<&str> {
        self.node().self_link.as_deref()
    }

    /// The raw JSON this resource was built from; only kept in debug mode.
    pub fn source(&self) -> Option<&Value> {
        self.node().source.as_ref()
    }

    pub fn embedded(&self, name: &str) -> Option<Embedded> {
        self.node()
            .embedded
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, slot)| match slot {
                Slot::One(id) => Embedded::One(self.at(*id)),
                Slot::Many(ids) => Embedded::Many(ids.iter().map(|id| self.at(*id)).collect()),
            })
    }

    pub fn has_embedded(&self, name: &str) -> bool {
        self.node().embedded.iter().any(|(key, _)| key == name)
    }

    pub fn list_embedded(&self) -> Vec<&str> {
        self.node()
            .embedded
            .iter()
            .map(|(key, _)| key.as_str())
            .collect()
    }

    pub fn list_actions(&self) -> ActionList {
        ActionList {
            links: declared(&self.node().links),
            forms: declared(&self.node().forms),
        }
    }

    pub fn has_link(&self, name: &str) -> bool {
        name != "curies" && self.node().links.contains_key(name)
    }

    pub fn has_form(&self, name: &str) -> bool {
        name != "curies" && self.node().forms.contains_key(name)
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.has_link(name) || self.has_form(name)
    }

    /// Actions declared under `name`: links first, then forms.
    ///
    /// The first call for a name builds the actions and caches them on this
    /// resource. Later calls rebind the same instances to `params` instead
    /// of building new ones, so an earlier result reflects the latest
    /// params too. `Value::Null` means no params.
    pub fn action(&self, name: &str, params: &Value) -> Vec<Action> {
        let node = self.node();
        let mut cache = lock(&node.actions);
        if let Some(actions) = cache.get(name) {
            for action in actions {
                action.set_params(params);
            }
            return actions.clone();
        }

        let prefix = name.split(':').next().unwrap_or_default();
        let link_curie = parse_curies(&node.links).remove(prefix);
        let form_curie = parse_curies(&node.forms).remove(prefix);

        let links = entries(&node.links, name).into_iter().map(|def| {
            self.new_action(name, ActionKind::Link, def, link_curie.clone(), params)
        });
        let forms = entries(&node.forms, name).into_iter().map(|def| {
            self.new_action(name, ActionKind::Form, def, form_curie.clone(), params)
        });
        let actions: Vec<Action> = links.chain(forms).collect();

        debug!("Discovered {} action(s) named {name:?}", actions.len());
        cache.insert(name.to_string(), actions.clone());
        actions
    }

    fn new_action(
        &self,
        name: &str,
        kind: ActionKind,
        def: &Map<String, Value>,
        curie: Option<Curie>,
        params: &Value,
    ) -> Action {
        Action::new(
            self.doc.session.clone(),
            self.base().to_string(),
            name,
            kind,
            def,
            curie,
            params,
        )
    }

    /// The first action named `name`, or a `None`-kind action whose fetch
    /// fails with `0020`.
    pub fn first_action(&self, name: &str, params: &Value) -> Action {
        self.action(name, params)
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                Action::none(self.doc.session.clone(), self.base().to_string(), name)
            })
    }

    /// Embedded data when present, otherwise the first action of that name.
    pub async fn fetch_embedded(
        &self,
        name: &str,
        options: RequestOptions,
    ) -> Result<FetchResult, Error> {
        if let Some(embedded) = self.embedded(name) {
            debug!("Serving {name:?} from _embedded");
            return Ok(FetchResult::from_embedded(embedded));
        }
        self.first_action(name, &Value::Null).fetch(options).await
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("base", &self.base())
            .field("self_link", &self.self_link())
            .field("is_root", &self.is_root())
            .field("props", self.props())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::core::config::ClientOptions;
    use crate::test_support::{MockFetch, resource_with, session_with, session_with_options};
    use serde_json::json;

    fn order() -> Value {
        json!({
            "id": 7,
            "total": 30.5,
            "_links": {
                "self": {"href": "/orders/7"},
                "curies": [{"name": "acme", "href": "http://docs.test/rels/{rel}", "templated": true}],
                "customer": {"href": "/customers/3"},
                "acme:items": {"href": "items"},
                "search": [
                    {"href": "/orders{?q}", "templated": true},
                    {"href": "/orders/archive{?q}", "templated": true}
                ]
            },
            "_forms": {
                "search": {"action": "/orders/search", "method": "GET", "fields": {"q": {}}},
                "pay": {"action": "#/orders/7/payments", "fields": {"amount": {"default": 30.5}, "card": {}}}
            },
            "_embedded": {
                "customer": {"name": "Jo", "_links": {"self": {"href": "/customers/3"}}},
                "items": [
                    {"sku": "a", "_embedded": {"product": {"title": "Pen"}}},
                    {"sku": "b"}
                ]
            }
        })
    }

    #[test]
    fn test_reserved_sections_are_not_props() {
        let resource = resource_with(order());
        let keys: Vec<&String> = resource.props().keys().collect();
        assert_eq!(keys, vec!["id", "total"]);
        assert_eq!(resource.prop("id"), Some(&json!(7)));
        assert!(resource.prop("_links").is_none());
        assert!(resource.source().is_none());
    }

    #[test]
    fn test_debug_keeps_raw_source() {
        let options = ClientOptions {
            debug: true,
            ..ClientOptions::default()
        };
        let session = session_with_options(Arc::new(MockFetch::new()), options);
        let json = order();
        let resource = Resource::parse(session, "http://api.test/", json.as_object().cloned().unwrap());

        let source = resource.source().expect("root source");
        assert_eq!(source, &json);
        assert!(source.get("_links").is_some());
        assert!(source.get("_embedded").is_some());

        let Some(Embedded::Many(items)) = resource.embedded("items") else {
            panic!("expected items");
        };
        let first = items[0].source().expect("embedded source");
        assert_eq!(first.get("sku"), Some(&json!("a")));
        assert!(first.get("_embedded").is_some());
        assert!(resource.props().get("_links").is_none());
    }

    #[test]
    fn test_embedded_shapes_follow_source() {
        let resource = resource_with(order());
        assert_eq!(resource.list_embedded(), vec!["customer", "items"]);
        match resource.embedded("customer") {
            Some(Embedded::One(customer)) => {
                assert_eq!(customer.prop("name"), Some(&json!("Jo")));
                assert!(!customer.is_root());
            }
            other => panic!("expected one customer, got {other:?}"),
        }
        match resource.embedded("items") {
            Some(Embedded::Many(items)) => {
                let skus: Vec<&Value> = items.iter().filter_map(|i| i.prop("sku")).collect();
                assert_eq!(skus, vec![&json!("a"), &json!("b")]);
            }
            other => panic!("expected items, got {other:?}"),
        }
        assert!(resource.embedded("missing").is_none());
    }

    #[test]
    fn test_root_walks_any_depth() {
        let resource = resource_with(order());
        let Some(Embedded::Many(items)) = resource.embedded("items") else {
            panic!("items missing");
        };
        let Some(Embedded::One(product)) = items[0].embedded("product") else {
            panic!("product missing");
        };
        assert!(Resource::ptr_eq(&product.parent().unwrap(), &items[0]));
        assert!(Resource::ptr_eq(&product.root(), &resource));
        assert!(resource.is_root());
        assert!(resource.parent().is_none());
        assert_eq!(product.base(), resource.base());
    }

    #[test]
    fn test_list_and_has_actions() {
        let resource = resource_with(order());
        let listed = resource.list_actions();
        assert_eq!(listed.links, vec!["self", "customer", "acme:items", "search"]);
        assert_eq!(listed.forms, vec!["search", "pay"]);
        assert!(resource.has_link("customer"));
        assert!(!resource.has_link("curies"));
        assert!(resource.has_form("pay"));
        assert!(!resource.has_form("customer"));
        assert!(resource.has_action("pay"));
        assert!(!resource.has_action("refund"));
    }

    #[test]
    fn test_links_come_before_forms() {
        let resource = resource_with(order());
        let actions = resource.action("search", &json!({"q": "pen"}));
        let kinds: Vec<ActionKind> = actions.iter().map(Action::kind).collect();
        assert_eq!(kinds, vec![ActionKind::Link, ActionKind::Link, ActionKind::Form]);
        assert_eq!(actions[0].url(), "http://api.test/orders?q=pen");
        assert_eq!(actions[1].url(), "http://api.test/orders/archive?q=pen");
        assert_eq!(actions[2].url(), "http://api.test/orders/search?q=pen");
    }

    #[test]
    fn test_rebinding_reuses_instances() {
        let resource = resource_with(order());
        let first = resource.action("search", &json!({"q": "one"}));
        let second = resource.action("search", &json!({"q": "two"}));
        assert_eq!(first.len(), second.len());
        for (a, b) in first.iter().zip(&second) {
            assert!(Action::ptr_eq(a, b));
        }
        assert_eq!(first[0].url(), "http://api.test/orders?q=two");
    }

    #[test]
    fn test_unknown_action_is_empty() {
        let resource = resource_with(order());
        assert!(resource.action("refund", &Value::Null).is_empty());
        let none = resource.first_action("refund", &Value::Null);
        assert_eq!(none.kind(), ActionKind::None);
        assert_eq!(none.name(), "refund");
    }

    #[tokio::test]
    async fn test_missing_action_fetch_fails_without_io() {
        let fetch = Arc::new(MockFetch::new());
        let resource = Resource::parse(session_with(fetch.clone()), "http://api.test/", Map::new());
        let err = resource
            .first_action("refund", &Value::Null)
            .fetch(RequestOptions::new())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NoActionUrl);
        assert_eq!(err.action.as_deref(), Some("refund"));
        assert_eq!(fetch.call_count(), 0);
    }

    #[test]
    fn test_curie_attaches_by_prefix() {
        let resource = resource_with(order());
        let items = resource.first_action("acme:items", &Value::Null);
        let curie = items.curie().expect("curie");
        assert_eq!(curie.name, "acme");
        assert_eq!(items.doc_url().as_deref(), Some("http://docs.test/rels/items"));
        assert!(resource.first_action("customer", &Value::Null).curie().is_none());
    }

    #[test]
    fn test_self_links_are_registered() {
        let fetch = Arc::new(MockFetch::new());
        let session = session_with(fetch);
        let resource = Resource::parse(session.clone(), "http://api.test/", order().as_object().cloned().unwrap());
        let registered = session.lookup("/orders/7").expect("root registered");
        assert!(Resource::ptr_eq(&registered, &resource));
        let customer = session.lookup("/customers/3").expect("embedded registered");
        assert!(!customer.is_root());
    }

    #[test]
    fn test_registered_links_outlive_their_document() {
        let fetch = Arc::new(MockFetch::new());
        let session = session_with(fetch);
        let resource = Resource::parse(session.clone(), "http://api.test/", order().as_object().cloned().unwrap());
        drop(resource);

        let found = session.lookup("/orders/7").expect("order still registered");
        assert_eq!(found.prop("id"), Some(&json!(7)));
        let customer = session.lookup("/customers/3").expect("customer still registered");
        assert!(Resource::ptr_eq(&customer.root(), &found));

        session.clear_links();
        assert!(session.lookup("/orders/7").is_none());
    }

    #[tokio::test]
    async fn test_fetch_embedded_prefers_embedded() {
        let fetch = Arc::new(MockFetch::new());
        let resource = Resource::parse(
            session_with(fetch.clone()),
            "http://api.test/",
            order().as_object().cloned().unwrap(),
        );
        let result = resource
            .fetch_embedded("customer", RequestOptions::new())
            .await
            .unwrap();
        assert_eq!(
            result.data.as_resource().and_then(|r| r.prop("name")),
            Some(&json!("Jo"))
        );
        assert_eq!(fetch.call_count(), 0);
    }
}
