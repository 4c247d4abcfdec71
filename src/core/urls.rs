//! URL joining and form serialization.

use percent_encoding::{AsciiSet, utf8_percent_encode};
use serde_json::{Map, Value};
use url::Url;

use crate::core::template::UNRESERVED;

/// Resolves `relative` against `base` the way a browser resolves an href.
///
/// When `base` is not an absolute URL, paths are joined textually: an
/// absolute path or absolute URL replaces the base, anything else replaces
/// the base's last segment.
pub fn urljoin(base: &str, relative: &str) -> String {
    if let Ok(base_url) = Url::parse(base)
        && let Ok(joined) = base_url.join(relative)
    {
        return joined.to_string();
    }

    if relative.is_empty() {
        return base.to_string();
    }
    if Url::parse(relative).is_ok() || relative.starts_with('/') || base.is_empty() {
        return relative.to_string();
    }
    if let Some(query) = relative.strip_prefix('?') {
        let path = base.split(['?', '#']).next().unwrap_or_default();
        return format!("{path}?{query}");
    }

    let dir = match base.rfind('/') {
        Some(idx) => &base[..=idx],
        None => "",
    };
    format!("{dir}{relative}")
}

/// The `encodeURIComponent` set: unreserved plus `!*'()`.
const COMPONENT: &AsciiSet = &UNRESERVED
    .remove(b'!')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encodes `input` as UTF-8 with the `encodeURIComponent` set.
pub fn encode_component(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Serializes a field mapping into `key=value&...`, keeping field order.
///
/// String values are used as-is, everything else as its JSON text.
pub fn url_serialize(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            format!("{}={}", encode_component(key), encode_component(&text))
        })
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_join_absolute_base() {
        assert_eq!(urljoin("http://api.test/v1/", "orders"), "http://api.test/v1/orders");
        assert_eq!(urljoin("http://api.test/v1/root", "orders"), "http://api.test/v1/orders");
        assert_eq!(urljoin("http://api.test/v1/", "/orders"), "http://api.test/orders");
        assert_eq!(
            urljoin("http://api.test/", "https://other.test/x"),
            "https://other.test/x"
        );
    }

    #[test]
    fn test_join_query_replaces_query() {
        assert_eq!(
            urljoin("http://api.test/search?old=1", "?q=a&page=2"),
            "http://api.test/search?q=a&page=2"
        );
    }

    #[test]
    fn test_join_relative_base() {
        assert_eq!(urljoin("", "/orders"), "/orders");
        assert_eq!(urljoin("/api/root", "orders"), "/api/orders");
        assert_eq!(urljoin("/api/search?x=1", "?q=2"), "/api/search?q=2");
    }

    #[test]
    fn test_serialize_keeps_order_and_encodes() {
        let fields = json!({"name": "Jane Doe", "qty": 2, "note": "a&b=c", "ok": true});
        assert_eq!(
            url_serialize(fields.as_object().unwrap()),
            "name=Jane%20Doe&qty=2&note=a%26b%3Dc&ok=true"
        );
    }

    #[test]
    fn test_encode_component_charset() {
        assert_eq!(encode_component("café"), "caf%C3%A9");
        assert_eq!(encode_component("a b/c?d"), "a%20b%2Fc%3Fd");
        assert_eq!(encode_component("-_.!~*'()"), "-_.!~*'()");
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(url_serialize(&Map::new()), "");
    }
}
