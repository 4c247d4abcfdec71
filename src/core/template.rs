//! # URI Templates
//!
//! RFC 6570 expansion, levels 1 through 4: simple, reserved (`+`),
//! fragment (`#`), label (`.`), path (`/`), path-parameter (`;`),
//! query (`?`) and continuation (`&`) expressions, with `:n` prefixes and
//! `*` explode modifiers.
//!
//! Variables come from a JSON object. `null`, missing keys, empty lists and
//! empty objects are undefined and expand to nothing.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Map, Value};

struct Operator {
    first: &'static str,
    sep: &'static str,
    named: bool,
    if_empty: &'static str,
    allow_reserved: bool,
}

const SIMPLE: Operator = Operator {
    first: "",
    sep: ",",
    named: false,
    if_empty: "",
    allow_reserved: false,
};

fn operator(c: char) -> Option<Operator> {
    let op = match c {
        '+' => Operator {
            allow_reserved: true,
            ..SIMPLE
        },
        '#' => Operator {
            first: "#",
            allow_reserved: true,
            ..SIMPLE
        },
        '.' => Operator {
            first: ".",
            sep: ".",
            ..SIMPLE
        },
        '/' => Operator {
            first: "/",
            sep: "/",
            ..SIMPLE
        },
        ';' => Operator {
            first: ";",
            sep: ";",
            named: true,
            ..SIMPLE
        },
        '?' => Operator {
            first: "?",
            sep: "&",
            named: true,
            if_empty: "=",
            allow_reserved: false,
        },
        '&' => Operator {
            first: "&",
            sep: "&",
            named: true,
            if_empty: "=",
            allow_reserved: false,
        },
        _ => return None,
    };
    Some(op)
}

struct VarSpec<'a> {
    name: &'a str,
    prefix: Option<usize>,
    explode: bool,
}

fn parse_varspec(raw: &str) -> VarSpec<'_> {
    let raw = raw.trim();
    if let Some(name) = raw.strip_suffix('*') {
        return VarSpec {
            name,
            prefix: None,
            explode: true,
        };
    }
    if let Some((name, len)) = raw.split_once(':')
        && let Ok(len) = len.parse::<usize>()
    {
        return VarSpec {
            name,
            prefix: Some(len),
            explode: false,
        };
    }
    VarSpec {
        name: raw,
        prefix: None,
        explode: false,
    }
}

/// Splits a template into literal text and `{...}` expression bodies.
enum Part<'a> {
    Literal(&'a str),
    Expression(&'a str),
}

fn parts(template: &str) -> Vec<Part<'_>> {
    let mut out = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        if open > 0 {
            out.push(Part::Literal(&rest[..open]));
        }
        out.push(Part::Expression(&rest[open + 1..open + close]));
        rest = &rest[open + close + 1..];
    }
    if !rest.is_empty() {
        out.push(Part::Literal(rest));
    }
    out
}

fn split_operator(body: &str) -> (Option<Operator>, &str) {
    match body.chars().next().and_then(operator) {
        Some(op) => (Some(op), &body[1..]),
        None => (None, body),
    }
}

/// Everything but ALPHA, DIGIT and `-._~` gets encoded.
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Unreserved plus the RFC 3986 reserved set pass through.
const RESERVED: &AsciiSet = &UNRESERVED
    .remove(b':')
    .remove(b'/')
    .remove(b'?')
    .remove(b'#')
    .remove(b'[')
    .remove(b']')
    .remove(b'@')
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b';')
    .remove(b'=');

fn is_pct_triplet(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 3 && bytes[1].is_ascii_hexdigit() && bytes[2].is_ascii_hexdigit()
}

fn encode(input: &str, allow_reserved: bool) -> String {
    if !allow_reserved {
        return utf8_percent_encode(input, UNRESERVED).to_string();
    }

    // Reserved expansion keeps existing pct-encoded triplets intact.
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(idx) = rest.find('%') {
        out.extend(utf8_percent_encode(&rest[..idx], RESERVED));
        let tail = &rest[idx..];
        if is_pct_triplet(tail) {
            out.push_str(&tail[..3]);
            rest = &tail[3..];
        } else {
            out.push_str("%25");
            rest = &tail[1..];
        }
    }
    out.extend(utf8_percent_encode(rest, RESERVED));
    out
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn is_undefined(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn expand_expression(body: &str, params: &Map<String, Value>) -> String {
    let (op, vars) = split_operator(body);
    let op = op.unwrap_or(SIMPLE);
    let mut out = String::new();
    let mut first = true;

    for spec in vars.split(',').map(parse_varspec) {
        let Some(value) = params.get(spec.name).filter(|v| !is_undefined(v)) else {
            continue;
        };

        out.push_str(if first { op.first } else { op.sep });
        first = false;

        match value {
            Value::Array(items) => {
                let items: Vec<String> = items.iter().filter_map(scalar).collect();
                if spec.explode {
                    let joined: Vec<String> = items
                        .iter()
                        .map(|item| named_item(&op, spec.name, item))
                        .collect();
                    out.push_str(&joined.join(op.sep));
                } else {
                    if op.named {
                        out.push_str(spec.name);
                        out.push('=');
                    }
                    let joined: Vec<String> =
                        items.iter().map(|i| encode(i, op.allow_reserved)).collect();
                    out.push_str(&joined.join(","));
                }
            }
            Value::Object(map) => {
                let pairs: Vec<(String, String)> = map
                    .iter()
                    .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
                    .collect();
                if spec.explode {
                    let joined: Vec<String> = pairs
                        .iter()
                        .map(|(k, v)| {
                            if op.named {
                                named_item(&op, k, v)
                            } else {
                                format!("{}={}", encode(k, op.allow_reserved), encode(v, op.allow_reserved))
                            }
                        })
                        .collect();
                    out.push_str(&joined.join(op.sep));
                } else {
                    if op.named {
                        out.push_str(spec.name);
                        out.push('=');
                    }
                    let joined: Vec<String> = pairs
                        .iter()
                        .flat_map(|(k, v)| [encode(k, op.allow_reserved), encode(v, op.allow_reserved)])
                        .collect();
                    out.push_str(&joined.join(","));
                }
            }
            scalar_value => {
                let mut text = scalar(scalar_value).unwrap_or_default();
                if let Some(len) = spec.prefix {
                    text = text.chars().take(len).collect();
                }
                if op.named {
                    out.push_str(spec.name);
                    if text.is_empty() {
                        out.push_str(op.if_empty);
                        continue;
                    }
                    out.push('=');
                }
                out.push_str(&encode(&text, op.allow_reserved));
            }
        }
    }

    out
}

fn named_item(op: &Operator, name: &str, item: &str) -> String {
    if !op.named {
        return encode(item, op.allow_reserved);
    }
    if item.is_empty() {
        format!("{name}{}", op.if_empty)
    } else {
        format!("{name}={}", encode(item, op.allow_reserved))
    }
}

/// Expands `template` with the variables in `params`.
pub fn expand(template: &str, params: &Map<String, Value>) -> String {
    parts(template)
        .into_iter()
        .map(|part| match part {
            Part::Literal(text) => text.to_string(),
            Part::Expression(body) => expand_expression(body, params),
        })
        .collect()
}

/// Variable names referenced by `template`, in order of first appearance.
pub fn extract_params(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for part in parts(template) {
        let Part::Expression(body) = part else {
            continue;
        };
        let (_, vars) = split_operator(body);
        for spec in vars.split(',').map(parse_varspec) {
            if !spec.name.is_empty() && !names.iter().any(|n| n == spec.name) {
                names.push(spec.name.to_string());
            }
        }
    }
    names
}
