//! Parsing `Cookie` headers and normalizing framework header values.

use crate::chunk::is_logical_match;
use crate::cookie::is_token_char;
use std::collections::BTreeMap;

/// A raw header value as host frameworks expose it: a string, a list of strings, or a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawHeader {
    /// Single string value.
    Text(String),
    /// Multiple values (e.g. several `Set-Cookie` lines).
    List(Vec<String>),
    /// Numeric value (e.g. a `Content-Length` set by the framework).
    Number(i64),
}

impl RawHeader {
    /// Coerce to a single string; lists are joined with `", "`.
    pub fn to_text(&self) -> String {
        match self {
            RawHeader::Text(s) => s.clone(),
            RawHeader::List(items) => items.join(", "),
            RawHeader::Number(n) => n.to_string(),
        }
    }
}

impl From<&str> for RawHeader {
    fn from(value: &str) -> Self {
        RawHeader::Text(value.to_string())
    }
}

impl From<String> for RawHeader {
    fn from(value: String) -> Self {
        RawHeader::Text(value)
    }
}

impl From<Vec<String>> for RawHeader {
    fn from(value: Vec<String>) -> Self {
        RawHeader::List(value)
    }
}

impl From<i64> for RawHeader {
    fn from(value: i64) -> Self {
        RawHeader::Number(value)
    }
}

/// Normalize a "one or many" header value into a list.
///
/// A single string may hold several `Set-Cookie` directives joined with `", "`; it is
/// split with [`split_joined_set_cookie`] so it yields the same list a native sequence would.
pub fn ensure_array(raw: Option<&RawHeader>) -> Vec<String> {
    match raw {
        None => Vec::new(),
        Some(RawHeader::Text(s)) => split_joined_set_cookie(s),
        Some(RawHeader::List(items)) => items.clone(),
        Some(RawHeader::Number(n)) => vec![n.to_string()],
    }
}

/// Split comma-joined `Set-Cookie` directives.
///
/// A comma only separates directives when it is followed by `<token>=`; the comma inside
/// `Expires=Thu, 01 Jan 1970 ...` is not.
pub fn split_joined_set_cookie(joined: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut start = 0;

    for (i, c) in joined.char_indices() {
        if c == ',' && starts_directive(&joined[i + 1..]) {
            push_trimmed(&mut out, &joined[start..i]);
            start = i + 1;
        }
    }
    push_trimmed(&mut out, &joined[start..]);
    out
}

fn starts_directive(rest: &str) -> bool {
    let rest = rest.trim_start();
    let name_len = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
    name_len > 0 && rest[name_len..].starts_with('=')
}

fn push_trimmed(out: &mut Vec<String>, part: &str) {
    let part = part.trim();
    if !part.is_empty() {
        out.push(part.to_string());
    }
}

/// Parse a `Cookie` request header into a name → raw value map.
///
/// Malformed pairs are skipped. The first occurrence of a name wins, matching the order
/// browsers send most specific cookies first.
pub fn parse_cookies(header: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();

    for pair in header.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((name, value)) = pair.split_once('=') else {
            tracing::debug!(pair, "skipping cookie pair without '='");
            continue;
        };
        let name = name.trim();
        if name.is_empty() {
            tracing::debug!(pair, "skipping cookie pair with empty name");
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);

        out.entry(name.to_string()).or_insert_with(|| value.to_string());
    }

    out
}

/// Name of the cookie a `Set-Cookie` directive sets, if it has one.
pub fn set_cookie_name(directive: &str) -> Option<&str> {
    let (name, _) = directive.split_once('=')?;
    let name = name.trim();
    (!name.is_empty()).then_some(name)
}

/// Drop every directive that sets `name` or one of its chunks.
///
/// Directives without a parsable name are kept untouched.
pub fn filter_cookies(existing: Vec<String>, name: &str) -> Vec<String> {
    existing
        .into_iter()
        .filter(|directive| !set_cookie_name(directive).is_some_and(|n| is_logical_match(n, name)))
        .collect()
}
