use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use sessionbridge_cookie::{
    CookieOptions, filter_cookies, is_logical_match, removal_entry, serialize_cookie,
};

mod edge;
mod node;

pub use edge::EdgeJar;
pub use node::{NodeJar, NodeRequest};

/// Uniform cookie and header access over one request/response pair of a host framework.
///
/// Reads come from the request, writes accumulate on the response. A jar lives for exactly
/// one request.
pub trait CookieJar: Send + Sync {
    /// Raw wire value of the physical cookie `name` on the request.
    fn get_cookie(&self, name: &str) -> Option<String>;

    /// Replace the logical cookie `name` (including its chunks) on the response.
    ///
    /// Cookies set earlier for other names are preserved. An empty `value` clears the cookie.
    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions);

    /// Request header `key`, coerced to a single string.
    fn get_request_header(&self, key: &str) -> Option<String>;
}

/// Filter-then-append: drop every existing directive for `name`, then add the new entries.
///
/// Request cookies that belong to `name` but are not part of the new write are expired so
/// the browser does not keep stale chunks around.
pub(crate) fn replace_logical_cookie<'a, I>(
    existing: Vec<String>,
    request_cookie_names: I,
    name: &str,
    value: &str,
    options: &CookieOptions,
) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let options = CookieOptions {
        http_only: false,
        ..options.clone()
    };
    let entries = serialize_cookie(name, value, &options);

    let mut rendered = Vec::with_capacity(entries.len());
    for entry in &entries {
        match entry.to_header_value() {
            Ok(directive) => rendered.push(directive),
            Err(e) => {
                tracing::warn!(cookie = name, error = %e, "not writing cookie");
                return existing;
            }
        }
    }

    let written: BTreeSet<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    let mut out = filter_cookies(existing, name);

    for stale in request_cookie_names
        .into_iter()
        .filter(|n| is_logical_match(n, name) && !written.contains(n))
    {
        match removal_entry(stale, &options).to_header_value() {
            Ok(directive) => out.push(directive),
            Err(e) => tracing::debug!(cookie = stale, error = %e, "cannot expire stale cookie"),
        }
    }

    out.extend(rendered);
    out
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
