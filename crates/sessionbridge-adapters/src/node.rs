use std::collections::BTreeMap;
use std::sync::Mutex;

use sessionbridge_cookie::{CookieOptions, RawHeader, ensure_array, parse_cookies};

use crate::{CookieJar, lock, replace_logical_cookie};

const SET_COOKIE: &str = "set-cookie";

/// Request side of a Node-style pair: lowercase raw headers plus, when the framework
/// provides them, already parsed cookies (API routes, server-side rendering contexts).
#[derive(Debug, Clone, Default)]
pub struct NodeRequest {
    /// Raw request headers keyed by lowercase name.
    pub headers: BTreeMap<String, RawHeader>,
    /// Cookies the framework already parsed; `None` falls back to the `cookie` header.
    pub cookies: Option<BTreeMap<String, String>>,
}

impl NodeRequest {
    /// Add a request header; the key is stored lowercase.
    #[must_use]
    pub fn with_header(mut self, key: &str, value: impl Into<RawHeader>) -> Self {
        self.headers.insert(key.to_ascii_lowercase(), value.into());
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: BTreeMap<String, String>) -> Self {
        self.cookies = Some(cookies);
        self
    }
}

/// Cookie jar over a Node-style request and an accumulating response header map.
///
/// `Set-Cookie` may arrive as one joined string or a list; writes always store a list.
pub struct NodeJar {
    request: NodeRequest,
    cookies: BTreeMap<String, String>,
    response_headers: Mutex<BTreeMap<String, RawHeader>>,
}

impl NodeJar {
    /// Jar with an empty response header map.
    pub fn new(request: NodeRequest) -> Self {
        Self::with_response_headers(request, BTreeMap::new())
    }

    /// Start from headers the handler chain already put on the response.
    pub fn with_response_headers(
        request: NodeRequest,
        response_headers: BTreeMap<String, RawHeader>,
    ) -> Self {
        let cookies = match &request.cookies {
            Some(parsed) => parsed.clone(),
            None => request
                .headers
                .get("cookie")
                .map(|raw| parse_cookies(&ensure_array(Some(raw)).join("; ")))
                .unwrap_or_default(),
        };
        let response_headers = response_headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();

        Self {
            request,
            cookies,
            response_headers: Mutex::new(response_headers),
        }
    }

    pub fn response_header(&self, key: &str) -> Option<RawHeader> {
        lock(&self.response_headers)
            .get(&key.to_ascii_lowercase())
            .cloned()
    }

    /// The accumulated `Set-Cookie` directives, in write order.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        ensure_array(lock(&self.response_headers).get(SET_COOKIE))
    }

    /// Response headers for the framework to send. Keys are lowercase.
    pub fn into_response_headers(self) -> BTreeMap<String, RawHeader> {
        self.response_headers
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl CookieJar for NodeJar {
    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
        let mut headers = lock(&self.response_headers);
        let existing = ensure_array(headers.get(SET_COOKIE));
        let updated = replace_logical_cookie(
            existing,
            self.cookies.keys().map(String::as_str),
            name,
            value,
            options,
        );
        headers.insert(SET_COOKIE.to_string(), RawHeader::List(updated));
    }

    fn get_request_header(&self, key: &str) -> Option<String> {
        self.request
            .headers
            .get(&key.to_ascii_lowercase())
            .map(RawHeader::to_text)
    }
}
