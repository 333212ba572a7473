use std::collections::BTreeMap;
use std::sync::Mutex;

use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderName, HeaderValue};
use sessionbridge_cookie::{CookieOptions, parse_cookies};

use crate::{CookieJar, lock, replace_logical_cookie};

/// Jar over `http` crate header maps: edge middleware and any `http`-based server.
pub struct EdgeJar {
    request_headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    response_headers: Mutex<HeaderMap>,
}

impl EdgeJar {
    pub fn new(request_headers: HeaderMap) -> Self {
        // HTTP/2 clients may split cookies over several headers.
        let joined = request_headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            cookies: parse_cookies(&joined),
            request_headers,
            response_headers: Mutex::new(HeaderMap::new()),
        }
    }

    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        Self::new(request.headers().clone())
    }

    /// The accumulated `Set-Cookie` directives, in write order.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        lock(&self.response_headers)
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect()
    }

    pub fn response_headers(&self) -> HeaderMap {
        lock(&self.response_headers).clone()
    }

    /// Append every header written through this jar to `response`.
    pub fn apply_to<B>(&self, response: &mut http::Response<B>) {
        let headers = lock(&self.response_headers);
        for (name, value) in headers.iter() {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }
}

impl CookieJar for EdgeJar {
    fn get_cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
        let mut headers = lock(&self.response_headers);

        let mut existing = Vec::new();
        let mut opaque = Vec::new();
        for v in headers.get_all(SET_COOKIE) {
            match v.to_str() {
                Ok(s) => existing.push(s.to_string()),
                Err(_) => opaque.push(v.clone()),
            }
        }

        let updated = replace_logical_cookie(
            existing,
            self.cookies.keys().map(String::as_str),
            name,
            value,
            options,
        );

        headers.remove(SET_COOKIE);
        for v in opaque {
            headers.append(SET_COOKIE, v);
        }
        for directive in updated {
            match HeaderValue::from_str(&directive) {
                Ok(v) => {
                    headers.append(SET_COOKIE, v);
                }
                Err(e) => tracing::warn!(cookie = name, error = %e, "dropping unencodable Set-Cookie value"),
            }
        }
    }

    fn get_request_header(&self, key: &str) -> Option<String> {
        let name = HeaderName::from_bytes(key.as_bytes()).ok()?;
        let values: Vec<&str> = self
            .request_headers
            .get_all(&name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        (!values.is_empty()).then(|| values.join(", "))
    }
}
