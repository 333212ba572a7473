//! Cookie entries and `Set-Cookie` rendering.

use crate::{Error, Result};
use httpdate::fmt_http_date;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default lifetime of a session cookie: one year.
pub const DEFAULT_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 365;

/// SameSite attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// Sent on same-site requests only.
    Strict,
    /// Also sent on top-level navigations from other sites.
    Lax,
    /// Sent on cross-site requests; browsers require `Secure` alongside it.
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Attributes attached to a cookie when it is written.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieOptions {
    /// `Domain` attribute; host-only when absent.
    pub domain: Option<String>,

    /// `Path` attribute, `/` unless configured.
    pub path: String,

    /// Lifetime in seconds.
    pub max_age_seconds: Option<u64>,

    /// Absolute expiry. When `max_age_seconds` is set, `Expires` is derived from it instead.
    pub expires: Option<SystemTime>,

    /// `HttpOnly` attribute. Off by default: the browser-side client reads these cookies.
    pub http_only: bool,

    /// `Secure` attribute.
    pub secure: bool,

    /// SameSite attribute.
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            domain: None,
            path: "/".to_string(),
            max_age_seconds: Some(DEFAULT_MAX_AGE_SECONDS),
            expires: None,
            http_only: false,
            secure: true,
            same_site: Some(SameSite::Lax),
        }
    }
}

/// One physical cookie: a name, its wire value, and its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CookieEntry {
    /// Physical cookie name (`name` or `name.<i>` for chunks).
    pub name: String,
    /// Already-encoded wire value.
    pub value: String,
    /// Attributes.
    pub options: CookieOptions,
}

impl CookieEntry {
    /// True if this entry deletes the cookie rather than setting it.
    pub fn is_removal(&self) -> bool {
        self.value.is_empty()
    }

    /// Render the entry as a `Set-Cookie` header value.
    ///
    /// An empty value renders as an expiring cookie (`Max-Age=0`, `Expires` at the epoch).
    pub fn to_header_value(&self) -> Result<String> {
        validate_name(&self.name)?;
        let opts = &self.options;

        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("{}={}", self.name, self.value));
        parts.push(format!("Path={}", checked_attr("Path", &opts.path)?));

        if let Some(domain) = opts.domain.as_deref().filter(|d| !d.is_empty()) {
            parts.push(format!("Domain={}", checked_attr("Domain", domain)?));
        }

        if self.is_removal() {
            parts.push("Max-Age=0".to_string());
            parts.push(format!("Expires={}", fmt_http_date(UNIX_EPOCH)));
        } else if let Some(max_age) = opts.max_age_seconds {
            parts.push(format!("Max-Age={max_age}"));
            // Expires for older clients.
            let expires = SystemTime::now() + Duration::from_secs(max_age);
            parts.push(format!("Expires={}", fmt_http_date(expires)));
        } else if let Some(expires) = opts.expires {
            parts.push(format!("Expires={}", fmt_http_date(expires)));
        }

        if opts.http_only {
            parts.push("HttpOnly".to_string());
        }
        if opts.secure {
            parts.push("Secure".to_string());
        }
        if let Some(same_site) = opts.same_site {
            parts.push(format!("SameSite={}", same_site.as_str()));
        }

        Ok(parts.join("; "))
    }
}

/// Build an entry that clears `name`.
pub fn removal_entry(name: &str, options: &CookieOptions) -> CookieEntry {
    CookieEntry {
        name: name.to_string(),
        value: String::new(),
        options: options.clone(),
    }
}

/// True if `name` is a non-empty RFC 6265 token, i.e. usable as a cookie name.
pub fn is_cookie_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_token_char)
}

pub(crate) fn is_token_char(c: char) -> bool {
    c.is_ascii_graphic()
        && !matches!(
            c,
            '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '=' | '{' | '}'
        )
}

fn validate_name(name: &str) -> Result<()> {
    if !is_cookie_name(name) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

fn checked_attr<'a>(attribute: &'static str, value: &'a str) -> Result<&'a str> {
    if value.contains([';', '\r', '\n']) {
        return Err(Error::InvalidAttribute {
            attribute,
            value: value.to_string(),
        });
    }
    Ok(value)
}
