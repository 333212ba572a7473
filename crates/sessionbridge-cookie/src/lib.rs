//! sessionbridge-cookie
//!
//! Framework-agnostic cookie codec for carrying an auth session across stateless requests.
//! It covers four recurring problems:
//!
//! - **Rendering `Set-Cookie` directives** with the usual attributes (SameSite, Max-Age, ...)
//! - **Chunking** values that exceed the per-cookie size limit into `name.0`, `name.1`, ...
//! - **Parsing `Cookie` headers** tolerantly, skipping malformed pairs
//! - **Replacing** a logical cookie in an accumulated `Set-Cookie` list without duplicates
//!
//! ## Quick start
//! ```
//! use sessionbridge_cookie::{CookieOptions, filter_cookies, join_chunks, parse_cookies, serialize_cookie};
//!
//! let entries = serialize_cookie("sb-auth-token", "{\"access_token\":\"...\"}", &CookieOptions::default());
//! let mut set_cookie = filter_cookies(vec!["sb-auth-token=stale".to_string()], "sb-auth-token");
//! for entry in &entries {
//!     set_cookie.push(entry.to_header_value().unwrap());
//! }
//! assert_eq!(set_cookie.len(), 1);
//!
//! let header = format!("sb-auth-token={}", entries[0].value);
//! let cookies = parse_cookies(&header);
//! let value = join_chunks("sb-auth-token", |n| cookies.get(n).cloned());
//! assert_eq!(value.as_deref(), Some("{\"access_token\":\"...\"}"));
//! ```

#![forbid(unsafe_code)]

mod chunk;
mod cookie;
mod error;
mod parse;

pub use chunk::{
    MAX_CHUNK_SIZE, chunk_name, is_logical_match, join_chunks, serialize_cookie,
    serialize_cookie_with_limit,
};
pub use cookie::{
    CookieEntry, CookieOptions, DEFAULT_MAX_AGE_SECONDS, SameSite, is_cookie_name, removal_entry,
};
pub use error::{Error, Result};
pub use parse::{
    RawHeader, ensure_array, filter_cookies, parse_cookies, set_cookie_name, split_joined_set_cookie,
};
