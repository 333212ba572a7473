//! Error types.

use thiserror::Error;

/// Crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Cookie name is empty or contains characters outside the RFC 6265 token set.
    #[error("invalid cookie name: {0:?}")]
    InvalidName(String),

    /// An attribute value would break the `Set-Cookie` directive.
    #[error("invalid cookie attribute {attribute}: {value:?}")]
    InvalidAttribute {
        /// Attribute name (`Domain`, `Path`).
        attribute: &'static str,
        /// Offending value.
        value: String,
    },
}
