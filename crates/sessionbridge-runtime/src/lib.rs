//! sessionbridge-runtime
//!
//! Carries an auth session across stateless HTTP requests in cookies:
//!
//! - [`SessionBridge`] wires an auth client's storage hooks to a request's [`CookieJar`]
//! - [`AuthGate`] runs a handler only when the request carries a valid session
//! - [`handle_auth_callback`] persists browser-side auth state changes into cookies
//!
//! ## Quick start
//! ```no_run
//! use std::sync::Arc;
//! use sessionbridge_adapters::EdgeJar;
//! use sessionbridge_core::BridgeConfig;
//! use sessionbridge_runtime::{AuthGate, GoTrueFactory};
//!
//! # async fn demo(request: http::Request<()>) -> Result<(), Box<dyn std::error::Error>> {
//! let gate = AuthGate::new(GoTrueFactory, BridgeConfig::from_env()?);
//! let jar = Arc::new(EdgeJar::from_request(&request));
//!
//! let outcome = gate
//!     .run(jar.clone(), |bridge| async move {
//!         let session = bridge.get_session().await?;
//!         Ok::<_, sessionbridge_api::BridgeError>(session.and_then(|s| s.user_id().map(str::to_string)))
//!     })
//!     .await;
//!
//! let mut response = match outcome.error_response() {
//!     Some(rejection) => rejection,
//!     None => http::Response::new(String::from("ok")),
//! };
//! jar.apply_to(&mut response);
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]

mod bridge;
mod callback;
#[cfg(feature = "fetch-reqwest")]
mod client;
mod gate;
mod storage;
#[cfg(test)]
mod testing;

pub use bridge::{CLIENT_INFO, SessionBridge, client_params};
pub use callback::{AuthCallback, AuthChangeEvent, handle_auth_callback};
#[cfg(feature = "fetch-reqwest")]
pub use client::{GoTrueClient, GoTrueFactory};
pub use gate::{
    AuthGate, ErrorBody, GateOutcome, NOT_AUTHENTICATED, NOT_AUTHENTICATED_DESCRIPTION,
};
pub use storage::CookieStorage;

pub use sessionbridge_adapters::CookieJar;
