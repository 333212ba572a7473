use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;

use http::header::{CONTENT_TYPE, LOCATION};
use http::StatusCode;
use serde::Serialize;
use sessionbridge_adapters::CookieJar;
use sessionbridge_api::{AuthClientFactory, BridgeError};
use sessionbridge_core::BridgeConfig;

use crate::bridge::SessionBridge;

pub const NOT_AUTHENTICATED: &str = "not_authenticated";
pub const NOT_AUTHENTICATED_DESCRIPTION: &str =
    "The user does not have an active session or is not authenticated";

const DEFAULT_REDIRECT: &str = "/";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of running a handler behind the gate.
#[derive(Debug)]
pub enum GateOutcome<T> {
    /// The handler ran; its output is passed through untouched.
    Handled(T),
    /// 401 for auth failures, 500 for handler failures.
    Rejected { status: StatusCode, body: ErrorBody },
    /// Page mode only: unauthenticated requests are sent elsewhere.
    Redirect { location: String },
}

impl<T> GateOutcome<T> {
    fn unauthenticated() -> Self {
        GateOutcome::Rejected {
            status: StatusCode::UNAUTHORIZED,
            body: ErrorBody {
                error: NOT_AUTHENTICATED.to_string(),
                description: Some(NOT_AUTHENTICATED_DESCRIPTION.to_string()),
            },
        }
    }

    fn handler_failed(error: &dyn Display) -> Self {
        GateOutcome::Rejected {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ErrorBody {
                error: format!("Error: {error}"),
                description: None,
            },
        }
    }

    pub fn is_handled(&self) -> bool {
        matches!(self, GateOutcome::Handled(_))
    }

    /// Status the gate imposes; `None` when the handler's own response applies.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            GateOutcome::Handled(_) => None,
            GateOutcome::Rejected { status, .. } => Some(*status),
            GateOutcome::Redirect { .. } => Some(StatusCode::TEMPORARY_REDIRECT),
        }
    }

    pub fn handled(self) -> Option<T> {
        match self {
            GateOutcome::Handled(value) => Some(value),
            _ => None,
        }
    }

    /// The response the gate produces on its own, if it short-circuited the request.
    pub fn error_response(&self) -> Option<http::Response<String>> {
        match self {
            GateOutcome::Handled(_) => None,
            GateOutcome::Rejected { status, body } => {
                let json = serde_json::to_string(body)
                    .unwrap_or_else(|_| format!("{{\"error\":\"{NOT_AUTHENTICATED}\"}}"));
                let mut response = http::Response::new(json);
                *response.status_mut() = *status;
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                );
                Some(response)
            }
            GateOutcome::Redirect { location } => {
                let mut response = http::Response::new(String::new());
                *response.status_mut() = StatusCode::TEMPORARY_REDIRECT;
                let value = http::HeaderValue::from_str(location)
                    .unwrap_or_else(|_| http::HeaderValue::from_static(DEFAULT_REDIRECT));
                response.headers_mut().insert(LOCATION, value);
                Some(response)
            }
        }
    }
}

/// Runs handlers only for requests that carry a valid session.
///
/// Configuration errors, missing sessions, and failed session checks all reject with the
/// same 401 body; the underlying cause is logged. Handler errors become a 500.
pub struct AuthGate<F> {
    factory: F,
    config: BridgeConfig,
}

impl<F: AuthClientFactory> AuthGate<F> {
    pub fn new(factory: F, config: BridgeConfig) -> Self {
        Self { factory, config }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// API mode: 401 JSON when unauthenticated.
    pub async fn run<J, H, Fut, T, E>(&self, jar: Arc<J>, handler: H) -> GateOutcome<T>
    where
        J: CookieJar + 'static,
        H: FnOnce(SessionBridge<F::Client>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match self.authorize(jar).await {
            Some(bridge) => Self::invoke(bridge, handler).await,
            None => GateOutcome::unauthenticated(),
        }
    }

    /// Page mode: redirect to `redirect_to` (default `/`) when unauthenticated.
    pub async fn run_page<J, H, Fut, T, E>(
        &self,
        jar: Arc<J>,
        redirect_to: Option<&str>,
        handler: H,
    ) -> GateOutcome<T>
    where
        J: CookieJar + 'static,
        H: FnOnce(SessionBridge<F::Client>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        match self.authorize(jar).await {
            Some(bridge) => Self::invoke(bridge, handler).await,
            None => GateOutcome::Redirect {
                location: redirect_to.unwrap_or(DEFAULT_REDIRECT).to_string(),
            },
        }
    }

    async fn authorize<J>(&self, jar: Arc<J>) -> Option<SessionBridge<F::Client>>
    where
        J: CookieJar + 'static,
    {
        let bridge = match SessionBridge::new(&self.factory, jar, &self.config) {
            Ok(bridge) => bridge,
            Err(e) => {
                log_rejection(&e, "auth gate could not build a client");
                return None;
            }
        };

        match bridge.get_session().await {
            Ok(Some(_)) => Some(bridge),
            Ok(None) => {
                tracing::debug!(cause = "no_session", storage_key = bridge.storage_key(), "auth gate rejected request");
                None
            }
            Err(e) => {
                log_rejection(&e, "auth gate session check failed");
                None
            }
        }
    }

    async fn invoke<H, Fut, T, E>(bridge: SessionBridge<F::Client>, handler: H) -> GateOutcome<T>
    where
        H: FnOnce(SessionBridge<F::Client>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        // A panicking handler is a handler failure too, reported as 500.
        match AssertUnwindSafe(handler(bridge)).catch_unwind().await {
            Ok(Ok(value)) => GateOutcome::Handled(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "gated handler failed");
                GateOutcome::handler_failed(&e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "gated handler panicked");
                GateOutcome::handler_failed(&message)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "handler panicked".to_string())
}

fn log_rejection(error: &BridgeError, message: &str) {
    tracing::warn!(cause = error.cause(), error = %error, "{message}");
}
