use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub type StorageKey = String;

/// Header attached to every outbound call made by an auth client.
pub const CLIENT_INFO_HEADER: &str = "X-Client-Info";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub expires_at: Option<u64>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<serde_json::Value>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    /// True when the access token is expired, or will be within `margin_secs` of `now_secs`.
    ///
    /// A session without `expires_at` never expires on its own.
    pub fn is_expired_at(&self, now_secs: u64, margin_secs: u64) -> bool {
        self.expires_at
            .is_some_and(|exp| exp <= now_secs.saturating_add(margin_secs))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user
            .as_ref()
            .and_then(|u| u.get("id"))
            .and_then(|v| v.as_str())
    }
}

/// Build-time identity of the package making auth calls, rendered as `name@version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientInfo {
    pub name: &'static str,
    pub version: &'static str,
}

impl ClientInfo {
    pub const fn new(name: &'static str, version: &'static str) -> Self {
        Self { name, version }
    }

    pub fn header_value(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientParams {
    pub url: String,
    pub anon_key: String,
    pub storage_key: StorageKey,
    pub global_headers: BTreeMap<String, String>,
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("upstream auth error: {0}")]
    Upstream(String),
    #[error("handler error: {0}")]
    Handler(String),
}

impl BridgeError {
    /// Short machine-readable cause, used when logging folded failures.
    pub fn cause(&self) -> &'static str {
        match self {
            BridgeError::Configuration(_) => "configuration",
            BridgeError::Unauthenticated(_) => "unauthenticated",
            BridgeError::Upstream(_) => "upstream",
            BridgeError::Handler(_) => "handler",
        }
    }
}

/// Key/value persistence hooks handed to an auth client.
///
/// Implementations are synchronous and infallible from the client's point of view;
/// failures degrade to "absent" on read and to a skipped write.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

#[async_trait::async_trait]
pub trait AuthClient: Send + Sync {
    /// Returns the current session, refreshing it through the storage hooks if needed.
    async fn get_session(&self) -> Result<Option<Session>, BridgeError>;
    async fn sign_out(&self) -> Result<(), BridgeError>;
}

pub trait AuthClientFactory: Send + Sync {
    type Client: AuthClient;

    fn build(
        &self,
        params: ClientParams,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<Self::Client, BridgeError>;
}
