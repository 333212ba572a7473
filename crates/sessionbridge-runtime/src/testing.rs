//! In-crate fakes for exercising the bridge and gate without a network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sessionbridge_adapters::{CookieJar, NodeJar, NodeRequest};
use sessionbridge_api::{
    AuthClient, AuthClientFactory, BridgeError, ClientParams, Session, SessionStorage,
};
use sessionbridge_cookie::{CookieOptions, serialize_cookie};
use sessionbridge_core::BridgeConfig;

pub(crate) fn config() -> BridgeConfig {
    BridgeConfig::new("https://abcd.supabase.co", "anon-key")
}

pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// A session expiring `expires_in` seconds from now (negative: already expired).
pub(crate) fn session(expires_in: i64) -> Session {
    let expires_at = now_secs().saturating_add_signed(expires_in);
    Session {
        access_token: format!("access-{expires_at}"),
        refresh_token: "refresh-token".to_string(),
        expires_at: Some(expires_at),
        expires_in: None,
        token_type: "bearer".to_string(),
        provider_token: None,
        provider_refresh_token: None,
        user: Some(serde_json::json!({ "id": "user-1", "email": "user@example.com" })),
    }
}

/// A `Cookie` request header carrying `session` under `name`.
pub(crate) fn session_cookie_header(name: &str, session: &Session) -> String {
    let json = serde_json::to_string(session).unwrap();
    serialize_cookie(name, &json, &CookieOptions::default())
        .iter()
        .map(|e| format!("{}={}", e.name, e.value))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Node-style jar that counts every read and write.
pub(crate) struct CountingJar {
    inner: NodeJar,
    cookie_header: String,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingJar {
    pub(crate) fn new(cookie_header: &str) -> Self {
        Self::build(cookie_header, "app.example.com")
    }

    pub(crate) fn with_host(self, host: &str) -> Self {
        Self::build(&self.cookie_header, host)
    }

    fn build(cookie_header: &str, host: &str) -> Self {
        let mut request = NodeRequest::default().with_header("host", host);
        if !cookie_header.is_empty() {
            request = request.with_header("cookie", cookie_header);
        }
        Self {
            inner: NodeJar::new(request),
            cookie_header: cookie_header.to_string(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub(crate) fn inner(&self) -> &NodeJar {
        &self.inner
    }

    pub(crate) fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl CookieJar for CountingJar {
    fn get_cookie(&self, name: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_cookie(name)
    }

    fn set_cookie(&self, name: &str, value: &str, options: &CookieOptions) {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_cookie(name, value, options);
    }

    fn get_request_header(&self, key: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get_request_header(key)
    }
}

#[derive(Default)]
pub(crate) struct FakeFactory {
    refreshed: Option<Session>,
    fail_check: bool,
    builds: AtomicUsize,
}

impl FakeFactory {
    pub(crate) fn refreshing_to(session: Session) -> Self {
        Self {
            refreshed: Some(session),
            ..Self::default()
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_check: true,
            ..Self::default()
        }
    }

    pub(crate) fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

impl AuthClientFactory for FakeFactory {
    type Client = FakeClient;

    fn build(
        &self,
        params: ClientParams,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<FakeClient, BridgeError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(FakeClient {
            params,
            storage,
            refreshed: self.refreshed.clone(),
            fail_check: self.fail_check,
        })
    }
}

/// Reads the stored session; when expired, "refreshes" to a fixed session through the
/// storage hook, or clears it if no refresh is configured.
pub(crate) struct FakeClient {
    pub(crate) params: ClientParams,
    storage: Arc<dyn SessionStorage>,
    refreshed: Option<Session>,
    fail_check: bool,
}

#[async_trait::async_trait]
impl AuthClient for FakeClient {
    async fn get_session(&self) -> Result<Option<Session>, BridgeError> {
        if self.fail_check {
            return Err(BridgeError::Upstream("connection reset by peer".to_string()));
        }

        let key = &self.params.storage_key;
        let Some(stored) = self
            .storage
            .get_item(key)
            .and_then(|raw| serde_json::from_str::<Session>(&raw).ok())
        else {
            return Ok(None);
        };

        if !stored.is_expired_at(now_secs(), 0) {
            return Ok(Some(stored));
        }

        match &self.refreshed {
            Some(next) => {
                let json = serde_json::to_string(next)
                    .map_err(|e| BridgeError::Upstream(e.to_string()))?;
                self.storage.set_item(key, &json);
                Ok(Some(next.clone()))
            }
            None => {
                self.storage.remove_item(key);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), BridgeError> {
        self.storage.remove_item(&self.params.storage_key);
        Ok(())
    }
}
