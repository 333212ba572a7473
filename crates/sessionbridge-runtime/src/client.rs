//! Auth client speaking the GoTrue token API over `reqwest`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use sessionbridge_api::{AuthClient, AuthClientFactory, BridgeError, ClientParams, Session, SessionStorage};

/// Refresh this many seconds before the access token actually expires.
const EXPIRY_MARGIN_SECS: u64 = 10;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default)]
pub struct GoTrueFactory;

impl AuthClientFactory for GoTrueFactory {
    type Client = GoTrueClient;

    fn build(
        &self,
        params: ClientParams,
        storage: Arc<dyn SessionStorage>,
    ) -> Result<GoTrueClient, BridgeError> {
        GoTrueClient::new(params, storage)
    }
}

pub struct GoTrueClient {
    params: ClientParams,
    storage: Arc<dyn SessionStorage>,
    http: reqwest::Client,
}

impl GoTrueClient {
    pub fn new(params: ClientParams, storage: Arc<dyn SessionStorage>) -> Result<Self, BridgeError> {
        let mut headers = HeaderMap::new();
        for (key, value) in &params.global_headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| BridgeError::Configuration(format!("invalid header name {key:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BridgeError::Configuration(format!("invalid value for header {key}: {e}")))?;
            headers.insert(name, value);
        }
        let apikey = HeaderValue::from_str(&params.anon_key)
            .map_err(|e| BridgeError::Configuration(format!("invalid anon key: {e}")))?;
        headers.insert("apikey", apikey);

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| BridgeError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            params,
            storage,
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.params.url.trim_end_matches('/'))
    }

    fn stored_session(&self) -> Option<Session> {
        let raw = self.storage.get_item(&self.params.storage_key)?;
        match serde_json::from_str(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(error = %e, "stored session is not valid JSON");
                None
            }
        }
    }

    fn store(&self, session: &Session) -> Result<(), BridgeError> {
        let json = serde_json::to_string(session)
            .map_err(|e| BridgeError::Upstream(format!("unserializable session: {e}")))?;
        self.storage.set_item(&self.params.storage_key, &json);
        Ok(())
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Option<Session>, BridgeError> {
        let resp = self
            .http
            .post(self.endpoint("token?grant_type=refresh_token"))
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| BridgeError::Upstream(format!("token refresh request failed: {e}")))?;

        let status = resp.status();
        if matches!(status, StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED) {
            tracing::debug!(%status, "refresh token rejected, clearing session");
            self.storage.remove_item(&self.params.storage_key);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(BridgeError::Upstream(format!("token refresh failed ({status})")));
        }

        let mut session: Session = resp
            .json()
            .await
            .map_err(|e| BridgeError::Upstream(format!("invalid token response: {e}")))?;
        if session.expires_at.is_none() {
            session.expires_at = session.expires_in.map(|secs| now_secs().saturating_add(secs));
        }

        self.store(&session)?;
        Ok(Some(session))
    }
}

#[async_trait::async_trait]
impl AuthClient for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, BridgeError> {
        let Some(session) = self.stored_session() else {
            return Ok(None);
        };

        if !session.is_expired_at(now_secs(), EXPIRY_MARGIN_SECS) {
            return Ok(Some(session));
        }

        if session.refresh_token.is_empty() {
            return Ok(None);
        }

        self.refresh(&session.refresh_token).await
    }

    async fn sign_out(&self) -> Result<(), BridgeError> {
        if let Some(session) = self.stored_session() {
            let result = self
                .http
                .post(self.endpoint("logout"))
                .header(AUTHORIZATION, format!("Bearer {}", session.access_token))
                .send()
                .await;
            match result {
                Ok(resp) if resp.status().is_success() => {}
                Ok(resp) => tracing::warn!(status = %resp.status(), "remote sign out was not accepted"),
                Err(e) => tracing::warn!(error = %e, "remote sign out failed"),
            }
        }

        self.storage.remove_item(&self.params.storage_key);
        Ok(())
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct MemoryStorage {
        items: Mutex<BTreeMap<String, String>>,
    }

    impl SessionStorage for MemoryStorage {
        fn get_item(&self, key: &str) -> Option<String> {
            self.items.lock().unwrap().get(key).cloned()
        }

        fn set_item(&self, key: &str, value: &str) {
            self.items.lock().unwrap().insert(key.to_string(), value.to_string());
        }

        fn remove_item(&self, key: &str) {
            self.items.lock().unwrap().remove(key);
        }
    }

    fn params() -> ClientParams {
        ClientParams {
            // Nothing listens here; offline tests never reach it.
            url: "http://127.0.0.1:9".to_string(),
            anon_key: "anon".to_string(),
            storage_key: "sb".to_string(),
            global_headers: BTreeMap::from([("X-Client-Info".to_string(), "test@0.0.0".to_string())]),
        }
    }

    fn stored(storage: &MemoryStorage, session: serde_json::Value) {
        storage.set_item("sb", &session.to_string());
    }

    #[tokio::test]
    async fn fresh_session_needs_no_network() {
        let storage = Arc::new(MemoryStorage::default());
        stored(
            &storage,
            serde_json::json!({
                "access_token": "a",
                "refresh_token": "r",
                "expires_at": now_secs() + 3600,
            }),
        );
        let client = GoTrueFactory.build(params(), storage).unwrap();

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "a");
    }

    #[tokio::test]
    async fn missing_or_garbled_session_is_absent() {
        let storage = Arc::new(MemoryStorage::default());
        let client = GoTrueClient::new(params(), storage.clone()).unwrap();
        assert_eq!(client.get_session().await.unwrap(), None);

        storage.set_item("sb", "not json");
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[tokio::test]
    async fn expired_without_refresh_token_is_absent() {
        let storage = Arc::new(MemoryStorage::default());
        stored(
            &storage,
            serde_json::json!({
                "access_token": "a",
                "refresh_token": "",
                "expires_at": 1,
            }),
        );
        let client = GoTrueClient::new(params(), storage).unwrap();
        assert_eq!(client.get_session().await.unwrap(), None);
    }

    #[test]
    fn invalid_header_is_a_configuration_error() {
        let mut p = params();
        p.anon_key = "bad\nkey".to_string();
        let err = GoTrueClient::new(p, Arc::new(MemoryStorage::default())).err().unwrap();
        assert!(matches!(err, BridgeError::Configuration(_)));
    }

    #[test]
    fn endpoints_join_cleanly() {
        let mut p = params();
        p.url = "https://abcd.supabase.co/".to_string();
        let client = GoTrueClient::new(p, Arc::new(MemoryStorage::default())).unwrap();
        assert_eq!(client.endpoint("logout"), "https://abcd.supabase.co/auth/v1/logout");
    }

    fn expired_session() -> serde_json::Value {
        serde_json::json!({
            "access_token": "old-access",
            "refresh_token": "old-refresh",
            "expires_at": 1,
        })
    }

    fn client_for(server: &MockServer, session: serde_json::Value) -> (GoTrueClient, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::default());
        stored(&storage, session);
        let mut p = params();
        p.url = server.uri();
        (GoTrueClient::new(p, storage.clone()).unwrap(), storage)
    }

    fn refresh_request() -> wiremock::MockBuilder {
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(header("apikey", "anon"))
            .and(header("x-client-info", "test@0.0.0"))
            .and(body_json(serde_json::json!({ "refresh_token": "old-refresh" })))
    }

    #[tokio::test]
    async fn refresh_stores_new_session() {
        let server = MockServer::start().await;
        refresh_request()
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": 3600,
                "token_type": "bearer",
            })))
            .expect(1)
            .mount(&server)
            .await;
        let (client, storage) = client_for(&server, expired_session());

        let before = now_secs();
        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.access_token, "new-access");
        assert!(session.expires_at.unwrap() >= before + 3600);

        let stored: Session = serde_json::from_str(&storage.get_item("sb").unwrap()).unwrap();
        assert_eq!(stored, session);
    }

    #[tokio::test]
    async fn huge_expires_in_saturates() {
        let server = MockServer::start().await;
        refresh_request()
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "new-access",
                "refresh_token": "new-refresh",
                "expires_in": u64::MAX,
            })))
            .mount(&server)
            .await;
        let (client, _storage) = client_for(&server, expired_session());

        let session = client.get_session().await.unwrap().unwrap();
        assert_eq!(session.expires_at, Some(u64::MAX));
        assert!(!session.is_expired_at(now_secs(), EXPIRY_MARGIN_SECS));
    }

    #[tokio::test]
    async fn rejected_refresh_clears_session() {
        for status in [400, 401] {
            let server = MockServer::start().await;
            refresh_request()
                .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                    "error": "invalid_grant",
                })))
                .expect(1)
                .mount(&server)
                .await;
            let (client, storage) = client_for(&server, expired_session());

            assert_eq!(client.get_session().await.unwrap(), None);
            assert_eq!(storage.get_item("sb"), None);
        }
    }

    #[tokio::test]
    async fn server_error_is_upstream_and_keeps_session() {
        let server = MockServer::start().await;
        refresh_request()
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        let (client, storage) = client_for(&server, expired_session());

        let err = client.get_session().await.unwrap_err();
        assert!(matches!(err, BridgeError::Upstream(_)));
        assert!(storage.get_item("sb").is_some());
    }

    #[tokio::test]
    async fn sign_out_revokes_then_clears() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .and(header("authorization", "Bearer a"))
            .and(header("apikey", "anon"))
            .and(header("x-client-info", "test@0.0.0"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        let session = serde_json::json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_at": now_secs() + 3600,
        });
        let (client, storage) = client_for(&server, session);

        client.sign_out().await.unwrap();
        assert_eq!(storage.get_item("sb"), None);
    }

    #[tokio::test]
    async fn sign_out_clears_even_when_revoke_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let session = serde_json::json!({ "access_token": "a", "refresh_token": "r" });
        let (client, storage) = client_for(&server, session);

        client.sign_out().await.unwrap();
        assert_eq!(storage.get_item("sb"), None);
    }
}
