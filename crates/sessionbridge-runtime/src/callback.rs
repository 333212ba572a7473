use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sessionbridge_adapters::CookieJar;
use sessionbridge_api::{BridgeError, Session, SessionStorage};
use sessionbridge_core::{BridgeConfig, is_secure_host};

use crate::storage::CookieStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthChangeEvent {
    InitialSession,
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
    PasswordRecovery,
    MfaChallengeVerified,
}

/// Auth state change posted by the browser-side client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCallback {
    pub event: AuthChangeEvent,
    #[serde(default)]
    pub session: Option<Session>,
}

/// Mirror a browser-side auth state change into the session cookie.
pub fn handle_auth_callback<J>(
    jar: Arc<J>,
    config: &BridgeConfig,
    payload: AuthCallback,
) -> Result<(), BridgeError>
where
    J: CookieJar + 'static,
{
    config.validate()?;

    let key = config.storage_key();
    let secure_default = config
        .cookie
        .secure
        .unwrap_or_else(|| is_secure_host(jar.get_request_header("host").as_deref()));
    let storage = CookieStorage::new(jar, config.cookie.resolve(secure_default));

    match payload.event {
        AuthChangeEvent::SignedIn | AuthChangeEvent::TokenRefreshed | AuthChangeEvent::UserUpdated => {
            let session = payload.session.ok_or_else(|| {
                BridgeError::Unauthenticated(format!("{:?} callback without a session", payload.event))
            })?;
            let json = serde_json::to_string(&session)
                .map_err(|e| BridgeError::Unauthenticated(format!("unserializable session: {e}")))?;
            storage.set_item(&key, &json);
            tracing::debug!(event = ?payload.event, storage_key = %key, "stored session from callback");
        }
        AuthChangeEvent::SignedOut => {
            storage.remove_item(&key);
            tracing::debug!(storage_key = %key, "cleared session from callback");
        }
        other => {
            tracing::debug!(event = ?other, "ignoring auth callback event");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingJar, config, session};
    use sessionbridge_cookie::join_chunks;

    fn payload(json: serde_json::Value) -> AuthCallback {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn signed_in_writes_session_cookie() {
        let current = session(3600);
        let jar = Arc::new(CountingJar::new(""));
        let body = payload(serde_json::json!({ "event": "SIGNED_IN", "session": current }));

        handle_auth_callback(jar.clone(), &config(), body).unwrap();

        let directives = jar.inner().set_cookie_headers();
        assert_eq!(directives.len(), 1);
        let pair = directives[0].split(';').next().unwrap();
        let (name, value) = pair.split_once('=').unwrap();
        assert_eq!(name, "sb-abcd-auth-token");
        let stored = join_chunks(name, |_| Some(value.to_string())).unwrap();
        assert_eq!(serde_json::from_str::<Session>(&stored).unwrap(), current);
    }

    #[test]
    fn signed_out_clears_cookie() {
        let jar = Arc::new(CountingJar::new("sb-abcd-auth-token=stale"));
        let body = payload(serde_json::json!({ "event": "SIGNED_OUT", "session": null }));

        handle_auth_callback(jar.clone(), &config(), body).unwrap();

        let directives = jar.inner().set_cookie_headers();
        assert_eq!(directives.len(), 1);
        assert!(directives[0].contains("Max-Age=0"));
    }

    #[test]
    fn sign_in_without_session_is_rejected() {
        let jar = Arc::new(CountingJar::new(""));
        let body = payload(serde_json::json!({ "event": "TOKEN_REFRESHED" }));

        let err = handle_auth_callback(jar.clone(), &config(), body).unwrap_err();
        assert!(matches!(err, BridgeError::Unauthenticated(_)));
        assert_eq!(jar.writes(), 0);
    }

    #[test]
    fn other_events_are_ignored() {
        let jar = Arc::new(CountingJar::new(""));
        let body = payload(serde_json::json!({ "event": "PASSWORD_RECOVERY" }));

        handle_auth_callback(jar.clone(), &config(), body).unwrap();
        assert_eq!(jar.writes(), 0);
    }
}
