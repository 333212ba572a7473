use std::collections::BTreeMap;
use std::sync::Arc;

use sessionbridge_adapters::CookieJar;
use sessionbridge_api::{
    AuthClient, AuthClientFactory, BridgeError, CLIENT_INFO_HEADER, ClientInfo, ClientParams,
    Session, SessionStorage,
};
use sessionbridge_core::{BridgeConfig, is_secure_host};

use crate::storage::CookieStorage;

/// Identity sent as `X-Client-Info` on every auth call, fixed at build time.
pub const CLIENT_INFO: ClientInfo =
    ClientInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

/// An auth client scoped to one request, persisting its session in that request's cookies.
pub struct SessionBridge<C> {
    client: C,
    storage_key: String,
}

impl<C: AuthClient> SessionBridge<C> {
    /// Build the request-scoped client.
    ///
    /// Configuration is validated before the jar is touched; a missing `url` or `anon_key`
    /// fails here, not on first use.
    pub fn new<F, J>(factory: &F, jar: Arc<J>, config: &BridgeConfig) -> Result<Self, BridgeError>
    where
        F: AuthClientFactory<Client = C> + ?Sized,
        J: CookieJar + 'static,
    {
        config.validate()?;

        let storage_key = config.storage_key();
        let secure_default = config
            .cookie
            .secure
            .unwrap_or_else(|| is_secure_host(jar.get_request_header("host").as_deref()));
        let options = config.cookie.resolve(secure_default);

        let storage: Arc<dyn SessionStorage> = Arc::new(CookieStorage::new(jar, options));
        let client = factory.build(client_params(config, &storage_key), storage)?;

        tracing::debug!(storage_key = %storage_key, secure = secure_default, "session bridge ready");
        Ok(Self {
            client,
            storage_key,
        })
    }

    /// Current session, as decided by the auth client.
    ///
    /// A refresh performed by the client writes the new session back through the jar.
    pub async fn get_session(&self) -> Result<Option<Session>, BridgeError> {
        self.client.get_session().await
    }

    pub async fn sign_out(&self) -> Result<(), BridgeError> {
        self.client.sign_out().await
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

/// Connection parameters handed to the auth client factory.
pub fn client_params(config: &BridgeConfig, storage_key: &str) -> ClientParams {
    ClientParams {
        url: config.base_url().to_string(),
        anon_key: config.anon_key.clone(),
        storage_key: storage_key.to_string(),
        global_headers: BTreeMap::from([(
            CLIENT_INFO_HEADER.to_string(),
            CLIENT_INFO.header_value(),
        )]),
    }
}
