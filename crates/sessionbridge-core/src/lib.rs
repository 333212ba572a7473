use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sessionbridge_api::BridgeError;
use sessionbridge_cookie::{CookieOptions, SameSite, is_cookie_name};

pub const URL_ENV_VARS: [&str; 2] = ["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"];
pub const ANON_KEY_ENV_VARS: [&str; 2] = ["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"];

const FALLBACK_STORAGE_KEY: &str = "sb-auth-token";

/// Caller overrides for session cookie attributes. Unset fields keep the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CookieConfig {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub same_site: Option<SameSite>,
    #[serde(default)]
    pub max_age_seconds: Option<u64>,
    #[serde(default)]
    pub secure: Option<bool>,
}

impl CookieConfig {
    /// Merge the overrides over `CookieOptions::default()`.
    ///
    /// `secure_default` applies when no `secure` override is set. `http_only` is always
    /// false so the browser-side client can read the session too.
    pub fn resolve(&self, secure_default: bool) -> CookieOptions {
        let defaults = CookieOptions::default();
        CookieOptions {
            domain: self.domain.clone().or(defaults.domain),
            path: self.path.clone().unwrap_or(defaults.path),
            max_age_seconds: self.max_age_seconds.or(defaults.max_age_seconds),
            expires: defaults.expires,
            http_only: false,
            secure: self.secure.unwrap_or(secure_default),
            same_site: self.same_site.or(defaults.same_site),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub url: String,
    pub anon_key: String,
    #[serde(default)]
    pub cookie: CookieConfig,
}

impl BridgeConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            cookie: CookieConfig::default(),
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: CookieConfig) -> Self {
        self.cookie = cookie;
        self
    }

    /// Check the connection parameters. Performs no I/O.
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.url.trim().is_empty() || self.anon_key.trim().is_empty() {
            return Err(BridgeError::Configuration(
                "url and anon_key are required to create an auth client".to_string(),
            ));
        }

        let parsed = url::Url::parse(self.url.trim())
            .map_err(|e| BridgeError::Configuration(format!("invalid url {:?}: {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BridgeError::Configuration(format!(
                "url must be http or https, got {}",
                parsed.scheme()
            )));
        }

        if let Some(name) = &self.cookie.name {
            if !is_cookie_name(name) {
                return Err(BridgeError::Configuration(format!(
                    "cookie name {name:?} is not a valid cookie token"
                )));
            }
        }

        Ok(())
    }

    /// Service URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim().trim_end_matches('/')
    }

    /// First DNS label of the service host, e.g. `abcd` for `https://abcd.supabase.co`.
    pub fn project_ref(&self) -> Option<String> {
        let parsed = url::Url::parse(self.url.trim()).ok()?;
        let host = parsed.host_str()?;
        host.split('.')
            .next()
            .filter(|label| !label.is_empty())
            .map(str::to_string)
    }

    /// Name of the session cookie (and storage key handed to the auth client).
    pub fn storage_key(&self) -> String {
        if let Some(name) = &self.cookie.name {
            return name.clone();
        }
        self.project_ref().map_or_else(
            || FALLBACK_STORAGE_KEY.to_string(),
            |r| format!("sb-{r}-auth-token"),
        )
    }

    /// Read connection parameters from the process environment.
    pub fn from_env() -> Result<Self, BridgeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read connection parameters through `lookup`, trying each known variable name in order.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BridgeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| lookup(k))
                .find(|v| !v.trim().is_empty())
        };

        let url = first(&URL_ENV_VARS[..]).ok_or_else(|| {
            BridgeError::Configuration(format!("{} is required", URL_ENV_VARS.join(" or ")))
        })?;
        let anon_key = first(&ANON_KEY_ENV_VARS[..]).ok_or_else(|| {
            BridgeError::Configuration(format!("{} is required", ANON_KEY_ENV_VARS.join(" or ")))
        })?;

        let config = Self::new(url, anon_key);
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, BridgeError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BridgeError::Configuration(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            BridgeError::Configuration(msg) => {
                BridgeError::Configuration(format!("{}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "loaded bridge config");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BridgeError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| BridgeError::Configuration(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

/// True if `host` (a `Host` header value, port allowed) names a non-local origin.
///
/// Cookies for `localhost` are written without `Secure` so plain-HTTP development works.
pub fn is_secure_host(host: Option<&str>) -> bool {
    let Some(host) = host.map(str::trim).filter(|h| !h.is_empty()) else {
        return true;
    };

    let hostname = if let Some(rest) = host.strip_prefix('[') {
        rest.split(']').next().unwrap_or(rest)
    } else {
        host.rsplit_once(':').map_or(host, |(h, _port)| h)
    };

    !matches!(
        hostname.to_ascii_lowercase().as_str(),
        "localhost" | "127.0.0.1" | "::1"
    )
}
