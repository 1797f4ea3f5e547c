// Bearer token lifecycle.
//
// The remote store issues short-lived bearer tokens in exchange for a fixed
// API key. Renewal is reactive only: nothing here runs in the background,
// a new token is minted when a data request comes back 401/403 and the
// client asks for one.

use std::sync::{Arc, Mutex, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::Connectivity;

/// Header carrying the fixed API key on token-creation requests.
const API_KEY_HEADER: &str = "x-ubidots-apikey";

/// Persistence seam for the bearer token.
///
/// `load` runs once at startup; `save` after every successful token
/// creation. Persistence failures are tolerated -- a lost token only means
/// the next data request gets rejected and triggers a fresh exchange -- so
/// `save` is infallible at the trait boundary and implementations log
/// their own errors.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<SecretString>;
    fn save(&self, token: &SecretString);
}

/// In-memory token store for tests and keyring-less environments.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<SecretString>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<SecretString> {
        match self.slot.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }

    fn save(&self, token: &SecretString) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(token.clone());
        }
    }
}

/// Owns the current bearer token and its renewal.
///
/// Invariant: at most one token value is current at a time. `create_token`
/// replaces the slot under a write lock before returning, so a request
/// retried after renewal always observes the fresh value.
pub struct TokenManager {
    http: reqwest::Client,
    base_url: Url,
    api_key: SecretString,
    store: Arc<dyn TokenStore>,
    connectivity: Arc<dyn Connectivity>,
    current: RwLock<Option<SecretString>>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

impl TokenManager {
    pub fn new(
        http: reqwest::Client,
        base_url: Url,
        api_key: SecretString,
        store: Arc<dyn TokenStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            http,
            base_url,
            api_key,
            store,
            connectivity,
            current: RwLock::new(None),
        }
    }

    /// Load a previously persisted token into the current slot.
    ///
    /// No network call. An absent or unreadable token is fine -- the next
    /// data request will be rejected and mint a new one.
    pub fn load_persisted(&self) {
        match self.store.load() {
            Some(token) => {
                debug!("loaded persisted bearer token");
                *self.current.write().expect("token lock poisoned") = Some(token);
            }
            None => debug!("no persisted bearer token"),
        }
    }

    /// The current bearer token, if any.
    pub fn current(&self) -> Option<SecretString> {
        self.current.read().expect("token lock poisoned").clone()
    }

    /// Exchange the fixed API key for a fresh bearer token.
    ///
    /// `201 Created` stores the parsed token as current and persists it;
    /// any other status or transport fault is a server error. Checks
    /// connectivity first and fails with [`Error::Network`] without
    /// attempting the call when offline.
    pub async fn create_token(&self) -> Result<(), Error> {
        if !self.connectivity.is_connected() {
            return Err(Error::Network);
        }

        let base = self.base_url.as_str().trim_end_matches('/');
        let url = format!("{base}/auth/token/");
        debug!("POST {url}");

        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .body("")
            .send()
            .await
            .map_err(|e| Error::server(format!("token request failed: {e}")))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            return Err(Error::server(format!(
                "token request rejected (HTTP {status})"
            )));
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| Error::server(format!("malformed token response: {e}")))?;

        let token = SecretString::from(body.token);
        *self.current.write().expect("token lock poisoned") = Some(token.clone());
        self.store.save(&token);
        debug!("bearer token refreshed");
        Ok(())
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("base_url", &self.base_url.as_str())
            .field("has_token", &self.current().is_some())
            .finish_non_exhaustive()
    }
}
