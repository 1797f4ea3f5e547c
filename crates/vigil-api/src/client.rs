// Variable-store HTTP client.
//
// Wraps `reqwest::Client` with panel-specific URL construction, the
// `{"value": ...}` wire format, and a bounded refresh-and-retry protocol
// around auth rejections. Each logical operation makes at most
// MAX_AUTH_ATTEMPTS HTTP attempts with at most one token renewal between
// them -- an explicit loop, so the retry bound is a visible constant.

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::token::TokenManager;
use crate::transport::{Connectivity, TransportConfig};

/// Header carrying the bearer token on data requests.
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Maximum HTTP attempts per logical operation: the original request plus
/// one retry after a token renewal. A 401/403 on the retried attempt is
/// terminal.
pub const MAX_AUTH_ATTEMPTS: u32 = 2;

/// A variable read: the device's last heartbeat plus the latest value.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueReading {
    /// Epoch millis of the device's most recent activity on this variable.
    pub last_activity: i64,
    pub last_value: LastValue,
}

/// The latest datapoint recorded for a variable.
#[derive(Debug, Clone, Deserialize)]
pub struct LastValue {
    pub timestamp: i64,
    pub value: f64,
}

#[derive(Serialize)]
struct SendValueBody {
    value: f64,
}

/// Outcome of a single HTTP attempt, before auth-retry classification.
enum Attempt<T> {
    Granted(T),
    AuthRejected,
}

/// Raw client for one device's variable slots on the remote store.
///
/// Stateless beyond its handles: the bearer token lives in the shared
/// [`TokenManager`], which this client drives reactively -- a 401/403
/// triggers one renewal and one retry, nothing more.
pub struct PanelClient {
    http: reqwest::Client,
    base_url: Url,
    device_label: String,
    tokens: Arc<TokenManager>,
    connectivity: Arc<dyn Connectivity>,
}

impl PanelClient {
    /// Create a client for `device_label` on the store at `base_url`.
    pub fn new(
        base_url: Url,
        device_label: impl Into<String>,
        tokens: Arc<TokenManager>,
        connectivity: Arc<dyn Connectivity>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            device_label: device_label.into(),
            tokens,
            connectivity,
        })
    }

    /// The shared token manager.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/devices/{device}/{label}/` -- latest value read.
    fn value_url(&self, label: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/devices/{}/{label}/", self.device_label)
    }

    /// `{base}/devices/{device}/{label}/values/` -- datapoint write.
    fn values_url(&self, label: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/devices/{}/{label}/values/", self.device_label)
    }

    // ── Data operations ──────────────────────────────────────────────

    /// Read the latest value of a variable label.
    pub async fn get_value(&self, label: &str) -> Result<ValueReading, Error> {
        if !self.connectivity.is_connected() {
            return Err(Error::Network);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.get_value_once(label).await? {
                Attempt::Granted(reading) => return Ok(reading),
                Attempt::AuthRejected => {
                    if attempt >= MAX_AUTH_ATTEMPTS {
                        return Err(Error::server("credential rejected after token refresh"));
                    }
                    self.refresh_token(label).await?;
                }
            }
        }
    }

    /// Write a datapoint to a variable label.
    pub async fn send_value(&self, label: &str, value: f64) -> Result<(), Error> {
        if !self.connectivity.is_connected() {
            return Err(Error::Network);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_value_once(label, value).await? {
                Attempt::Granted(()) => return Ok(()),
                Attempt::AuthRejected => {
                    if attempt >= MAX_AUTH_ATTEMPTS {
                        return Err(Error::server("credential rejected after token refresh"));
                    }
                    self.refresh_token(label).await?;
                }
            }
        }
    }

    // ── Single attempts ──────────────────────────────────────────────

    /// Renew the bearer token between attempts.
    ///
    /// Any renewal failure -- including a connectivity drop mid-operation --
    /// surfaces as a server error on the data operation, matching the
    /// coarse taxonomy callers branch on.
    async fn refresh_token(&self, label: &str) -> Result<(), Error> {
        debug!(label, "credential rejected -- renewing bearer token");
        match self.tokens.create_token().await {
            Ok(()) => Ok(()),
            Err(Error::Network) => Err(Error::server("token refresh failed: no connectivity")),
            Err(err @ Error::Server { .. }) => Err(err),
        }
    }

    async fn get_value_once(&self, label: &str) -> Result<Attempt<ValueReading>, Error> {
        let url = self.value_url(label);
        debug!("GET {url}");

        let mut req = self.http.get(&url);
        if let Some(token) = self.tokens.current() {
            req = req.header(AUTH_TOKEN_HEADER, token.expose_secret());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::server(format!("value read failed: {e}")))?;

        match resp.status() {
            StatusCode::OK => {
                let reading: ValueReading = resp
                    .json()
                    .await
                    .map_err(|e| Error::server(format!("malformed value response: {e}")))?;
                Ok(Attempt::Granted(reading))
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(Attempt::AuthRejected),
            status => Err(Error::server(format!("value read rejected (HTTP {status})"))),
        }
    }

    async fn send_value_once(&self, label: &str, value: f64) -> Result<Attempt<()>, Error> {
        let url = self.values_url(label);
        debug!("POST {url}");

        let mut req = self.http.post(&url).json(&SendValueBody { value });
        if let Some(token) = self.tokens.current() {
            req = req.header(AUTH_TOKEN_HEADER, token.expose_secret());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::server(format!("value write failed: {e}")))?;

        match resp.status() {
            StatusCode::CREATED => Ok(Attempt::Granted(())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(Attempt::AuthRejected),
            status => Err(Error::server(format!("value write rejected (HTTP {status})"))),
        }
    }
}

impl std::fmt::Debug for PanelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelClient")
            .field("base_url", &self.base_url.as_str())
            .field("device_label", &self.device_label)
            .finish_non_exhaustive()
    }
}
