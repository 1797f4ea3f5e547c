// Shared transport configuration for building reqwest::Client instances.
//
// The token manager and the variable-store client share timeout and
// user-agent settings through this module.

use std::time::Duration;

use crate::error::Error;

/// Pre-flight connectivity probe.
///
/// Every remote operation checks connectivity before issuing a request;
/// an offline result short-circuits to [`Error::Network`] without touching
/// the network. Production uses [`AssumeConnected`] and lets the transport's
/// own failures classify as server errors; tests substitute a switchable probe.
pub trait Connectivity: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Default probe: always reports connectivity.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeConnected;

impl Connectivity for AssumeConnected {
    fn is_connected(&self) -> bool {
        true
    }
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::server(format!("failed to build HTTP client: {e}")))
    }
}
