//! Configuration for the vigil CLI.
//!
//! TOML settings file merged with environment overrides, API-key
//! resolution (env + keyring + plaintext), and the keyring-backed
//! [`TokenStore`] that persists the short-lived bearer token across runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use vigil_api::TokenStore;

const KEYRING_SERVICE: &str = "vigil";
const KEYRING_TOKEN_USER: &str = "panel-token";
const KEYRING_API_KEY_USER: &str = "api-key";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API key configured (set VIGIL_API_KEY, the keyring, or api_key in the config file)")]
    NoApiKey,

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Top-level TOML settings.
#[derive(Debug, Deserialize, Serialize)]
pub struct Settings {
    /// Variable-store base URL.
    #[serde(default = "default_server")]
    pub server: String,

    /// Device label the panel's variables live under.
    #[serde(default = "default_device")]
    pub device: String,

    /// API key (plaintext -- prefer keyring or VIGIL_API_KEY).
    pub api_key: Option<String>,

    /// Background poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: default_server(),
            device: default_device(),
            api_key: None,
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_server() -> String {
    "https://industrial.api.ubidots.com/api/v1.6".into()
}
fn default_device() -> String {
    "securino".into()
}
fn default_poll_interval() -> u64 {
    120
}
fn default_timeout() -> u64 {
    30
}

impl Settings {
    /// The server URL, validated.
    pub fn server_url(&self) -> Result<Url, ConfigError> {
        self.server.parse().map_err(|_| ConfigError::Validation {
            field: "server".into(),
            reason: format!("invalid URL: {}", self.server),
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve the API key from the credential chain.
    ///
    /// Order: `VIGIL_API_KEY` env var, system keyring, plaintext
    /// `api_key` in the settings file.
    pub fn api_key(&self) -> Result<SecretString, ConfigError> {
        if let Ok(val) = std::env::var("VIGIL_API_KEY") {
            return Ok(SecretString::from(val));
        }

        if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_API_KEY_USER) {
            if let Ok(secret) = entry.get_password() {
                return Ok(SecretString::from(secret));
            }
        }

        if let Some(ref key) = self.api_key {
            return Ok(SecretString::from(key.clone()));
        }

        Err(ConfigError::NoApiKey)
    }
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "vigil", "vigil").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("vigil");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from the canonical path + environment.
pub fn load() -> Result<Settings, ConfigError> {
    load_from(&config_path())
}

/// Load settings from an explicit file + environment.
pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("VIGIL_").ignore(&["api_key"]));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

// ── Token persistence ───────────────────────────────────────────────

/// [`TokenStore`] backed by the system keyring.
///
/// Persistence failures are logged and swallowed: a token that fails to
/// save just gets re-minted on the next rejected request, and a token
/// that fails to load is indistinguishable from one never stored.
#[derive(Debug, Default)]
pub struct KeyringTokenStore;

impl TokenStore for KeyringTokenStore {
    fn load(&self) -> Option<SecretString> {
        let entry = match keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_USER) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "keyring unavailable, skipping token load");
                return None;
            }
        };
        match entry.get_password() {
            Ok(token) => Some(SecretString::from(token)),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, "failed to load persisted token");
                None
            }
        }
    }

    fn save(&self, token: &SecretString) {
        let entry = match keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_USER) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "keyring unavailable, token not persisted");
                return;
            }
        };
        match entry.set_password(token.expose_secret()) {
            Ok(()) => debug!("bearer token persisted to keyring"),
            Err(e) => warn!(error = %e, "failed to persist bearer token"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(settings.server, "https://industrial.api.ubidots.com/api/v1.6");
        assert_eq!(settings.device, "securino");
        assert_eq!(settings.poll_interval_secs, 120);
        assert_eq!(settings.timeout_secs, 30);
        assert_eq!(settings.api_key, None);
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "device = \"cabin\"\npoll_interval_secs = 60").unwrap();

        let settings = load_from(&path).unwrap();
        assert_eq!(settings.device, "cabin");
        assert_eq!(settings.poll_interval_secs, 60);
        // Untouched keys keep their defaults.
        assert_eq!(settings.timeout_secs, 30);
    }

    #[test]
    fn server_url_validation() {
        let settings = Settings {
            server: "not a url".into(),
            ..Settings::default()
        };
        assert!(matches!(
            settings.server_url(),
            Err(ConfigError::Validation { .. })
        ));

        let settings = Settings::default();
        let url = settings.server_url().unwrap();
        assert_eq!(url.host_str(), Some("industrial.api.ubidots.com"));
    }
}
