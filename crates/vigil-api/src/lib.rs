//! Async client for the remote variable store backing a vigil security panel.
//!
//! The store exposes one named variable slot per panel signal (`state`,
//! `method`, `sensor`), authenticated with a short-lived bearer token that
//! is minted from a fixed API key and renewed reactively on 401/403.
//! `vigil-core` builds the state model, polling loop, and command facade
//! on top of this crate.

pub mod client;
pub mod error;
pub mod token;
pub mod transport;

pub use client::{LastValue, MAX_AUTH_ATTEMPTS, PanelClient, ValueReading};
pub use error::Error;
pub use token::{MemoryTokenStore, TokenManager, TokenStore};
pub use transport::{AssumeConnected, Connectivity, TransportConfig};
