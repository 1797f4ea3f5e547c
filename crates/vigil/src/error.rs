//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

use vigil_core::Error;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const NETWORK: i32 = 3;
    pub const SERVER: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("No network connectivity")]
    #[diagnostic(
        code(vigil::network),
        help("Check your internet connection and try again.")
    )]
    Network,

    #[error("Server error: {message}")]
    #[diagnostic(
        code(vigil::server),
        help("The variable store rejected the request. Retry, and verify your API key if it persists.")
    )]
    Server { message: String },

    #[error(transparent)]
    #[diagnostic(code(vigil::config))]
    Config(#[from] vigil_config::ConfigError),

    #[error("{0}")]
    #[diagnostic(code(vigil::general))]
    Other(String),
}

impl From<Error> for CliError {
    fn from(err: Error) -> Self {
        match err {
            Error::Network => Self::Network,
            Error::Server { message } => Self::Server { message },
        }
    }
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Network => exit_code::NETWORK,
            Self::Server { .. } => exit_code::SERVER,
            Self::Config(_) => exit_code::CONFIG,
            Self::Other(_) => exit_code::GENERAL,
        }
    }
}
