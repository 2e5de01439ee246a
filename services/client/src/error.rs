//! services/client/src/error.rs
//!
//! Defines the error types for the client service.

use crate::config::ConfigError;
use snapsolve_core::ports::PortError;
use snapsolve_core::session::SolveError;

/// Errors raised by the auth gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// A login exchange returned a non-success status or an unreadable body.
    #[error("Token exchange failed (status {status:?}): {body}")]
    AuthExchangeFailed { status: Option<u16>, body: String },

    /// The refresh endpoint refused the stored refresh token.
    #[error("Token refresh failed (status {status:?})")]
    RefreshFailed { status: Option<u16> },

    #[error("No refresh token stored")]
    NoRefreshToken,

    #[error("Not authenticated")]
    NotAuthenticated,
}

impl AuthError {
    /// Auth failures never show raw details to the user.
    pub fn user_message(&self) -> &'static str {
        "Sign-in failed. Please try again."
    }
}

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Solve error: {0}")]
    Solve(#[from] SolveError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error building the underlying HTTP client.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
