//! crates/snapsolve_core/src/ports.rs
//!
//! Defines the service contracts (traits) the solve client depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific HTTP, WebSocket, filesystem or typesetting libraries.

use crate::domain::{CapturedImage, DisplayMode, ImageRef, LoginOutcome, TokenPair};
use crate::session::TransportEvent;
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, WebSocket).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Timed out")]
    Timeout,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure to typeset a single math span.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to typeset `{source_tex}`: {reason}")]
pub struct MathRenderError {
    pub source_tex: String,
    pub reason: String,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The token-exchange endpoints of the solving service.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Exchanges an identity-provider ID token for a token pair and profile.
    async fn exchange_provider_token(&self, id_token: &str) -> PortResult<LoginOutcome>;

    /// Exchanges a test e-mail for a token pair (non-production bypass).
    async fn exchange_test_credential(&self, email: &str) -> PortResult<TokenPair>;

    /// Trades a refresh token for a fresh access token.
    async fn refresh(&self, refresh_token: &str) -> PortResult<String>;
}

/// Opens authenticated solve streams.
#[async_trait]
pub trait SolveConnector: Send + Sync {
    /// Opens a stream authenticated with `access_token`.
    ///
    /// Returns `PortError::Unauthorized` when the service rejects the token
    /// during the handshake.
    async fn connect(&self, access_token: &str) -> PortResult<Box<dyn SolveTransport>>;
}

/// One open, duplex solve stream.
#[async_trait]
pub trait SolveTransport: Send {
    /// Sends one text frame.
    async fn send_text(&mut self, text: String) -> PortResult<()>;

    /// Waits for the next event. Once the stream has ended this keeps
    /// returning `TransportEvent::Closed`.
    async fn next_event(&mut self) -> TransportEvent;

    /// Closes the stream. Closing an already-closed stream is a no-op.
    async fn close(&mut self) -> PortResult<()>;
}

/// Resolves a filesystem image reference to a base64 payload.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, reference: &ImageRef) -> PortResult<CapturedImage>;
}

/// Converts a LaTeX expression into display markup.
pub trait MathTypesetter: Send + Sync {
    fn typeset(&self, tex: &str, mode: DisplayMode) -> Result<String, MathRenderError>;
}
