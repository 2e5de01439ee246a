//! crates/snapsolve_core/src/domain.rs
//!
//! Defines the pure, core data structures for the solve client.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A bearer access/refresh token pair issued by the auth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Profile of the signed-in user, as returned by the identity-provider login.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub credits: i64,
    pub subscription_expires_at: Option<DateTime<Utc>>,
}

/// The result of a successful token exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    // Only the identity-provider exchange returns a profile.
    pub user: Option<UserInfo>,
}

/// A captured photo as a base64 string, possibly carrying a `data:` URL prefix.
///
/// Deliberately not `Clone`: a captured image is handed from the capture flow
/// to exactly one solve session by move.
#[derive(Debug, PartialEq, Eq)]
pub struct CapturedImage(String);

impl CapturedImage {
    pub fn new(base64: impl Into<String>) -> Self {
        Self(base64.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// A filesystem reference to a captured photo, used when the camera did not
/// hand back an in-memory payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef(pub PathBuf);

/// The phase of a single solve attempt. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolvePhase {
    Idle,
    Connecting,
    Sending,
    Streaming,
    Done,
    Error,
}

impl SolvePhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SolvePhase::Done | SolvePhase::Error)
    }
}

/// How a math span is typeset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Inline,
    Block,
}

/// One piece of a rendered solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Literal text, kept verbatim (escaping happens at display time).
    Text(String),
    /// A LaTeX expression with its delimiters removed.
    Math { expression: String, mode: DisplayMode },
}

/// The displayable form of the solution text, derived from the whole buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedDocument {
    pub segments: Vec<Segment>,
}

impl RenderedDocument {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of math spans in the document.
    pub fn math_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| matches!(s, Segment::Math { .. }))
            .count()
    }
}
