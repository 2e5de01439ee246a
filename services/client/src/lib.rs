//! services/client/src/lib.rs
//!
//! Embeddable client for the photo math solver: sign-in, capture handoff,
//! the streaming solve session and math-aware rendering of its output.

pub mod adapters;
pub mod config;
pub mod error;
pub mod flow;
pub mod telemetry;

pub use config::Config;
pub use error::{AuthError, ClientError};
pub use flow::{ClientState, SolveHandle, SolveSession, SolveSnapshot};
