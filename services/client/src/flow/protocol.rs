//! services/client/src/flow/protocol.rs
//!
//! Defines the messages the client sends on the solve stream.

use serde::Serialize;

//=========================================================================================
// Messages Sent FROM the Client TO the Solver
//=========================================================================================
// NOTE: The solver answers with plain text frames, not JSON. A frame containing
// `[DONE]` ends the stream and a frame starting with `ERROR` reports a failure;
// see `snapsolve_core::session`.
//=========================================================================================

/// Structured text messages the client can send to the solver.
#[derive(Serialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Asks the solver to solve the problem in a base64 PNG or JPEG image.
    /// This is the only message sent on a connection.
    Solve { image: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
