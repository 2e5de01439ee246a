//! crates/snapsolve_core/src/session.rs
//!
//! The pure state machine behind a single solve attempt.
//!
//! The machine knows nothing about sockets or timers. The driver feeds it
//! `TransportEvent`s one at a time and carries out the returned `Effect`.

use crate::domain::SolvePhase;

/// The in-band sentinel that ends a successful stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Prefix of a server-reported failure frame.
pub const ERROR_PREFIX: &str = "ERROR";

/// Fixed prompt shown for failures the user can only fix by retrying.
pub const RETRY_PROMPT: &str = "Something went wrong while solving. Please retake the photo and try again.";

//=========================================================================================
// Errors
//=========================================================================================

/// Why a solve attempt ended in the `Error` phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error("No image")]
    NoImage,
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("Unsupported image format")]
    UnsupportedImageFormat,
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("No data received from the solver before the stall timeout")]
    StreamStalled,
    #[error("Server reported an error: {0}")]
    ServerReported(String),
    #[error("Session cancelled")]
    Cancelled,
}

impl SolveError {
    /// The text shown to the user in place of a solution.
    ///
    /// Server-reported errors are shown verbatim; everything else maps to a
    /// fixed message that never leaks internal details.
    pub fn user_message(&self) -> String {
        match self {
            SolveError::NoImage => "No image".to_string(),
            SolveError::NotAuthenticated => {
                "Sign-in required. Please sign in and try again.".to_string()
            }
            SolveError::UnsupportedImageFormat => {
                "Unsupported image format. Please retake the photo and try again.".to_string()
            }
            SolveError::ServerReported(text) => text.clone(),
            SolveError::Transport(_) | SolveError::StreamStalled | SolveError::Cancelled => {
                RETRY_PROMPT.to_string()
            }
        }
    }
}

//=========================================================================================
// Events and Effects
//=========================================================================================

/// Everything the transport can tell the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Fragment(String),
    Failed(String),
    Closed,
}

/// Work the driver must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    SendRequest,
    CloseTransport,
}

//=========================================================================================
// The Machine
//=========================================================================================

/// State of one solve attempt: phase, append-only solution buffer, failure.
#[derive(Debug, Clone)]
pub struct SolveMachine {
    phase: SolvePhase,
    buffer: String,
    failure: Option<SolveError>,
}

impl Default for SolveMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SolveMachine {
    pub fn new() -> Self {
        Self {
            phase: SolvePhase::Idle,
            buffer: String::new(),
            failure: None,
        }
    }

    pub fn phase(&self) -> SolvePhase {
        self.phase
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn failure(&self) -> Option<&SolveError> {
        self.failure.as_ref()
    }

    /// `Idle -> Connecting`. Any other phase is left untouched.
    pub fn begin_connecting(&mut self) {
        if self.phase == SolvePhase::Idle {
            self.phase = SolvePhase::Connecting;
        }
    }

    /// `Sending -> Streaming`, once the solve request is on the wire.
    pub fn request_sent(&mut self) {
        if self.phase == SolvePhase::Sending {
            self.phase = SolvePhase::Streaming;
        }
    }

    /// Moves a non-terminal session to `Error`. Returns `false` if the session
    /// had already finished, in which case nothing changes.
    pub fn fail(&mut self, error: SolveError) -> bool {
        if self.phase.is_terminal() {
            return false;
        }
        self.phase = SolvePhase::Error;
        self.failure = Some(error);
        true
    }

    /// Drops the accumulated solution text (used on teardown).
    pub fn discard_text(&mut self) {
        self.buffer.clear();
    }

    /// The single transition function for transport events.
    pub fn handle(&mut self, event: TransportEvent) -> Effect {
        if self.phase.is_terminal() {
            return Effect::None;
        }

        match event {
            TransportEvent::Opened => {
                if self.phase == SolvePhase::Connecting {
                    self.phase = SolvePhase::Sending;
                    Effect::SendRequest
                } else {
                    Effect::None
                }
            }
            TransportEvent::Fragment(text) => self.handle_fragment(text),
            TransportEvent::Failed(reason) => {
                self.fail(SolveError::Transport(reason));
                Effect::CloseTransport
            }
            TransportEvent::Closed => {
                self.fail(SolveError::Transport("connection closed by peer".to_string()));
                Effect::CloseTransport
            }
        }
    }

    fn handle_fragment(&mut self, text: String) -> Effect {
        // Frames can only arrive once the connection is open.
        if !matches!(self.phase, SolvePhase::Sending | SolvePhase::Streaming) {
            return Effect::None;
        }
        self.phase = SolvePhase::Streaming;

        if text.contains(DONE_MARKER) {
            self.phase = SolvePhase::Done;
            return Effect::CloseTransport;
        }

        if text.starts_with(ERROR_PREFIX) {
            self.buffer = text.clone();
            self.fail(SolveError::ServerReported(text));
            return Effect::CloseTransport;
        }

        self.buffer.push_str(&text);
        Effect::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn streaming() -> SolveMachine {
        let mut machine = SolveMachine::new();
        machine.begin_connecting();
        assert_eq!(machine.handle(TransportEvent::Opened), Effect::SendRequest);
        machine.request_sent();
        assert_eq!(machine.phase(), SolvePhase::Streaming);
        machine
    }

    #[test]
    fn phases_advance_in_order() {
        let mut machine = SolveMachine::new();
        assert_eq!(machine.phase(), SolvePhase::Idle);
        machine.begin_connecting();
        assert_eq!(machine.phase(), SolvePhase::Connecting);
        machine.handle(TransportEvent::Opened);
        assert_eq!(machine.phase(), SolvePhase::Sending);
        machine.request_sent();
        assert_eq!(machine.phase(), SolvePhase::Streaming);
    }

    #[test]
    fn fragments_are_appended_in_arrival_order() {
        let mut machine = streaming();
        for part in ["The ", "answer ", "is $x=2$", ""] {
            assert_eq!(machine.handle(TransportEvent::Fragment(part.into())), Effect::None);
        }
        assert_eq!(machine.text(), "The answer is $x=2$");
        assert_eq!(machine.phase(), SolvePhase::Streaming);
    }

    #[test]
    fn done_marker_finishes_without_appending() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("a".into()));
        machine.handle(TransportEvent::Fragment("b".into()));
        let effect = machine.handle(TransportEvent::Fragment("tail [DONE]".into()));
        assert_eq!(effect, Effect::CloseTransport);
        assert_eq!(machine.phase(), SolvePhase::Done);
        assert_eq!(machine.text(), "ab");
        assert!(machine.failure().is_none());
    }

    #[test]
    fn error_frame_replaces_buffer() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("partial work".into()));
        let effect = machine.handle(TransportEvent::Fragment("ERROR: out of credits".into()));
        assert_eq!(effect, Effect::CloseTransport);
        assert_eq!(machine.phase(), SolvePhase::Error);
        assert_eq!(machine.text(), "ERROR: out of credits");
        assert_eq!(
            machine.failure(),
            Some(&SolveError::ServerReported("ERROR: out of credits".into()))
        );
    }

    #[test]
    fn done_takes_priority_over_error_prefix() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("ERROR but [DONE]".into()));
        assert_eq!(machine.phase(), SolvePhase::Done);
        assert_eq!(machine.text(), "");
    }

    #[test]
    fn error_must_be_a_prefix() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("no ERROR here".into()));
        assert_eq!(machine.phase(), SolvePhase::Streaming);
        assert_eq!(machine.text(), "no ERROR here");
    }

    #[test]
    fn peer_close_while_streaming_is_an_error() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("half".into()));
        assert_eq!(machine.handle(TransportEvent::Closed), Effect::CloseTransport);
        assert_eq!(machine.phase(), SolvePhase::Error);
        assert!(matches!(machine.failure(), Some(SolveError::Transport(_))));
    }

    #[test]
    fn events_after_terminal_state_are_ignored() {
        let mut machine = streaming();
        machine.handle(TransportEvent::Fragment("[DONE]".into()));
        assert_eq!(machine.handle(TransportEvent::Closed), Effect::None);
        assert_eq!(machine.handle(TransportEvent::Fragment("late".into())), Effect::None);
        assert_eq!(machine.phase(), SolvePhase::Done);
        assert!(!machine.fail(SolveError::Cancelled));
        assert_eq!(machine.phase(), SolvePhase::Done);
    }

    #[test]
    fn fragments_before_open_are_dropped() {
        let mut machine = SolveMachine::new();
        machine.begin_connecting();
        assert_eq!(machine.handle(TransportEvent::Fragment("early".into())), Effect::None);
        assert_eq!(machine.text(), "");
        assert_eq!(machine.phase(), SolvePhase::Connecting);
    }

    #[test]
    fn failure_from_connecting() {
        let mut machine = SolveMachine::new();
        machine.begin_connecting();
        assert!(machine.fail(SolveError::NoImage));
        assert_eq!(machine.phase(), SolvePhase::Error);
        assert_eq!(machine.failure().map(|e| e.user_message()), Some("No image".to_string()));
    }

    #[test]
    fn server_errors_are_shown_verbatim() {
        let err = SolveError::ServerReported("ERROR quota".into());
        assert_eq!(err.user_message(), "ERROR quota");
        assert_eq!(SolveError::Transport("reset".into()).user_message(), RETRY_PROMPT);
    }
}
