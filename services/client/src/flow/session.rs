//! services/client/src/flow/session.rs
//!
//! Drives one solve attempt: resolves the image and token, opens the stream,
//! sends the request, and feeds every stream event through the core
//! `SolveMachine`. Progress is published as `SolveSnapshot`s on a watch channel.

use crate::flow::gateway::AuthGateway;
use crate::flow::protocol::ClientMessage;
use crate::flow::staging::StagingBuffer;
use snapsolve_core::domain::{CapturedImage, ImageRef, RenderedDocument, SolvePhase};
use snapsolve_core::image::prepare_payload;
use snapsolve_core::ports::{ImageLoader, PortError, SolveConnector, SolveTransport};
use snapsolve_core::render::render;
use snapsolve_core::session::{Effect, SolveError, SolveMachine, TransportEvent};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

//=========================================================================================
// Snapshot (what the presentation layer sees)
//=========================================================================================

/// The state of a session after its latest transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveSnapshot {
    pub phase: SolvePhase,
    /// The raw solution buffer.
    pub text: String,
    /// `text`, split into plain and math segments.
    pub document: RenderedDocument,
    pub failure: Option<SolveError>,
}

impl SolveSnapshot {
    fn idle() -> Self {
        Self {
            phase: SolvePhase::Idle,
            text: String::new(),
            document: RenderedDocument::default(),
            failure: None,
        }
    }

    /// What to show in place of the solution: the failure message once the
    /// session has failed, the solution text otherwise.
    pub fn display_text(&self) -> String {
        match &self.failure {
            Some(failure) => failure.user_message(),
            None => self.text.clone(),
        }
    }
}

//=========================================================================================
// Dependencies and Handle
//=========================================================================================

/// The collaborators a session needs.
#[derive(Clone)]
pub struct SolveDeps {
    pub gateway: Arc<AuthGateway>,
    pub connector: Arc<dyn SolveConnector>,
    pub image_loader: Arc<dyn ImageLoader>,
    pub stall_timeout: Duration,
}

/// The owning screen's grip on a running session.
///
/// Dropping the handle tears the session down.
pub struct SolveHandle {
    id: Uuid,
    cancel: CancellationToken,
    updates: watch::Receiver<SolveSnapshot>,
    staging: Option<Arc<StagingBuffer>>,
}

impl SolveHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn snapshot(&self) -> SolveSnapshot {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SolveSnapshot> {
        self.updates.clone()
    }

    /// Waits for the next published snapshot. Returns `None` once the session
    /// has finished and no further updates can arrive.
    pub async fn changed(&mut self) -> Option<SolveSnapshot> {
        self.updates.changed().await.ok()?;
        Some(self.updates.borrow_and_update().clone())
    }

    /// Also clear `staging` when the session is torn down.
    pub fn clear_on_teardown(mut self, staging: Arc<StagingBuffer>) -> Self {
        self.staging = Some(staging);
        self
    }

    /// Cancels the session: the stream is closed and the image and solution
    /// text are discarded. Safe to call more than once.
    pub fn teardown(&self) {
        if let Some(staging) = &self.staging {
            staging.clear();
        }
        if !self.cancel.is_cancelled() {
            info!(session_id = %self.id, "Tearing down solve session");
            self.cancel.cancel();
        }
    }
}

impl Drop for SolveHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

//=========================================================================================
// The Session Driver
//=========================================================================================

pub struct SolveSession {
    id: Uuid,
    deps: SolveDeps,
    image: Option<CapturedImage>,
    fallback: Option<ImageRef>,
    machine: SolveMachine,
    transport: Option<Box<dyn SolveTransport>>,
    cancel: CancellationToken,
    updates: watch::Sender<SolveSnapshot>,
}

impl SolveSession {
    /// Creates a session for `image`, or for the file at `fallback` when the
    /// capture produced no in-memory payload.
    pub fn new(
        deps: SolveDeps,
        image: Option<CapturedImage>,
        fallback: Option<ImageRef>,
    ) -> (Self, SolveHandle) {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (updates, rx) = watch::channel(SolveSnapshot::idle());

        let session = Self {
            id,
            deps,
            image,
            fallback,
            machine: SolveMachine::new(),
            transport: None,
            cancel: cancel.clone(),
            updates,
        };
        let handle = SolveHandle {
            id,
            cancel,
            updates: rx,
            staging: None,
        };
        (session, handle)
    }

    /// Runs the attempt to completion and returns the final snapshot.
    pub async fn run(mut self) -> SolveSnapshot {
        info!(session_id = %self.id, "Solve session started");
        self.drive().await;
        self.close_transport().await;

        let last = self.snapshot();
        match &last.failure {
            None => info!(session_id = %self.id, chars = last.text.len(), "Solve session finished"),
            Some(failure) => warn!(session_id = %self.id, error = %failure, "Solve session failed"),
        }
        last
    }

    async fn drive(&mut self) {
        let cancel = self.cancel.clone();
        self.machine.begin_connecting();
        self.publish();

        // --- 1. Resolve and validate the image ---
        let Some(image) = or_cancel(&cancel, self.resolve_image()).await else {
            return self.cancelled().await;
        };
        let Some(image) = image else {
            return self.fail(SolveError::NoImage).await;
        };
        let payload = match prepare_payload(image) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Rejected captured image");
                return self.fail(SolveError::UnsupportedImageFormat).await;
            }
        };
        debug!(session_id = %self.id, format = payload.format().mime(), "Image payload validated");

        // --- 2. Authorize ---
        let token = match or_cancel(&cancel, self.deps.gateway.ensure_access_token()).await {
            None => return self.cancelled().await,
            Some(Ok(token)) => token,
            Some(Err(e)) => {
                warn!(session_id = %self.id, error = %e, "Could not authorize solve");
                return self.fail(SolveError::NotAuthenticated).await;
            }
        };

        // --- 3. Connect ---
        let transport = match or_cancel(&cancel, self.deps.connector.connect(&token)).await {
            None => return self.cancelled().await,
            Some(Ok(transport)) => transport,
            Some(Err(PortError::Unauthorized)) => {
                warn!(session_id = %self.id, "Solve stream rejected the access token");
                self.deps.gateway.invalidate_access_token();
                return self
                    .fail(SolveError::Transport("access token rejected".to_string()))
                    .await;
            }
            Some(Err(e)) => {
                error!(session_id = %self.id, error = %e, "Failed to open solve stream");
                return self.fail(SolveError::Transport(e.to_string())).await;
            }
        };
        self.transport = Some(transport);

        // --- 4. Send the one request ---
        if self.machine.handle(TransportEvent::Opened) == Effect::SendRequest {
            self.publish();
            let request = ClientMessage::Solve {
                image: payload.into_base64(),
            };
            let json = match request.to_json() {
                Ok(json) => json,
                Err(e) => return self.fail(SolveError::Transport(e.to_string())).await,
            };
            let Some(transport) = self.transport.as_mut() else {
                return self.fail(SolveError::Transport("stream lost".to_string())).await;
            };
            match or_cancel(&cancel, transport.send_text(json)).await {
                None => return self.cancelled().await,
                Some(Ok(())) => {}
                Some(Err(e)) => {
                    error!(session_id = %self.id, error = %e, "Failed to send solve request");
                    return self.fail(SolveError::Transport(e.to_string())).await;
                }
            }
            self.machine.request_sent();
            self.publish();
            info!(session_id = %self.id, "Solve request sent, streaming");
        }

        // --- 5. Stream ---
        let stall = self.deps.stall_timeout;
        while !self.machine.phase().is_terminal() {
            let Some(transport) = self.transport.as_mut() else {
                return self.fail(SolveError::Transport("stream lost".to_string())).await;
            };
            let next = tokio::time::timeout(stall, transport.next_event());
            let event = match or_cancel(&cancel, next).await {
                None => return self.cancelled().await,
                Some(Err(_elapsed)) => {
                    warn!(session_id = %self.id, timeout = ?stall, "Solve stream stalled");
                    return self.fail(SolveError::StreamStalled).await;
                }
                Some(Ok(event)) => event,
            };

            let effect = self.machine.handle(event);
            self.publish();
            if effect == Effect::CloseTransport {
                self.close_transport().await;
            }
        }
    }

    async fn resolve_image(&mut self) -> Option<CapturedImage> {
        if let Some(image) = self.image.take() {
            return Some(image);
        }
        let reference = self.fallback.take()?;
        match self.deps.image_loader.load(&reference).await {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Fallback image could not be loaded");
                None
            }
        }
    }

    async fn fail(&mut self, error: SolveError) {
        if self.machine.fail(error) {
            self.publish();
        }
        self.close_transport().await;
    }

    async fn cancelled(&mut self) {
        self.image = None;
        self.fallback = None;
        self.machine.fail(SolveError::Cancelled);
        self.machine.discard_text();
        self.publish();
        self.close_transport().await;
    }

    /// Closes the stream if it is still held. Runs at most once per stream.
    async fn close_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!(session_id = %self.id, error = %e, "Error while closing solve stream");
            }
        }
    }

    fn snapshot(&self) -> SolveSnapshot {
        SolveSnapshot {
            phase: self.machine.phase(),
            text: self.machine.text().to_string(),
            document: render(self.machine.text()),
            failure: self.machine.failure().cloned(),
        }
    }

    fn publish(&self) {
        self.updates.send_replace(self.snapshot());
    }
}

/// Runs `fut` unless `cancel` fires first.
async fn or_cancel<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
