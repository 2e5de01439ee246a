//! services/client/src/flow/state.rs
//!
//! Defines the client's shared state and how a solve attempt is started.

use crate::adapters::{FsImageLoader, HttpAuthAdapter, KatexMarkupTypesetter, WsSolveConnector};
use crate::config::Config;
use crate::error::ClientError;
use crate::flow::credentials::CredentialStore;
use crate::flow::gateway::AuthGateway;
use crate::flow::html::{escape_html, render_html, render_page};
use crate::flow::session::{SolveDeps, SolveHandle, SolveSession, SolveSnapshot};
use crate::flow::staging::StagingBuffer;
use snapsolve_core::domain::{CapturedImage, ImageRef};
use snapsolve_core::ports::{AuthService, ImageLoader, MathTypesetter, SolveConnector};
use std::sync::Arc;
use tracing::info;

//=========================================================================================
// ClientState (shared by every screen of the host app)
//=========================================================================================

/// Everything the presentation layer needs, created once by the host.
#[derive(Clone)]
pub struct ClientState {
    pub config: Arc<Config>,
    pub gateway: Arc<AuthGateway>,
    pub staging: Arc<StagingBuffer>,
    pub connector: Arc<dyn SolveConnector>,
    pub image_loader: Arc<dyn ImageLoader>,
    pub typesetter: Arc<dyn MathTypesetter>,
}

impl ClientState {
    /// Wires the production adapters from configuration.
    pub fn from_config(config: Config) -> Result<Self, ClientError> {
        let config = Arc::new(config);
        let auth = Arc::new(HttpAuthAdapter::new(
            config.api_base_url.clone(),
            config.http_timeout,
        )?);
        let connector = Arc::new(WsSolveConnector::new(
            config.ws_base_url.clone(),
            config.connect_timeout,
        ));
        info!(api = %config.api_base_url, stream = %config.ws_base_url, "Client configured");

        Ok(Self::with_adapters(
            config,
            auth,
            connector,
            Arc::new(FsImageLoader::new()),
            Arc::new(KatexMarkupTypesetter::new()),
        ))
    }

    /// Builds the state around explicit adapters.
    pub fn with_adapters(
        config: Arc<Config>,
        auth: Arc<dyn AuthService>,
        connector: Arc<dyn SolveConnector>,
        image_loader: Arc<dyn ImageLoader>,
        typesetter: Arc<dyn MathTypesetter>,
    ) -> Self {
        let gateway = Arc::new(AuthGateway::new(
            CredentialStore::new(),
            auth,
            config.test_user_email.clone(),
        ));
        Self {
            config,
            gateway,
            staging: Arc::new(StagingBuffer::new()),
            connector,
            image_loader,
            typesetter,
        }
    }

    /// Called by the capture screen with the camera's payload.
    pub fn stage_capture(&self, image: CapturedImage) {
        self.staging.stage(image);
    }

    /// Creates a session for the staged image (or `fallback` if nothing was
    /// staged). The staged image moves into the session; tearing down the
    /// returned handle also clears the staging buffer.
    pub fn start_solve(&self, fallback: Option<ImageRef>) -> (SolveSession, SolveHandle) {
        let deps = SolveDeps {
            gateway: self.gateway.clone(),
            connector: self.connector.clone(),
            image_loader: self.image_loader.clone(),
            stall_timeout: self.config.stall_timeout,
        };
        let (session, handle) = SolveSession::new(deps, self.staging.take(), fallback);
        (session, handle.clear_on_teardown(self.staging.clone()))
    }

    /// HTML page for the snapshot's current text, ready for an embedded browser.
    pub fn render_snapshot_page(&self, snapshot: &SolveSnapshot) -> String {
        let body = if snapshot.failure.is_some() {
            escape_html(&snapshot.display_text())
        } else {
            render_html(&snapshot.document, self.typesetter.as_ref())
        };
        render_page(&body)
    }
}
