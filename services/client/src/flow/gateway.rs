//! services/client/src/flow/gateway.rs
//!
//! The auth gateway: token exchange, refresh, and the single
//! "give me a usable access token" check run before every solve.
//!
//! Token validity is never tracked locally. A refresh happens only when no
//! access token is stored, which is the case after the service rejected one.

use crate::error::AuthError;
use crate::flow::credentials::CredentialStore;
use snapsolve_core::domain::{LoginOutcome, TokenPair};
use snapsolve_core::ports::{AuthService, PortError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct AuthGateway {
    store: CredentialStore,
    auth: Arc<dyn AuthService>,
    default_test_email: String,
    /// Serializes refreshes so one expired token causes one refresh call.
    refresh_guard: Mutex<()>,
    /// Bumped after every refresh attempt made under `refresh_guard`.
    refresh_attempts: AtomicU64,
}

impl AuthGateway {
    pub fn new(
        store: CredentialStore,
        auth: Arc<dyn AuthService>,
        default_test_email: impl Into<String>,
    ) -> Self {
        Self {
            store,
            auth,
            default_test_email: default_test_email.into(),
            refresh_guard: Mutex::new(()),
            refresh_attempts: AtomicU64::new(0),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Exchanges an identity-provider ID token and stores the result.
    pub async fn login_with_provider_token(&self, id_token: &str) -> Result<LoginOutcome, AuthError> {
        let outcome = self
            .auth
            .exchange_provider_token(id_token)
            .await
            .map_err(exchange_failed)?;

        self.store.set_tokens(outcome.tokens.clone());
        self.store.set_user(outcome.user.clone());
        info!(
            user_id = outcome.user.as_ref().map(|u| u.id.as_str()).unwrap_or_default(),
            "Signed in with identity provider"
        );
        Ok(outcome)
    }

    /// Signs in through the non-production test-user endpoint.
    pub async fn login_test_credential(&self, email: Option<&str>) -> Result<TokenPair, AuthError> {
        let email = email.unwrap_or(self.default_test_email.as_str());
        let tokens = self
            .auth
            .exchange_test_credential(email)
            .await
            .map_err(exchange_failed)?;

        self.store.set_tokens(tokens.clone());
        info!(email, "Signed in with test credential");
        Ok(tokens)
    }

    /// Trades the stored refresh token for a new access token.
    pub async fn refresh_access_token(&self) -> Result<String, AuthError> {
        let refresh_token = self.store.refresh_token().ok_or(AuthError::NoRefreshToken)?;

        let access_token = self.auth.refresh(&refresh_token).await.map_err(|e| {
            warn!(error = %e, "Access token refresh failed");
            AuthError::RefreshFailed {
                status: port_status(&e),
            }
        })?;

        self.store.set_access_token(access_token.clone());
        info!("Access token refreshed");
        Ok(access_token)
    }

    /// Returns a usable access token, refreshing at most once.
    ///
    /// Callers that queue behind an in-flight refresh share its outcome: if it
    /// failed they fail too, without a second request for the same token.
    pub async fn ensure_access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }

        let seen_attempts = self.refresh_attempts.load(Ordering::SeqCst);
        let _guard = self.refresh_guard.lock().await;
        if let Some(token) = self.store.access_token() {
            return Ok(token);
        }
        if self.refresh_attempts.load(Ordering::SeqCst) != seen_attempts {
            debug!("Refresh attempted while waiting and it failed");
            return Err(AuthError::NotAuthenticated);
        }

        let result = self.refresh_access_token().await;
        self.refresh_attempts.fetch_add(1, Ordering::SeqCst);
        result.map_err(|e| {
            warn!(error = %e, "No usable access token");
            AuthError::NotAuthenticated
        })
    }

    /// Drops an access token the service rejected so the next attempt refreshes.
    pub fn invalidate_access_token(&self) {
        self.store.invalidate_access_token();
    }

    pub fn logout(&self) {
        self.store.clear_tokens();
        info!("Signed out");
    }
}

fn port_status(e: &PortError) -> Option<u16> {
    match e {
        PortError::Rejected { status, .. } => Some(*status),
        PortError::Unauthorized => Some(401),
        _ => None,
    }
}

fn exchange_failed(e: PortError) -> AuthError {
    warn!(error = %e, "Token exchange failed");
    let status = port_status(&e);
    let body = match e {
        PortError::Rejected { body, .. } => body,
        other => other.to_string(),
    };
    AuthError::AuthExchangeFailed { status, body }
}
