//! services/client/src/flow/credentials.rs
//!
//! In-memory holder for the bearer tokens and the signed-in user's profile.
//! Nothing is persisted; a restart starts signed out.

use snapsolve_core::domain::{TokenPair, UserInfo};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Credentials {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserInfo>,
}

/// A cloneable handle to one set of credentials.
///
/// Clones share the same underlying state, so the host creates one store and
/// passes it to whatever needs it.
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Credentials>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Accessors never hold the lock across an await, so a poisoned lock only
    // means a panic elsewhere; the data is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, Credentials> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Credentials> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_tokens(&self, tokens: TokenPair) {
        let mut creds = self.write();
        creds.access_token = Some(tokens.access_token);
        creds.refresh_token = Some(tokens.refresh_token);
    }

    /// Overwrites only the access token, as a refresh does.
    pub fn set_access_token(&self, access_token: String) {
        self.write().access_token = Some(access_token);
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    /// Forgets an access token the service has rejected, keeping the refresh token.
    pub fn invalidate_access_token(&self) {
        self.write().access_token = None;
    }

    pub fn set_user(&self, user: Option<UserInfo>) {
        self.write().user = user;
    }

    pub fn user(&self) -> Option<UserInfo> {
        self.read().user.clone()
    }

    /// Clears both tokens and the user profile.
    pub fn clear_tokens(&self) {
        *self.write() = Credentials::default();
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().access_token.is_some()
    }
}
