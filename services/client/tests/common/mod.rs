//! In-memory fakes for the client's ports.

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use client_lib::config::Config;
use client_lib::flow::ClientState;
use snapsolve_core::domain::{CapturedImage, DisplayMode, ImageRef, LoginOutcome, TokenPair};
use snapsolve_core::ports::{
    AuthService, ImageLoader, MathRenderError, MathTypesetter, PortError, PortResult,
    SolveConnector, SolveTransport,
};
use snapsolve_core::session::TransportEvent;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn png_image() -> CapturedImage {
    CapturedImage::new(STANDARD.encode(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"))
}

pub fn jpeg_data_url() -> CapturedImage {
    CapturedImage::new(format!(
        "data:image/jpeg;base64,{}",
        STANDARD.encode(b"\xFF\xD8\xFF\xE0\0\x10JFIF\0")
    ))
}

//=========================================================================================
// Auth
//=========================================================================================

#[derive(Default)]
pub struct FakeAuth {
    pub refresh_calls: AtomicUsize,
    pub refresh_result: Mutex<Option<PortResult<String>>>,
}

#[async_trait]
impl AuthService for FakeAuth {
    async fn exchange_provider_token(&self, _id_token: &str) -> PortResult<LoginOutcome> {
        Err(PortError::Unexpected("not used".into()))
    }

    async fn exchange_test_credential(&self, email: &str) -> PortResult<TokenPair> {
        Ok(TokenPair {
            access_token: format!("access-{}", email),
            refresh_token: "refresh".into(),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> PortResult<String> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_result
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(Err(PortError::Rejected {
                status: 401,
                body: String::new(),
            }))
    }
}

//=========================================================================================
// Transport
//=========================================================================================

/// What the scripted stream does once its events run out.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum AfterScript {
    Close,
    Hang,
}

/// Shared record of what the fake transport saw.
#[derive(Default)]
pub struct Wire {
    pub connects: AtomicUsize,
    pub closes: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
    pub tokens: Mutex<Vec<String>>,
}

impl Wire {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

pub struct FakeConnector {
    pub wire: Arc<Wire>,
    script: Mutex<Vec<TransportEvent>>,
    after: AfterScript,
    connect_error: Option<PortError>,
}

impl FakeConnector {
    pub fn new(script: Vec<TransportEvent>, after: AfterScript) -> Self {
        Self {
            wire: Arc::new(Wire::default()),
            script: Mutex::new(script),
            after,
            connect_error: None,
        }
    }

    pub fn failing(error: PortError) -> Self {
        Self {
            connect_error: Some(error),
            ..Self::new(Vec::new(), AfterScript::Close)
        }
    }

    pub fn fragments(parts: &[&str], after: AfterScript) -> Self {
        Self::new(
            parts
                .iter()
                .map(|p| TransportEvent::Fragment(p.to_string()))
                .collect(),
            after,
        )
    }
}

#[async_trait]
impl SolveConnector for FakeConnector {
    async fn connect(&self, access_token: &str) -> PortResult<Box<dyn SolveTransport>> {
        self.wire.connects.fetch_add(1, Ordering::SeqCst);
        self.wire.tokens.lock().unwrap().push(access_token.to_string());
        if let Some(e) = &self.connect_error {
            return Err(e.clone());
        }
        let events: VecDeque<_> = std::mem::take(&mut *self.script.lock().unwrap()).into();
        Ok(Box::new(FakeTransport {
            wire: self.wire.clone(),
            events,
            after: self.after,
            closed: false,
        }))
    }
}

struct FakeTransport {
    wire: Arc<Wire>,
    events: VecDeque<TransportEvent>,
    after: AfterScript,
    closed: bool,
}

#[async_trait]
impl SolveTransport for FakeTransport {
    async fn send_text(&mut self, text: String) -> PortResult<()> {
        self.wire.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_event(&mut self) -> TransportEvent {
        // Yield so a waiting test can observe each snapshot.
        tokio::task::yield_now().await;
        match self.events.pop_front() {
            Some(event) => event,
            None if self.after == AfterScript::Hang => std::future::pending().await,
            None => TransportEvent::Closed,
        }
    }

    async fn close(&mut self) -> PortResult<()> {
        if !self.closed {
            self.closed = true;
            self.wire.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

//=========================================================================================
// Image loading and typesetting
//=========================================================================================

pub struct FixedImageLoader(pub Option<CapturedImage>);

#[async_trait]
impl ImageLoader for FixedImageLoader {
    async fn load(&self, reference: &ImageRef) -> PortResult<CapturedImage> {
        match &self.0 {
            Some(image) => Ok(CapturedImage::new(image.as_str())),
            None => Err(PortError::Unexpected(format!(
                "missing {}",
                reference.0.display()
            ))),
        }
    }
}

pub struct PlainTypesetter;

impl MathTypesetter for PlainTypesetter {
    fn typeset(&self, tex: &str, _mode: DisplayMode) -> Result<String, MathRenderError> {
        Ok(format!("<m>{}</m>", tex))
    }
}

//=========================================================================================
// State
//=========================================================================================

pub fn test_config() -> Config {
    Config {
        stall_timeout: Duration::from_secs(5),
        ..Config::default()
    }
}

pub fn state_with(auth: Arc<FakeAuth>, connector: Arc<FakeConnector>, loader: FixedImageLoader) -> ClientState {
    ClientState::with_adapters(
        Arc::new(test_config()),
        auth,
        connector,
        Arc::new(loader),
        Arc::new(PlainTypesetter),
    )
}

/// A state whose user is signed in with access token `a1`.
pub fn signed_in(connector: Arc<FakeConnector>) -> ClientState {
    let state = state_with(Arc::new(FakeAuth::default()), connector, FixedImageLoader(None));
    state.gateway.store().set_tokens(TokenPair {
        access_token: "a1".into(),
        refresh_token: "r1".into(),
    });
    state
}
