//! services/client/src/adapters/ws_transport.rs
//!
//! The WebSocket adapter for the solve stream. It implements the
//! `SolveConnector` and `SolveTransport` ports with `tokio-tungstenite`.

use super::http_auth::snippet;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use snapsolve_core::ports::{PortError, PortResult, SolveConnector, SolveTransport};
use snapsolve_core::session::TransportEvent;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, http::StatusCode, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};
use url::Url;

/// Path of the solve endpoint, relative to the streaming base URL.
const SOLVE_PATH: &str = "/ws/calculate";

//=========================================================================================
// Connector
//=========================================================================================

/// Opens solve streams at `<ws_base>/ws/calculate?token=<access token>`.
#[derive(Clone, Debug)]
pub struct WsSolveConnector {
    ws_base_url: String,
    connect_timeout: Duration,
}

impl WsSolveConnector {
    pub fn new(ws_base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            ws_base_url: ws_base_url.into(),
            connect_timeout,
        }
    }

    /// Builds the stream URL. The token travels as a query parameter because
    /// the handshake cannot carry custom headers on every platform.
    pub fn solve_url(&self, access_token: &str) -> PortResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.ws_base_url, SOLVE_PATH))
            .map_err(|e| PortError::Unexpected(format!("invalid stream URL: {}", e)))?;
        url.query_pairs_mut().append_pair("token", access_token);
        Ok(url)
    }
}

#[async_trait]
impl SolveConnector for WsSolveConnector {
    async fn connect(&self, access_token: &str) -> PortResult<Box<dyn SolveTransport>> {
        let url = self.solve_url(access_token)?;
        info!(host = url.host_str().unwrap_or_default(), "Opening solve stream");

        let (stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| PortError::Timeout)?
            .map_err(map_handshake_error)?;

        Ok(Box::new(WsSolveTransport::new(stream)))
    }
}

fn map_handshake_error(e: tungstenite::Error) -> PortError {
    match e {
        tungstenite::Error::Http(response)
            if response.status() == StatusCode::UNAUTHORIZED
                || response.status() == StatusCode::FORBIDDEN =>
        {
            PortError::Unauthorized
        }
        tungstenite::Error::Http(response) => PortError::Rejected {
            status: response.status().as_u16(),
            body: response
                .body()
                .as_deref()
                .map(|bytes| snippet(&String::from_utf8_lossy(bytes)))
                .unwrap_or_default(),
        },
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// Transport
//=========================================================================================

/// An open solve stream.
pub struct WsSolveTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: bool,
}

impl WsSolveTransport {
    fn new(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        Self {
            stream,
            closed: false,
        }
    }
}

#[async_trait]
impl SolveTransport for WsSolveTransport {
    async fn send_text(&mut self, text: String) -> PortResult<()> {
        if self.closed {
            return Err(PortError::Unexpected("stream already closed".to_string()));
        }
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn next_event(&mut self) -> TransportEvent {
        if self.closed {
            return TransportEvent::Closed;
        }
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return TransportEvent::Fragment(text.to_string()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return TransportEvent::Fragment(text),
                    Err(_) => warn!(len = data.len(), "Ignoring non-UTF-8 binary frame"),
                },
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Solver closed the stream");
                    self.closed = true;
                    return TransportEvent::Closed;
                }
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.closed = true;
                    return TransportEvent::Failed(e.to_string());
                }
                None => {
                    self.closed = true;
                    return TransportEvent::Closed;
                }
            }
        }
    }

    async fn close(&mut self) -> PortResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(PortError::Unexpected(e.to_string())),
        }
    }
}
