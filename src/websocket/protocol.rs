//! Per-connection orchestration
//!
//! Drives one accepted connection from the raw request up to the user's
//! handler:
//!
//! 1. Read the request head under the handshake timeout
//! 2. Reject disallowed origins
//! 3. Answer health checks and stop
//! 4. Validate the upgrade headers and send `101 Switching Protocols`
//! 5. Run the handler over a [`MessageStream`], then log the disconnect and
//!    close the stream no matter how the handler finished

use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::reader::read_request;
use crate::http::request::Request;
use crate::http::writer::ResponseWriter;
use crate::transport::Transport;
use crate::websocket::codec::DEFAULT_MAX_PAYLOAD;
use crate::websocket::handshake::{handshake_response, health_response};
use crate::websocket::message_stream::MessageStream;
use crate::websocket::origin::OriginPolicy;

/// Default path answered with `204 No Content` instead of a handshake
pub const DEFAULT_HEALTH_PATH: &str = "/ready";

/// Default time allowed for the client to send its request head
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Read-only facts about the running server, handed to every handler.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub local_addr: SocketAddr,
}

/// Application logic run once per established WebSocket connection.
pub trait Handler: Send + Sync + 'static {
    fn handle<S>(
        &self,
        server: &ServerInfo,
        stream: &mut MessageStream<S>,
    ) -> impl Future<Output = anyhow::Result<()>> + Send
    where
        S: AsyncRead + AsyncWrite + Unpin + Send;
}

enum Negotiated {
    Health,
    Upgrade { request: Request, buffered: Bytes },
}

/// Logs the disconnect when dropped, so it also fires on cancellation.
struct DisconnectLog {
    origin: Option<String>,
    peer: SocketAddr,
}

impl Drop for DisconnectLog {
    fn drop(&mut self) {
        tracing::info!(origin = ?self.origin, peer = %self.peer, "WebSocket disconnected");
    }
}

/// A WebSocket endpoint: origin policy, health check and handler.
pub struct WebSocketProtocol<H> {
    origins: OriginPolicy,
    health_path: String,
    handshake_timeout: Duration,
    max_message_size: usize,
    handler: H,
}

impl<H: Handler> WebSocketProtocol<H> {
    /// An endpoint that accepts any origin, with default limits.
    pub fn new(handler: H) -> Self {
        Self {
            origins: OriginPolicy::allow_all(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            max_message_size: DEFAULT_MAX_PAYLOAD,
            handler,
        }
    }

    /// Builds an endpoint from configuration, compiling origin patterns.
    pub fn from_config(config: &Config, handler: H) -> anyhow::Result<Self> {
        Ok(Self::new(handler)
            .with_origins(config.origin_policy()?)
            .with_health_path(&config.health_path)
            .with_handshake_timeout(config.handshake_timeout())
            .with_max_message_size(config.max_message_size))
    }

    pub fn with_origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    pub fn with_health_path(mut self, path: &str) -> Self {
        self.health_path = path.to_lowercase();
        self
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serves one connection to completion.
    ///
    /// Errors before the upgrade drop the connection without a close frame.
    /// After the upgrade the stream is always closed, and a handler error is
    /// returned unchanged.
    pub async fn serve<S>(
        &self,
        server: &ServerInfo,
        mut transport: Transport<S>,
    ) -> anyhow::Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (request, buffered) = match self.negotiate(&mut transport).await {
            Ok(Negotiated::Upgrade { request, buffered }) => (request, buffered),
            Ok(Negotiated::Health) => {
                transport.close().await;
                return Ok(());
            }
            Err(e) => {
                transport.close().await;
                return Err(e.into());
            }
        };

        let origin = request.origin().map(str::to_string);
        let peer = transport.peer_addr();
        tracing::info!(origin = ?origin, peer = %peer, "WebSocket connected");
        let disconnect = DisconnectLog { origin, peer };

        let mut stream = MessageStream::with_buffered(
            transport,
            request.headers,
            self.max_message_size,
            buffered,
        );

        let result = self.handler.handle(server, &mut stream).await;

        drop(disconnect);
        let closed = stream.close().await;

        result?;
        closed?;
        Ok(())
    }

    async fn negotiate<S>(&self, transport: &mut Transport<S>) -> Result<Negotiated>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (request, buffered) = timeout(self.handshake_timeout, read_request(transport))
            .await
            .map_err(|_| Error::HandshakeTimeout)??;

        let origin = request.origin();
        if !self.origins.allows(origin) {
            return Err(Error::OriginNotAllowed(origin.unwrap_or_default().to_string()));
        }

        if request.url == self.health_path {
            tracing::debug!(peer = %transport.peer_addr(), "Health check");
            ResponseWriter::new(&health_response(origin))
                .write_to(transport)
                .await?;
            return Ok(Negotiated::Health);
        }

        let response = handshake_response(&request)?;
        ResponseWriter::new(&response).write_to(transport).await?;

        Ok(Negotiated::Upgrade { request, buffered })
    }
}
