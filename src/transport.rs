//! Byte-stream transport
//!
//! A thin wrapper over any tokio stream that tracks whether it has been
//! closed and remembers both endpoint addresses.

use bytes::{Bytes, BytesMut};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Transport is closed")]
    Closed,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exclusively owned, closable byte stream.
#[derive(Debug)]
pub struct Transport<S> {
    io: S,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    closed: bool,
    shut_down: bool,
}

impl Transport<TcpStream> {
    pub fn from_tcp(stream: TcpStream) -> std::io::Result<Self> {
        let local_addr = stream.local_addr()?;
        let peer_addr = stream.peer_addr()?;
        Ok(Self::new(stream, local_addr, peer_addr))
    }
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S, local_addr: SocketAddr, peer_addr: SocketAddr) -> Self {
        Self {
            io,
            local_addr,
            peer_addr,
            closed: false,
            shut_down: false,
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads at most `max` bytes, waiting until at least one is available.
    ///
    /// End of stream, or a peer reset, marks the transport closed and reports
    /// [`TransportError::Closed`].
    pub async fn receive(&mut self, max: usize) -> Result<Bytes, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let mut buf = BytesMut::zeroed(max);
        let n = match self.io.read(&mut buf).await {
            Ok(n) => n,
            Err(e) if peer_gone(&e) => 0,
            Err(e) => return Err(e.into()),
        };

        if n == 0 {
            self.closed = true;
            return Err(TransportError::Closed);
        }

        buf.truncate(n);
        Ok(buf.freeze())
    }

    /// Writes all of `data` and flushes.
    pub async fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let written = match self.io.write_all(data).await {
            Ok(()) => self.io.flush().await,
            Err(e) => Err(e),
        };

        match written {
            Ok(()) => Ok(()),
            Err(e) if peer_gone(&e) => {
                self.closed = true;
                Err(TransportError::Closed)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Shuts the stream down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.shut_down {
            return;
        }
        self.closed = true;
        self.shut_down = true;

        if let Err(e) = self.io.shutdown().await {
            tracing::trace!(peer = %self.peer_addr, error = %e, "Shutdown failed");
        }
    }
}

fn peer_gone(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
    )
}
