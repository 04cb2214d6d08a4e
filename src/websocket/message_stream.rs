//! Whole-message WebSocket I/O over an established connection.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::http::reader::READ_CHUNK_SIZE;
use crate::transport::{Transport, TransportError};
use crate::websocket::codec::{self, FrameDecoder};
use crate::websocket::frame::{CLOSE_NORMAL, Frame, OpCode};

/// Where a stream is in its lifecycle after the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Messages flow both ways
    Open,
    /// A close frame has been sent or received
    Closing,
    /// The transport has been released
    Closed,
}

/// A text-message view of one WebSocket connection.
///
/// Owns the transport and the frame decoder. Control frames are handled
/// inside [`MessageStream::receive_message`]: pings are answered, close frames
/// are echoed and end the stream.
#[derive(Debug)]
pub struct MessageStream<S> {
    transport: Transport<S>,
    handshake_headers: HashMap<String, String>,
    decoder: FrameDecoder,
    incoming: VecDeque<String>,
    state: StreamState,
}

impl<S> MessageStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        transport: Transport<S>,
        handshake_headers: HashMap<String, String>,
        max_payload: usize,
    ) -> Self {
        Self::with_buffered(transport, handshake_headers, max_payload, Bytes::new())
    }

    /// Like [`MessageStream::new`], for when frame bytes were already read
    /// together with the handshake request.
    pub fn with_buffered(
        transport: Transport<S>,
        handshake_headers: HashMap<String, String>,
        max_payload: usize,
        buffered: Bytes,
    ) -> Self {
        let mut decoder = FrameDecoder::new(max_payload);
        decoder.push(&buffered);

        Self {
            transport,
            handshake_headers,
            decoder,
            incoming: VecDeque::new(),
            state: StreamState::Open,
        }
    }

    pub fn handshake_headers(&self) -> &HashMap<String, String> {
        &self.handshake_headers
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.transport.peer_addr()
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Waits for the next text message.
    ///
    /// Returns `Ok(None)` once the stream has closed, either through the
    /// close handshake or because the peer went away.
    pub async fn receive_message(&mut self) -> Result<Option<String>> {
        loop {
            // One frame at a time: frames ahead of a malformed one still take effect.
            while self.state == StreamState::Open {
                let Some(frame) = self.decoder.next_frame()? else {
                    break;
                };
                self.handle_frame(frame).await?;
            }

            if let Some(message) = self.incoming.pop_front() {
                return Ok(Some(message));
            }
            if self.state != StreamState::Open {
                return Ok(None);
            }

            match self.transport.receive(READ_CHUNK_SIZE).await {
                Ok(data) => self.decoder.push(&data),
                Err(TransportError::Closed) => {
                    tracing::debug!(peer = %self.peer_addr(), "Peer closed the connection");
                    self.release().await;
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sends `text` as a single unmasked text frame.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        if self.state != StreamState::Open {
            tracing::debug!(peer = %self.peer_addr(), "Dropping message on a closing stream");
            return Ok(());
        }

        self.send_frame(&Frame::text(text)).await
    }

    /// Closes with status 1000 and no reason.
    pub async fn close(&mut self) -> Result<()> {
        self.close_with(CLOSE_NORMAL, "").await
    }

    /// Sends a close frame, then releases the transport.
    ///
    /// The transport is released even when sending fails. Closing an already
    /// closing or closed stream only makes sure the transport is released.
    pub async fn close_with(&mut self, code: u16, reason: &str) -> Result<()> {
        let result = if self.state == StreamState::Open {
            self.state = StreamState::Closing;
            self.send_frame(&Frame::close(code, reason)).await
        } else {
            Ok(())
        };

        self.release().await;
        result
    }

    async fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        tracing::trace!(
            peer = %self.peer_addr(),
            opcode = ?frame.opcode(),
            control = frame.opcode().is_control(),
            len = frame.payload().len(),
            "Frame received"
        );

        if !frame.is_final() {
            return Err(Error::FragmentationNotSupported);
        }

        match frame.opcode() {
            OpCode::Text => {
                let message =
                    String::from_utf8(frame.payload().to_vec()).map_err(|_| Error::InvalidUtf8)?;
                self.incoming.push_back(message);
            }
            OpCode::Binary => return Err(Error::BinaryNotSupported),
            OpCode::Continuation => return Err(Error::FragmentationNotSupported),
            OpCode::Ping => {
                let pong = Frame::pong(frame.payload().clone());
                self.send_frame(&pong).await?;
            }
            OpCode::Pong => {}
            OpCode::Close => {
                let payload = frame.payload();
                if payload.is_empty() {
                    self.close().await?;
                } else {
                    let (code, reason) = parse_close_payload(payload)?;
                    tracing::debug!(peer = %self.peer_addr(), code, reason, "Close frame received");
                    self.close_with(code, reason).await?;
                }
            }
        }

        Ok(())
    }

    async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        match self.transport.send(&codec::encode(frame)).await {
            Ok(()) => Ok(()),
            Err(TransportError::Closed) => {
                tracing::debug!(
                    peer = %self.peer_addr(),
                    opcode = ?frame.opcode(),
                    "Transport already closed, frame not sent"
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn release(&mut self) {
        self.transport.close().await;
        self.state = StreamState::Closed;
    }
}

fn parse_close_payload(payload: &[u8]) -> Result<(u16, &str)> {
    let [hi, lo, reason @ ..] = payload else {
        return Err(Error::InvalidClosePayload);
    };

    let reason = std::str::from_utf8(reason).map_err(|_| Error::InvalidUtf8)?;
    Ok((u16::from_be_bytes([*hi, *lo]), reason))
}
