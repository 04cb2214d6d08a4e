#![allow(dead_code)]

use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use wsgate::http::parser::RequestParser;
use wsgate::http::request::Request;
use wsgate::transport::Transport;
use wsgate::websocket::codec::{DEFAULT_MAX_PAYLOAD, FrameDecoder, encode};
use wsgate::websocket::frame::Frame;

pub const CLIENT_MASK: [u8; 4] = [0x12, 0x34, 0x56, 0x78];

pub fn local_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

pub fn peer_addr() -> SocketAddr {
    "127.0.0.1:50000".parse().unwrap()
}

/// A server-side transport and the client end of the same in-memory pipe.
pub fn pipe() -> (Transport<DuplexStream>, DuplexStream) {
    let (server, client) = tokio::io::duplex(64 * 1024);
    (Transport::new(server, local_addr(), peer_addr()), client)
}

pub fn upgrade_request(origin: Option<&str>) -> String {
    let mut request = String::from(
        "GET /chat HTTP/1.1\r\n\
Host: localhost\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
Sec-WebSocket-Version: 13\r\n",
    );
    if let Some(origin) = origin {
        request.push_str(&format!("Origin: {origin}\r\n"));
    }
    request.push_str("\r\n");
    request
}

/// Parses a complete request head delivered in one piece.
pub fn parse_request(head: &str) -> Request {
    RequestParser::new()
        .feed(head.as_bytes())
        .unwrap()
        .expect("request head should be complete")
}

pub const UPGRADE_RESPONSE: &[u8] = b"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: WebSocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n";

/// Writes a frame the way a browser would, masked.
pub async fn send_client_frame(client: &mut DuplexStream, frame: Frame) {
    client
        .write_all(&encode(&frame.masked(CLIENT_MASK)))
        .await
        .unwrap();
}

/// A client-side frame reader.
pub struct FrameReader {
    decoder: FrameDecoder,
    pending: Vec<Frame>,
}

impl FrameReader {
    pub fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(DEFAULT_MAX_PAYLOAD),
            pending: Vec::new(),
        }
    }

    /// Next frame from the server, or `None` at end of stream.
    pub async fn next(&mut self, client: &mut DuplexStream) -> Option<Frame> {
        loop {
            if !self.pending.is_empty() {
                return Some(self.pending.remove(0));
            }

            let mut buf = [0u8; 1024];
            let n = client.read(&mut buf).await.unwrap();
            if n == 0 {
                return None;
            }
            self.pending.extend(self.decoder.feed(&buf[..n]).unwrap());
        }
    }
}

/// Reads exactly `len` bytes from the client end.
pub async fn read_exact(client: &mut DuplexStream, len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    client.read_exact(&mut buf).await.unwrap();
    buf
}

/// Reads until the server closes its side.
pub async fn read_to_end(client: &mut DuplexStream) -> Vec<u8> {
    let mut buf = Vec::new();
    client.read_to_end(&mut buf).await.unwrap();
    buf
}
