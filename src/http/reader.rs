use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{Error, Result};
use crate::http::parser::RequestParser;
use crate::http::request::Request;
use crate::transport::Transport;

/// Size of a single read while waiting for the request head
pub const READ_CHUNK_SIZE: usize = 512;

/// Number of reads allowed before the head is considered too large
pub const MAX_READS: usize = 8;

/// Reads a request head from the transport.
///
/// Returns the request together with any bytes that followed the header
/// terminator in the final read. Fails with [`Error::RequestTooLarge`] when
/// [`MAX_READS`] reads go by without a complete head.
pub async fn read_request<S>(transport: &mut Transport<S>) -> Result<(Request, Bytes)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut parser = RequestParser::new();

    for attempt in 1..=MAX_READS {
        let data = transport.receive(READ_CHUNK_SIZE).await?;

        if let Some(request) = parser.feed(&data)? {
            tracing::trace!(
                peer = %transport.peer_addr(),
                reads = attempt,
                method = %request.method,
                url = %request.url,
                "Request head received"
            );
            return Ok((request, parser.remainder()));
        }
    }

    Err(Error::RequestTooLarge)
}
