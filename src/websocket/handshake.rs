use base64::{Engine as _, engine::general_purpose};
use sha1::{Digest, Sha1};

use crate::error::{Error, Result};
use crate::http::request::Request;
use crate::http::response::{Response, ResponseBuilder, StatusCode};

/// GUID appended to the client key before hashing (RFC 6455 section 1.3)
pub const HANDSHAKE_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version accepted
pub const SUPPORTED_VERSION: &str = "13";

/// Computes `Sec-WebSocket-Accept` for a client's `Sec-WebSocket-Key`.
///
/// ```
/// # use wsgate::websocket::handshake::accept_token;
/// assert_eq!(
///     accept_token("dGhlIHNhbXBsZSBub25jZQ=="),
///     "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
/// );
/// ```
pub fn accept_token(key: &str) -> String {
    let mut sha1 = Sha1::new();

    sha1.update(key.as_bytes());
    sha1.update(HANDSHAKE_GUID.as_bytes());

    general_purpose::STANDARD.encode(sha1.finalize())
}

/// Validates the upgrade headers and builds the 101 response.
pub fn handshake_response(request: &Request) -> Result<Response> {
    if request.header("sec-websocket-version") != Some(SUPPORTED_VERSION) {
        return Err(Error::UnsupportedVersion);
    }

    let key = request.header("sec-websocket-key").ok_or(Error::MissingKey)?;

    Ok(ResponseBuilder::new(StatusCode::SwitchingProtocols)
        .header("Upgrade", "WebSocket")
        .header("Connection", "Upgrade")
        .header("Sec-WebSocket-Accept", accept_token(key))
        .build())
}

/// Builds the health-check response, echoing the origin for CORS.
pub fn health_response(origin: Option<&str>) -> Response {
    let builder = ResponseBuilder::new(StatusCode::NoContent);

    let builder = match origin {
        Some(origin) => builder.header("Access-Control-Allow-Origin", origin),
        None => builder,
    };

    builder.header("Vary", "Origin").build()
}
