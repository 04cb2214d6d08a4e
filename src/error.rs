use crate::http::parser::ParseError;
use crate::transport::TransportError;
use crate::websocket::codec::FrameError;

/// Protocol violations and transport failures that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Request too large")]
    RequestTooLarge,
    #[error("Timed out reading the handshake request")]
    HandshakeTimeout,
    #[error("Origin {0} is not allowed")]
    OriginNotAllowed(String),
    #[error("Unsupported WebSocket version")]
    UnsupportedVersion,
    #[error("The 'sec-websocket-key' header is missing")]
    MissingKey,
    #[error("Message fragmentation is not supported")]
    FragmentationNotSupported,
    #[error("Binary frames are not supported")]
    BinaryNotSupported,
    #[error("Invalid close frame payload")]
    InvalidClosePayload,
    #[error("Invalid UTF-8")]
    InvalidUtf8,
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
