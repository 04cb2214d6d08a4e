//! WebSocket endpoint
//!
//! - **`frame`**: Frame and opcode types
//! - **`codec`**: Incremental frame decoder and encoder
//! - **`message_stream`**: Text messages over an upgraded connection
//! - **`handshake`**: Accept token and the 101 / health responses
//! - **`origin`**: Origin allow-list matching
//! - **`protocol`**: Per-connection orchestration and the `Handler` trait

pub mod codec;
pub mod frame;
pub mod handshake;
pub mod message_stream;
pub mod origin;
pub mod protocol;

pub use message_stream::{MessageStream, StreamState};
pub use protocol::{Handler, ServerInfo, WebSocketProtocol};
