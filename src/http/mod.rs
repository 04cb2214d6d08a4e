//! HTTP request head handling.
//!
//! Only as much HTTP as a WebSocket endpoint needs: reading the upgrade (or
//! health-check) request and writing a bodiless response.
//!
//! # Architecture
//!
//! - **`splitter`**: Splits incoming bytes into CRLF-terminated lines
//! - **`parser`**: Builds a `Request` from those lines, one chunk at a time
//! - **`reader`**: Feeds transport reads into the parser under a read budget
//! - **`request`**: HTTP request representation
//! - **`response`**: HTTP response representation with builder pattern
//! - **`writer`**: Serializes and writes HTTP responses to the client
//!
//! # Data Flow
//!
//! ```text
//!   transport bytes (512-byte reads, at most 8)
//!          │
//!          ▼
//!   ┌──────────────┐   lines   ┌──────────────┐
//!   │ LineSplitter │ ────────▶ │ RequestParser│ ──▶ Request (+ remainder)
//!   └──────────────┘           └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use wsgate::http::parser::RequestParser;
//!
//! let mut parser = RequestParser::new();
//! assert!(parser.feed(b"GET /chat HTTP/1.1\r\nHost: a\r\n").unwrap().is_none());
//! let request = parser.feed(b"\r\n").unwrap().unwrap();
//! assert_eq!(request.url, "/chat");
//! assert_eq!(request.header("host"), Some("a"));
//! ```

pub mod parser;
pub mod reader;
pub mod request;
pub mod response;
pub mod splitter;
pub mod writer;
