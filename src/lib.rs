//! wsgate - WebSocket endpoint with origin access control
//!
//! Upgrades HTTP connections, frames and unframes text messages, and answers
//! a health-check path.

pub mod config;
pub mod error;
pub mod http;
pub mod server;
pub mod transport;
pub mod websocket;

pub use error::{Error, Result};
