//! # Transport Abstraction
//!
//! The benchmark core never speaks a wire protocol itself. It opens
//! connections through a [`Transport`] and moves opaque byte payloads over
//! the resulting [`Connection`]. Two implementations ship with the crate:
//!
//! - [`WebSocketTransport`] for `ws://` and `wss://` addresses
//! - [`TcpTransport`] for `tcp://host:port` addresses, using length-prefixed frames
//!
//! [`TransportKind::from_address`] picks the right one from an address.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod tcp;
pub mod websocket;

pub use tcp::TcpTransport;
pub use websocket::WebSocketTransport;

/// Errors a transport can report for a single connection
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("could not connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    #[error("error writing message: {0}")]
    Send(String),

    #[error("error reading message: {0}")]
    Receive(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection closed by peer")]
    Closed,

    #[error("frame of {0} bytes exceeds the maximum frame size")]
    FrameTooLarge(usize),

    #[error("unsupported address scheme: {0}")]
    UnsupportedScheme(String),
}

/// Opens connections to a target service
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open one connection to `address`
    async fn connect(&self, address: &str) -> Result<Box<dyn Connection>, TransportError>;

    /// Transport name for identification in logs
    fn name(&self) -> &'static str;
}

/// One open, bidirectional connection owned by a single worker
#[async_trait]
pub trait Connection: Send {
    /// Send one payload as a single message
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Wait for the next message on this connection
    async fn receive(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Release the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// Concrete transports selectable from an address scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    WebSocket,
    Tcp,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::WebSocket => write!(f, "WebSocket"),
            TransportKind::Tcp => write!(f, "TCP"),
        }
    }
}

impl TransportKind {
    /// Determine the transport from the scheme of `address`.
    pub fn from_address(address: &str) -> Result<Self, TransportError> {
        let scheme = address
            .split_once("://")
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .ok_or_else(|| TransportError::UnsupportedScheme(address.to_string()))?;

        match scheme.as_str() {
            "ws" | "wss" => Ok(TransportKind::WebSocket),
            "tcp" => Ok(TransportKind::Tcp),
            _ => Err(TransportError::UnsupportedScheme(scheme)),
        }
    }
}

/// Transport factory for creating transport instances
pub struct TransportFactory;

impl TransportFactory {
    /// Create a shared transport instance of the given kind
    pub fn create(kind: TransportKind) -> Arc<dyn Transport> {
        match kind {
            TransportKind::WebSocket => Arc::new(WebSocketTransport::new()),
            TransportKind::Tcp => Arc::new(TcpTransport::new()),
        }
    }

    /// Create the transport matching the scheme of `address`
    pub fn for_address(address: &str) -> Result<Arc<dyn Transport>, TransportError> {
        TransportKind::from_address(address).map(Self::create)
    }
}
