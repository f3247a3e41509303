use async_trait::async_trait;
use thiserror::Error;

use crate::buffers::{BufferError, ResponseWriter};
use crate::request::RangedRequest;
use crate::source::Origin;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    /// A connection, timeout or socket level failure. Worth a reconnect.
    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    Request(String),

    #[error(transparent)]
    Buffer(#[from] BufferError),
}

impl TransportError {
    /// Whether the failure may go away after a reconnect
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::NotConnected | TransportError::Network(_))
    }
}

/// A secure channel able to carry ranged GET requests
#[async_trait]
pub trait RangeTransport: Send {
    /// Establish a connection to `origin`, replacing any previous one.
    ///
    /// A transport may defer the handshake to the first [`send`]; failures
    /// to reach the origin are then reported by `send` as network errors.
    ///
    /// [`send`]: RangeTransport::send
    async fn connect(&mut self, origin: &Origin) -> Result<(), TransportError>;

    /// Send `request` and receive the full response into `response`
    async fn send(
        &mut self,
        request: &RangedRequest,
        response: ResponseWriter<'_>,
    ) -> Result<(), TransportError>;

    /// Tear down the connection, if any
    async fn disconnect(&mut self);
}
