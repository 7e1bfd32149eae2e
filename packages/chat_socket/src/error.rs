use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket is not open")]
    NotConnected,

    #[error("timed out after {0:?} waiting for the socket to open")]
    ConnectTimeout(Duration),

    #[error("connection manager has shut down")]
    Shutdown,

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SocketError {
    /// Recoverable "not ready yet" conditions the caller may retry later.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectTimeout(_))
    }
}
