/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The connection is not established.
    #[error("DolphinConnection is not connected and therefore cannot perform actions")]
    NotConnected,

    /// A command argument was rejected before transmission.
    #[error("invalid command: {0}")]
    Protocol(#[from] dolphinwatch_protocol::ProtocolError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] dolphinwatch_transport::TransportError),

    /// Sending the command failed; the connection has been torn down.
    #[error("send failed: {0}")]
    Frame(#[from] dolphinwatch_frame::FrameError),

    /// An acknowledgement-bearing command was issued inside a batch.
    #[error("acknowledged commands cannot be issued while a batch is open")]
    BatchActive,

    /// No acknowledgement arrived in time.
    #[error("acknowledgement timed out after {0:?}")]
    AckTimeout(std::time::Duration),
}

impl ClientError {
    /// Returns true for the "not connected" precondition failure.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, ClientError::NotConnected)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
