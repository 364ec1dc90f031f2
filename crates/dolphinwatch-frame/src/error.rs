/// Errors that can occur during message framing.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The unterminated message exceeds the configured maximum size.
    #[error("message too large ({size} bytes without terminator, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing messages.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed by the other side.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
