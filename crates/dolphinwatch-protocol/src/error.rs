/// Errors raised while encoding commands or parsing server messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A 32-bit access targeted an address that is not word aligned.
    #[error("address {addr:#010x} must be whole word; multiple of 4")]
    MisalignedAddress { addr: u32 },

    /// A filename contains a character the server cannot accept.
    #[error("filename {filename:?} must not contain any of the following: ?\"<>|")]
    InvalidFilename { filename: String },

    /// A server message could not be parsed.
    #[error("malformed message {line:?}: {reason}")]
    Malformed { line: String, reason: String },
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
