//! Message separators.
//!
//! The line terminator ends a message. The batch terminator joins several
//! commands that the server buffers until the next line terminator arrives.

/// Terminates an ordinary message.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Separates commands inside a batch.
pub const BATCH_TERMINATOR: u8 = b';';

/// The separator appended to outgoing commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Separator {
    /// Each command executes as soon as it arrives.
    #[default]
    Line,
    /// Commands are buffered by the server until the batch is closed.
    Batch,
}

impl Separator {
    /// The terminator byte for this separator.
    pub fn byte(self) -> u8 {
        match self {
            Separator::Line => LINE_TERMINATOR,
            Separator::Batch => BATCH_TERMINATOR,
        }
    }

    /// Returns true while a batch is open.
    pub fn is_batch(self) -> bool {
        self == Separator::Batch
    }
}
