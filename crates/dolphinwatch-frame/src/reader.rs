use std::io::{ErrorKind, Read};

use crate::codec::{FrameConfig, Framer};
use crate::error::{FrameError, Result};

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete messages.
pub struct MessageReader<T> {
    inner: T,
    framer: Framer,
    chunk: Vec<u8>,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            framer: Framer::new(config.max_message_size),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached. An
    /// unterminated fragment left at EOF is discarded.
    pub fn read_message(&mut self) -> Result<String> {
        loop {
            if let Some(message) = self.framer.next_message()? {
                return Ok(message);
            }

            let read = match self.inner.read(&mut self.chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                if !self.framer.pending().is_empty() {
                    tracing::debug!(
                        bytes = self.framer.pending().len(),
                        "discarding unterminated fragment at end of stream"
                    );
                }
                return Err(FrameError::ConnectionClosed);
            }

            self.framer.extend(&self.chunk[..read]);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current message reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
