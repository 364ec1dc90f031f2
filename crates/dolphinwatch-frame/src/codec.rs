use bytes::{BufMut, BytesMut};

use crate::error::{FrameError, Result};
use crate::separator::{Separator, LINE_TERMINATOR};

/// Default maximum size of a message still waiting for its terminator: 1 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default number of bytes requested from the socket per read.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 1024;

/// Encode an outgoing command into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────┬───────────┐
/// │ Command (ASCII, space-sep.)  │ Separator │
/// │ e.g. "WRITE 8 2147483648 1"  │ '\n' / ';'│
/// └──────────────────────────────┴───────────┘
/// ```
pub fn encode_command(command: &str, separator: Separator, dst: &mut BytesMut) {
    dst.reserve(command.len() + 1);
    dst.put_slice(command.as_bytes());
    dst.put_u8(separator.byte());
}

/// Decode one message from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a terminated message yet.
/// On success, consumes the message and its terminator from the buffer and
/// returns the message with surrounding whitespace trimmed.
pub fn decode_message(
    src: &mut BytesMut,
    delimiter: u8,
    max_message_size: usize,
) -> Result<Option<String>> {
    decode_message_from(src, &mut 0, delimiter, max_message_size)
}

/// Like [`decode_message`], but skips the first `scanned` bytes, which are
/// known to hold no delimiter.
///
/// `scanned` is advanced past the bytes examined while no message is
/// complete and reset once one is taken.
pub(crate) fn decode_message_from(
    src: &mut BytesMut,
    scanned: &mut usize,
    delimiter: u8,
    max_message_size: usize,
) -> Result<Option<String>> {
    let start = (*scanned).min(src.len());
    let Some(offset) = src[start..].iter().position(|b| *b == delimiter) else {
        *scanned = src.len();
        if src.len() > max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: src.len(),
                max: max_message_size,
            });
        }
        return Ok(None); // Need more data
    };

    *scanned = 0;
    let pos = start + offset;
    let line = src.split_to(pos + 1);
    let text = String::from_utf8_lossy(&line[..pos]);
    Ok(Some(text.trim().to_string()))
}

/// Configuration for message framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum bytes buffered without a terminator. Default: 1 MiB.
    pub max_message_size: usize,
    /// Bytes requested from the stream per read. Default: 1024.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// Incremental framer over arbitrarily split byte chunks.
///
/// Bytes after the last terminator stay buffered until a later chunk
/// completes them.
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    scanned: usize,
    delimiter: u8,
    max_message_size: usize,
}

impl Framer {
    /// Framer for server traffic (line terminated).
    pub fn new(max_message_size: usize) -> Self {
        Self::with_delimiter(LINE_TERMINATOR, max_message_size)
    }

    /// Framer splitting on an explicit delimiter byte.
    pub fn with_delimiter(delimiter: u8, max_message_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            delimiter,
            max_message_size,
        }
    }

    /// Append a received chunk.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete message, if any.
    pub fn next_message(&mut self) -> Result<Option<String>> {
        decode_message_from(
            &mut self.buf,
            &mut self.scanned,
            self.delimiter,
            self.max_message_size,
        )
    }

    /// Append a chunk and drain every message it completes, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>> {
        self.extend(chunk);
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Bytes received but not yet terminated.
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }
}
