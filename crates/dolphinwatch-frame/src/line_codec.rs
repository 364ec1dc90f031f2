//! `tokio_util::codec` adapter over the same framing rules.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_message_from, encode_command, DEFAULT_MAX_MESSAGE_SIZE};
use crate::error::FrameError;
use crate::separator::{Separator, LINE_TERMINATOR};

/// Codec for `Framed` streams: decodes server lines, encodes commands with the
/// current separator.
#[derive(Debug, Clone)]
pub struct LineCodec {
    separator: Separator,
    max_message_size: usize,
    scanned: usize,
}

impl LineCodec {
    pub fn new() -> Self {
        Self::with_max_message_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            separator: Separator::Line,
            max_message_size,
            scanned: 0,
        }
    }

    /// Separator appended to subsequently encoded commands.
    pub fn set_separator(&mut self, separator: Separator) {
        self.separator = separator;
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        decode_message_from(src, &mut self.scanned, LINE_TERMINATOR, self.max_message_size)
    }
}

impl<'a> Encoder<&'a str> for LineCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_command(item, self.separator, dst);
        Ok(())
    }
}
