//! Newline-delimited message framing for the DolphinWatch protocol.
//!
//! Every wire message is an ASCII line terminated by a separator:
//! - `\n` for ordinary commands and for everything the server sends
//! - `;` between commands of a batch, which the server executes as one unit
//!
//! Callers always get complete, trimmed messages; partial reads are buffered
//! internally.

pub mod codec;
pub mod error;
#[cfg(feature = "async")]
pub mod line_codec;
pub mod reader;
pub mod separator;
pub mod writer;

pub use codec::{decode_message, encode_command, FrameConfig, Framer, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use line_codec::LineCodec;
pub use reader::MessageReader;
pub use separator::{Separator, BATCH_TERMINATOR, LINE_TERMINATOR};
pub use writer::CommandWriter;
