//! Command encoding, validation and message parsing for DolphinWatch.
//!
//! Outgoing operations are modelled as [`Command`] values which validate and
//! render themselves into wire strings. Incoming lines parse into
//! [`Message`] values for the dispatcher.

pub mod buttons;
pub mod command;
pub mod error;
pub mod message;

pub use buttons::{GcPadButtons, StickState, WiimoteButtons};
pub use command::{validate_filename, AccessMode, Command, FORBIDDEN_FILENAME_CHARS};
pub use error::{ProtocolError, Result};
pub use message::{parse_message, Message, RemoteLogLevel};
