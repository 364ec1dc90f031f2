//! TCP transport for the DolphinWatch remote-control protocol.
//!
//! This is the lowest layer of dolphinwatch. Everything else builds on top of
//! the [`WatchStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::WatchStream;
pub use tcp::{TcpTransport, DEFAULT_HOST, DEFAULT_PORT};
