//! Remote control for the Dolphin emulator.
//!
//! dolphinwatch speaks the DolphinWatch line protocol over TCP: read, write
//! and watch emulated memory, press controller buttons, and drive playback
//! and savestates of a running emulator.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection setup
//! - [`frame`]: newline/semicolon message framing
//! - [`protocol`]: command encoding and server message parsing
//! - [`client`]: connection state machine with callbacks (behind `client` feature)
//!
//! ```no_run
//! use dolphinwatch::DolphinConnection;
//!
//! let connection = DolphinConnection::new("localhost", 6000);
//! connection.connect();
//! connection.subscribe32(0x8047_8498, |value| {
//!     println!("value changed: {value:?}");
//!     Ok(())
//! })?;
//! # Ok::<(), dolphinwatch::client::ClientError>(())
//! ```

/// Re-export transport types.
pub mod transport {
    pub use dolphinwatch_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dolphinwatch_frame::*;
}

/// Re-export protocol types.
pub mod protocol {
    pub use dolphinwatch_protocol::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use dolphinwatch_client::*;
}

#[cfg(feature = "client")]
pub use dolphinwatch_client::{DisconnectReason, DolphinConnection};
