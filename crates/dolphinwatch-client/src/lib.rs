//! Connection management for DolphinWatch.
//!
//! [`DolphinConnection`] owns the socket to a DolphinWatch server. Commands
//! are sent from the calling thread; a background thread reads server
//! messages and hands memory values to the registered handlers.

pub mod ack;
pub mod config;
pub mod connection;
mod dispatch;
pub mod error;
pub mod registry;
pub mod sink;

pub use ack::AckSlot;
pub use config::ConnectionConfig;
pub use connection::{ConnectionState, DisconnectReason, DolphinConnection};
pub use dolphinwatch_frame::FrameConfig;
pub use dolphinwatch_protocol::{AccessMode, GcPadButtons, RemoteLogLevel, StickState, WiimoteButtons};
pub use error::{ClientError, Result};
pub use registry::{
    CallbackRegistry, HandlerError, HandlerResult, MemoryHandler, MemoryValue, Registration,
};
pub use sink::{LogSink, TracingSink};
