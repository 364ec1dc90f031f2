use std::time::Duration;

use dolphinwatch_frame::FrameConfig;

/// Controls connection behavior.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for establishing the TCP connection. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Timeout for a single socket write.
    pub write_timeout: Option<Duration>,
    /// How long an acknowledged command waits for a previous acknowledgement
    /// before superseding it.
    pub ack_drain_timeout: Duration,
    /// How long an acknowledged command waits for its own acknowledgement.
    /// `None` waits until the answer arrives or the connection goes down.
    pub ack_timeout: Option<Duration>,
    /// Number of handler threads. Deliveries for one address always share a
    /// thread, so they run in arrival order.
    pub handler_workers: usize,
    /// Framing limits for the receive loop.
    pub frame: FrameConfig,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            ack_drain_timeout: Duration::from_secs(1),
            ack_timeout: None,
            handler_workers: 4,
            frame: FrameConfig::default(),
        }
    }
}
