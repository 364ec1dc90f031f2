//! Destination for log lines emitted by the server.

use dolphinwatch_protocol::RemoteLogLevel;

/// Receives `LOG` messages sent by the server.
///
/// Implementations are called from the receive loop and should return quickly.
pub trait LogSink: Send + Sync {
    fn log(&self, level: RemoteLogLevel, message: &str);
}

/// Forwards server log lines to `tracing` under the `dolphinwatch::remote`
/// target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&self, level: RemoteLogLevel, message: &str) {
        match level {
            RemoteLogLevel::Error => tracing::error!(target: "dolphinwatch::remote", "{message}"),
            RemoteLogLevel::Warning => tracing::warn!(target: "dolphinwatch::remote", "{message}"),
            RemoteLogLevel::Notice | RemoteLogLevel::Info => {
                tracing::info!(target: "dolphinwatch::remote", "{message}")
            }
            RemoteLogLevel::Debug => tracing::debug!(target: "dolphinwatch::remote", "{message}"),
        }
    }
}
