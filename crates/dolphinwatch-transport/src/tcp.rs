use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::stream::WatchStream;

/// Host a DolphinWatch server listens on unless told otherwise.
pub const DEFAULT_HOST: &str = "localhost";

/// Port a DolphinWatch server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 6000;

/// TCP transport.
///
/// Resolves `host:port` and opens a stream to the first address that accepts
/// the connection.
pub struct TcpTransport;

impl TcpTransport {
    /// Connect to a DolphinWatch server (blocking).
    ///
    /// With `timeout` set, every resolved address gets at most that long to
    /// accept the connection; otherwise the operating system default applies.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<WatchStream> {
        let addr = format!("{host}:{port}");
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                addr: addr.clone(),
                source,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                addr,
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "host resolved to no addresses",
                ),
            });
        }

        let stream = match timeout {
            Some(timeout) => connect_each(&candidates, timeout),
            None => TcpStream::connect(candidates.as_slice()),
        }
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;

        // Commands are tiny and latency matters more than throughput.
        stream.set_nodelay(true)?;

        debug!(%addr, "connected to dolphinwatch server");
        Ok(WatchStream::from_tcp(stream))
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "tcp"
    }
}

fn connect_each(candidates: &[SocketAddr], timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for candidate in candidates {
        match TcpStream::connect_timeout(candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%candidate, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "no address to connect to")
    }))
}
