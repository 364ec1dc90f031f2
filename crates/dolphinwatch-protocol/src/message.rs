use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Severity attached to a server `LOG` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteLogLevel {
    Notice,
    Error,
    Warning,
    Info,
    Debug,
}

impl RemoteLogLevel {
    /// Map the numeric level used on the wire (1-5).
    pub fn from_wire(level: u8) -> Option<Self> {
        match level {
            1 => Some(RemoteLogLevel::Notice),
            2 => Some(RemoteLogLevel::Error),
            3 => Some(RemoteLogLevel::Warning),
            4 => Some(RemoteLogLevel::Info),
            5 => Some(RemoteLogLevel::Debug),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RemoteLogLevel::Notice => "notice",
            RemoteLogLevel::Error => "error",
            RemoteLogLevel::Warning => "warning",
            RemoteLogLevel::Info => "info",
            RemoteLogLevel::Debug => "debug",
        }
    }
}

/// A message received from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Value at `addr`, answering `READ` or `SUBSCRIBE`.
    Mem { addr: u32, value: u32 },
    /// Bytes starting at `addr`, answering `SUBSCRIBE_MULTI`.
    MemMulti { addr: u32, values: Vec<u8> },
    /// Positive acknowledgement.
    Success,
    /// Negative acknowledgement.
    Fail,
    /// Log line emitted by the server.
    Log { level: RemoteLogLevel, text: String },
    /// Anything this client does not understand.
    Unknown(String),
}

/// Parse one framed (already trimmed) server line.
pub fn parse_message(line: &str) -> Result<Message> {
    let mut parts = line.split(' ');
    let keyword = parts.next().unwrap_or_default();

    match keyword {
        "MEM" => {
            let addr = field(line, parts.next(), "address")?;
            let value = field(line, parts.next(), "value")?;
            Ok(Message::Mem { addr, value })
        }
        "MEM_MULTI" => {
            let addr = field(line, parts.next(), "address")?;
            let values = parts
                .filter(|part| !part.is_empty())
                .map(|part| field(line, Some(part), "byte"))
                .collect::<Result<Vec<u8>>>()?;
            Ok(Message::MemMulti { addr, values })
        }
        "SUCCESS" => Ok(Message::Success),
        "FAIL" => Ok(Message::Fail),
        "LOG" => {
            let raw: u8 = field(line, parts.next(), "log level")?;
            let level = RemoteLogLevel::from_wire(raw)
                .ok_or_else(|| malformed(line, format!("unknown log level {raw}")))?;
            let text = parts.collect::<Vec<_>>().join(" ");
            Ok(Message::Log { level, text })
        }
        _ => Ok(Message::Unknown(line.to_string())),
    }
}

fn field<T: FromStr>(line: &str, part: Option<&str>, what: &str) -> Result<T> {
    let part = part.ok_or_else(|| malformed(line, format!("missing {what}")))?;
    part.parse()
        .map_err(|_| malformed(line, format!("invalid {what} {part:?}")))
}

fn malformed(line: &str, reason: String) -> ProtocolError {
    ProtocolError::Malformed {
        line: line.to_string(),
        reason,
    }
}
