use std::fmt::Write as _;

use crate::buttons::{GcPadButtons, StickState, WiimoteButtons};
use crate::error::{ProtocolError, Result};

/// Characters a savestate or game filename must not contain.
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['?', '"', '<', '>', '|'];

/// Width of a single memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Bits8,
    Bits16,
    Bits32,
}

impl AccessMode {
    /// Wire representation (8, 16 or 32).
    pub fn bits(self) -> u8 {
        match self {
            AccessMode::Bits8 => 8,
            AccessMode::Bits16 => 16,
            AccessMode::Bits32 => 32,
        }
    }

    /// Parse the wire representation.
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            8 => Some(AccessMode::Bits8),
            16 => Some(AccessMode::Bits16),
            32 => Some(AccessMode::Bits32),
            _ => None,
        }
    }
}

/// An outgoing DolphinWatch command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Write a single value of `mode` width.
    Write { mode: AccessMode, addr: u32, value: u32 },
    /// Write consecutive bytes starting at `addr`.
    WriteMulti { addr: u32, values: Vec<u8> },
    /// Read a value once; answered by `MEM`.
    Read { mode: AccessMode, addr: u32 },
    /// Receive a `MEM` every time the value changes.
    Subscribe { mode: AccessMode, addr: u32 },
    /// Receive a `MEM_MULTI` every time any of `size` bytes changes.
    SubscribeMulti { size: u32, addr: u32 },
    Unsubscribe { addr: u32 },
    UnsubscribeMulti { addr: u32 },
    /// Audio level, 0-100.
    Volume(u8),
    /// Emulation speed, 1.0 being normal speed.
    Speed(f32),
    /// Wiimote button states. Hijacks the wiimote for roughly half a second.
    WiiButtons { index: u8, buttons: WiimoteButtons },
    /// GameCube pad button and stick states.
    GcButtons {
        index: u8,
        buttons: GcPadButtons,
        sticks: StickState,
    },
    Pause,
    Resume,
    Reset,
    /// Stops emulation. Starting a new game afterwards is not supported; use
    /// `Insert` followed by `Reset` instead.
    Stop,
    /// Make a savestate.
    Save(String),
    /// Load a savestate; answered by `SUCCESS` or `FAIL`.
    Load(String),
    /// Insert a new game image. Running games may crash if the image changes
    /// under them.
    Insert(String),
    /// Empty command; with the line separator it makes the server execute a
    /// pending batch.
    Flush,
}

impl Command {
    /// Wire keyword of this command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Write { .. } => "WRITE",
            Command::WriteMulti { .. } => "WRITE_MULTI",
            Command::Read { .. } => "READ",
            Command::Subscribe { .. } => "SUBSCRIBE",
            Command::SubscribeMulti { .. } => "SUBSCRIBE_MULTI",
            Command::Unsubscribe { .. } => "UNSUBSCRIBE",
            Command::UnsubscribeMulti { .. } => "UNSUBSCRIBE_MULTI",
            Command::Volume(_) => "VOLUME",
            Command::Speed(_) => "SPEED",
            Command::WiiButtons { .. } => "BUTTONSTATES_WII",
            Command::GcButtons { .. } => "BUTTONSTATES_GC",
            Command::Pause => "PAUSE",
            Command::Resume => "RESUME",
            Command::Reset => "RESET",
            Command::Stop => "STOP",
            Command::Save(_) => "SAVE",
            Command::Load(_) => "LOAD",
            Command::Insert(_) => "INSERT",
            Command::Flush => "",
        }
    }

    /// Whether the server answers this command with `SUCCESS`/`FAIL`.
    pub fn requires_ack(&self) -> bool {
        matches!(self, Command::Load(_))
    }

    /// Check arguments without rendering.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::Read {
                mode: AccessMode::Bits32,
                addr,
            }
            | Command::Subscribe {
                mode: AccessMode::Bits32,
                addr,
            } => validate_word_aligned(*addr),
            Command::Save(filename) | Command::Load(filename) | Command::Insert(filename) => {
                validate_filename(filename)
            }
            _ => Ok(()),
        }
    }

    /// Validate and render the wire string, without separator.
    pub fn encode(&self) -> Result<String> {
        self.validate()?;

        let name = self.name();
        let line = match self {
            Command::Write { mode, addr, value } => {
                format!("{name} {} {addr} {value}", mode.bits())
            }
            Command::WriteMulti { addr, values } => {
                let mut line = format!("{name} {addr}");
                for value in values {
                    let _ = write!(line, " {value}");
                }
                line
            }
            Command::Read { mode, addr } | Command::Subscribe { mode, addr } => {
                format!("{name} {} {addr}", mode.bits())
            }
            Command::SubscribeMulti { size, addr } => format!("{name} {size} {addr}"),
            Command::Unsubscribe { addr } | Command::UnsubscribeMulti { addr } => {
                format!("{name} {addr}")
            }
            Command::Volume(level) => format!("{name} {level}"),
            Command::Speed(multiplier) => format!("{name} {multiplier:.6}"),
            Command::WiiButtons { index, buttons } => {
                format!("{name} {index} {}", buttons.bits())
            }
            Command::GcButtons {
                index,
                buttons,
                sticks,
            } => format!(
                "{name} {index} {} {:.6} {:.6} {:.6} {:.6}",
                buttons.bits(),
                sticks.stick_x,
                sticks.stick_y,
                sticks.substick_x,
                sticks.substick_y
            ),
            Command::Save(filename) | Command::Load(filename) | Command::Insert(filename) => {
                format!("{name} {filename}")
            }
            Command::Pause | Command::Resume | Command::Reset | Command::Stop | Command::Flush => {
                name.to_string()
            }
        };
        Ok(line)
    }
}

/// Reject filenames containing any of [`FORBIDDEN_FILENAME_CHARS`].
pub fn validate_filename(filename: &str) -> Result<()> {
    if filename.contains(FORBIDDEN_FILENAME_CHARS) {
        return Err(ProtocolError::InvalidFilename {
            filename: filename.to_string(),
        });
    }
    Ok(())
}

fn validate_word_aligned(addr: u32) -> Result<()> {
    if addr % 4 != 0 {
        return Err(ProtocolError::MisalignedAddress { addr });
    }
    Ok(())
}
