use std::sync::mpsc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use dolphinwatch_client::{AccessMode, ConnectionConfig, DolphinConnection};

use crate::exit::{CliError, CliResult, TRANSPORT_ERROR, USAGE};
use crate::output::OutputFormat;

pub mod control;
pub mod read;
pub mod savestate;
pub mod version;
pub mod watch;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a memory value once.
    Read(ReadArgs),
    /// Print a memory value every time it changes.
    Watch(WatchArgs),
    /// Write a memory value.
    Write(WriteArgs),
    /// Write consecutive bytes.
    WriteBytes(WriteBytesArgs),
    /// Pause, resume, reset or stop emulation.
    Control(ControlArgs),
    /// Set the audio volume.
    Volume(VolumeArgs),
    /// Set the emulation speed.
    Speed(SpeedArgs),
    /// Save a savestate.
    Save(FileArgs),
    /// Load a savestate and report whether it succeeded.
    Load(FileArgs),
    /// Insert a game image.
    Insert(FileArgs),
    /// Show version information.
    Version(VersionArgs),
}

/// Where and how to reach the server.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl ServerOptions {
    /// Connect, turning a failed attempt into a transport error.
    pub fn connect(&self) -> CliResult<DolphinConnection> {
        let config = ConnectionConfig {
            connect_timeout: Some(self.timeout),
            write_timeout: Some(self.timeout),
            ack_timeout: Some(self.timeout),
            ..ConnectionConfig::default()
        };
        let connection = DolphinConnection::with_config(&*self.host, self.port, config, None);

        let (tx, rx) = mpsc::channel();
        connection.on_disconnect(move |_, reason| {
            let _ = tx.send(reason);
        });
        connection.connect();

        if !connection.is_connected() {
            let reason = rx
                .try_recv()
                .map_or_else(|_| "not connected".to_string(), |reason| reason.to_string());
            return Err(CliError::new(
                TRANSPORT_ERROR,
                format!("connect to {}:{} failed: {reason}", self.host, self.port),
            ));
        }
        connection.clear_on_disconnect();
        Ok(connection)
    }
}

pub fn run(command: Command, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Read(args) => read::run(args, server, format),
        Command::Watch(args) => watch::run(args, server, format),
        Command::Write(args) => write::run(args, server, format),
        Command::WriteBytes(args) => write::run_bytes(args, server, format),
        Command::Control(args) => control::run(args, server, format),
        Command::Volume(args) => control::run_volume(args, server, format),
        Command::Speed(args) => control::run_speed(args, server, format),
        Command::Save(args) => savestate::save(args, server, format),
        Command::Load(args) => savestate::load(args, server, format),
        Command::Insert(args) => savestate::insert(args, server, format),
        Command::Version(args) => version::run(args),
    }
}

/// Access width of a memory command.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Width {
    #[value(name = "8")]
    Bits8,
    #[value(name = "16")]
    Bits16,
    #[value(name = "32")]
    Bits32,
}

impl From<Width> for AccessMode {
    fn from(width: Width) -> Self {
        match width {
            Width::Bits8 => AccessMode::Bits8,
            Width::Bits16 => AccessMode::Bits16,
            Width::Bits32 => AccessMode::Bits32,
        }
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Memory address (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Access width in bits.
    #[arg(long, short = 'w', default_value = "32")]
    pub width: Width,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Memory address (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Access width in bits.
    #[arg(long, short = 'w', default_value = "32", conflicts_with = "size")]
    pub width: Width,
    /// Watch a block of SIZE bytes instead of a single value.
    #[arg(long)]
    pub size: Option<u32>,
    /// Exit after N updates.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Memory address (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Value to write (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub value: u32,
    /// Access width in bits.
    #[arg(long, short = 'w', default_value = "32")]
    pub width: Width,
}

#[derive(Args, Debug)]
pub struct WriteBytesArgs {
    /// Start address (decimal or 0x-prefixed hex).
    #[arg(value_parser = parse_address)]
    pub address: u32,
    /// Bytes to write, in address order.
    #[arg(required = true, value_parser = parse_byte)]
    pub bytes: Vec<u8>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ControlAction {
    Pause,
    Resume,
    Reset,
    Stop,
}

#[derive(Args, Debug)]
pub struct ControlArgs {
    pub action: ControlAction,
}

#[derive(Args, Debug)]
pub struct VolumeArgs {
    /// Volume level, 0-100.
    #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: u8,
}

#[derive(Args, Debug)]
pub struct SpeedArgs {
    /// Speed multiplier; 1.0 is normal speed.
    pub multiplier: f32,
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Path on the machine running the emulator.
    pub filename: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_address(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(&hex.replace('_', ""), 16),
        None => input.replace('_', "").parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input:?}"))
}

fn parse_byte(input: &str) -> Result<u8, String> {
    let value = parse_address(input)?;
    u8::try_from(value).map_err(|_| format!("byte out of range: {input:?}"))
}

/// Parse `5s`, `500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
