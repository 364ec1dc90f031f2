use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use dolphinwatch_client::MemoryValue;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MemoryOutput {
    address: u32,
    address_hex: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    width: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<Vec<u8>>,
    timestamp: String,
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    argument: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    success: Option<bool>,
    host: &'a str,
    port: u16,
}

/// Print a memory value received for `addr`.
pub fn print_memory(addr: u32, width: Option<u8>, value: &MemoryValue, format: OutputFormat) {
    let out = MemoryOutput {
        address: addr,
        address_hex: format!("{addr:#010x}"),
        width,
        value: value.as_u32(),
        bytes: value.as_bytes().map(<[u8]>::to_vec),
        timestamp: now_unix_seconds(),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let width = out.width.map_or_else(|| "multi".to_string(), |w| w.to_string());
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ADDRESS", "WIDTH", "VALUE", "HEX"])
                .add_row(vec![
                    out.address_hex.clone(),
                    width,
                    value_text(value),
                    value_hex(value),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} = {} ({})",
                out.address_hex,
                value_text(value),
                value_hex(value)
            );
        }
    }
}

/// Print the outcome of a command sent to `host:port`.
///
/// `success` is only set for acknowledged commands.
pub fn print_command(
    command: &str,
    argument: Option<&str>,
    success: Option<bool>,
    host: &str,
    port: u16,
    format: OutputFormat,
) {
    let out = CommandOutput {
        command,
        argument,
        success,
        host,
        port,
    };
    let status = match success {
        Some(true) => "success",
        Some(false) => "failed",
        None => "sent",
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["COMMAND", "ARGUMENT", "STATUS", "SERVER"])
                .add_row(vec![
                    command.to_string(),
                    argument.unwrap_or("-").to_string(),
                    status.to_string(),
                    format!("{host}:{port}"),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match argument {
            Some(argument) => println!("{command} {argument}: {status}"),
            None => println!("{command}: {status}"),
        },
    }
}

fn value_text(value: &MemoryValue) -> String {
    match value {
        MemoryValue::Single(value) => value.to_string(),
        MemoryValue::Multi(bytes) => bytes
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn value_hex(value: &MemoryValue) -> String {
    match value {
        MemoryValue::Single(value) => format!("{value:#x}"),
        MemoryValue::Multi(bytes) => bytes
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
