mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;
use dolphinwatch_transport::{DEFAULT_HOST, DEFAULT_PORT};

use crate::cmd::{parse_duration, Command, ServerOptions};
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "dolphinwatch", version, about = "Remote control for the Dolphin emulator")]
struct Cli {
    /// Server host.
    #[arg(long, env = "DOLPHINWATCH_HOST", default_value = DEFAULT_HOST, global = true)]
    host: String,

    /// Server port.
    #[arg(long, env = "DOLPHINWATCH_PORT", default_value_t = DEFAULT_PORT, global = true)]
    port: u16,

    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", global = true)]
    timeout: String,

    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = parse_duration(&cli.timeout).and_then(|timeout| {
        let server = ServerOptions {
            host: cli.host,
            port: cli.port,
            timeout,
        };
        cmd::run(cli.command, &server, format)
    });

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
