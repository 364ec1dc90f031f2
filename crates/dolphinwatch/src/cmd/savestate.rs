use dolphinwatch_protocol::validate_filename;

use crate::cmd::{FileArgs, ServerOptions};
use crate::exit::{client_error, CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn save(args: FileArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    check_filename(&args.filename)?;
    let connection = server.connect()?;

    let result = connection.save(&args.filename);
    connection.disconnect();
    result.map_err(|err| client_error("save failed", err))?;

    print_command(
        "SAVE",
        Some(&args.filename),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}

/// Exits with [`FAILURE`] when the server reports the load failed.
pub fn load(args: FileArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    check_filename(&args.filename)?;
    let connection = server.connect()?;

    let result = connection.load(&args.filename);
    connection.disconnect();
    let success = result.map_err(|err| client_error("load failed", err))?;

    print_command(
        "LOAD",
        Some(&args.filename),
        Some(success),
        &server.host,
        server.port,
        format,
    );
    Ok(if success { SUCCESS } else { FAILURE })
}

pub fn insert(args: FileArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    check_filename(&args.filename)?;
    let connection = server.connect()?;

    let result = connection.insert(&args.filename);
    connection.disconnect();
    result.map_err(|err| client_error("insert failed", err))?;

    print_command(
        "INSERT",
        Some(&args.filename),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}

// Checked before connecting so a bad name never costs a round trip.
fn check_filename(filename: &str) -> CliResult<()> {
    validate_filename(filename).map_err(|err| CliError::new(DATA_INVALID, err.to_string()))
}
