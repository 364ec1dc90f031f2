use dolphinwatch_client::AccessMode;

use crate::cmd::{ServerOptions, WriteArgs, WriteBytesArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn run(args: WriteArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    let connection = server.connect()?;
    let mode = AccessMode::from(args.width);

    let result = connection.write(mode, args.address, args.value);
    connection.disconnect();
    result.map_err(|err| client_error("write failed", err))?;

    let argument = format!("{:#010x} {}", args.address, args.value);
    print_command(
        "WRITE",
        Some(&argument),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}

pub fn run_bytes(
    args: WriteBytesArgs,
    server: &ServerOptions,
    format: OutputFormat,
) -> CliResult<i32> {
    let connection = server.connect()?;

    let result = connection.write_multi(args.address, &args.bytes);
    connection.disconnect();
    result.map_err(|err| client_error("write failed", err))?;

    let argument = format!("{:#010x} ({} bytes)", args.address, args.bytes.len());
    print_command(
        "WRITE_MULTI",
        Some(&argument),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}
