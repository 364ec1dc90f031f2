use std::sync::mpsc;

use dolphinwatch_client::{AccessMode, MemoryValue};

use crate::cmd::{ReadArgs, ServerOptions};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_memory, OutputFormat};

pub fn run(args: ReadArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    let connection = server.connect()?;
    let mode = AccessMode::from(args.width);

    let (tx, rx) = mpsc::channel::<MemoryValue>();
    connection
        .read(mode, args.address, move |value| {
            tx.send(value)?;
            Ok(())
        })
        .map_err(|err| client_error("read failed", err))?;

    let value = rx.recv_timeout(server.timeout);
    connection.disconnect();

    let value = value.map_err(|_| {
        CliError::new(
            TIMEOUT,
            format!(
                "no value for {:#010x} within {:?}",
                args.address, server.timeout
            ),
        )
    })?;
    print_memory(args.address, Some(mode.bits()), &value, format);
    Ok(SUCCESS)
}
