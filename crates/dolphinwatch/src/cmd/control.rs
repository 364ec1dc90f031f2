use crate::cmd::{ControlAction, ControlArgs, ServerOptions, SpeedArgs, VolumeArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_command, OutputFormat};

pub fn run(args: ControlArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    let connection = server.connect()?;

    let (name, result) = match args.action {
        ControlAction::Pause => ("PAUSE", connection.pause()),
        ControlAction::Resume => ("RESUME", connection.resume()),
        ControlAction::Reset => ("RESET", connection.reset()),
        ControlAction::Stop => ("STOP", connection.stop()),
    };
    connection.disconnect();
    result.map_err(|err| client_error("control failed", err))?;

    print_command(name, None, None, &server.host, server.port, format);
    Ok(SUCCESS)
}

pub fn run_volume(args: VolumeArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    let connection = server.connect()?;

    let result = connection.volume(args.level);
    connection.disconnect();
    result.map_err(|err| client_error("volume failed", err))?;

    let argument = args.level.to_string();
    print_command(
        "VOLUME",
        Some(&argument),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}

pub fn run_speed(args: SpeedArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    if !args.multiplier.is_finite() || args.multiplier < 0.0 {
        return Err(CliError::new(
            USAGE,
            format!("speed must be a non-negative number, got {}", args.multiplier),
        ));
    }
    let connection = server.connect()?;

    let result = connection.speed(args.multiplier);
    connection.disconnect();
    result.map_err(|err| client_error("speed failed", err))?;

    let argument = args.multiplier.to_string();
    print_command(
        "SPEED",
        Some(&argument),
        None,
        &server.host,
        server.port,
        format,
    );
    Ok(SUCCESS)
}
