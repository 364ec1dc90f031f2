use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use dolphinwatch_client::{AccessMode, HandlerResult, MemoryValue};

use crate::cmd::{ServerOptions, WatchArgs};
use crate::exit::{client_error, CliError, CliResult, INTERNAL, SUCCESS, TRANSPORT_ERROR};
use crate::output::{print_memory, OutputFormat};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn run(args: WatchArgs, server: &ServerOptions, format: OutputFormat) -> CliResult<i32> {
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let connection = server.connect()?;
    let (tx, rx) = mpsc::channel::<MemoryValue>();
    let forward = move |value: MemoryValue| -> HandlerResult {
        tx.send(value)?;
        Ok(())
    };

    let width = match args.size {
        Some(size) => {
            connection
                .subscribe_multi(size, args.address, forward)
                .map_err(|err| client_error("subscribe failed", err))?;
            None
        }
        None => {
            let mode = AccessMode::from(args.width);
            connection
                .subscribe(mode, args.address, forward)
                .map_err(|err| client_error("subscribe failed", err))?;
            Some(mode.bits())
        }
    };

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(value) => {
                print_memory(args.address, width, &value, format);
                printed = printed.saturating_add(1);
                if args.count.is_some_and(|count| printed >= count) {
                    break;
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                if !connection.is_connected() {
                    return Err(CliError::new(TRANSPORT_ERROR, "connection closed by server"));
                }
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    let unsubscribed = match args.size {
        Some(_) => connection.unsubscribe_multi(args.address),
        None => connection.unsubscribe(args.address),
    };
    if let Err(err) = unsubscribed {
        tracing::debug!(error = %err, "unsubscribe on exit failed");
    }
    connection.disconnect();
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
