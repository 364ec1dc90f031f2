//! Routing of framed server messages and handler execution.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use dolphinwatch_protocol::{parse_message, Message};
use tracing::{debug, error, trace, warn};

use crate::ack::AckSlot;
use crate::error::ClientError;
use crate::registry::{CallbackRegistry, MemoryHandler, MemoryValue};
use crate::sink::LogSink;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Pool of handler threads.
///
/// Every address maps to one lane, so deliveries for the same address run in
/// arrival order. Lanes start on first use and are restarted if their thread
/// went away.
pub(crate) struct Dispatcher {
    lanes: Vec<Mutex<Option<Sender<Job>>>>,
}

impl Dispatcher {
    pub(crate) fn new(workers: usize) -> Self {
        let lanes = (0..workers.max(1)).map(|_| Mutex::new(None)).collect();
        Self { lanes }
    }

    #[cfg(test)]
    fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Run `handler(value)` on the lane owning `addr`.
    pub(crate) fn dispatch(&self, addr: u32, handler: MemoryHandler, value: MemoryValue) {
        let index = addr as usize % self.lanes.len();
        let job: Job = Box::new(move || run_handler(addr, &handler, value));

        let mut lane = self.lanes[index]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let job = match lane.as_ref() {
            Some(sender) => match sender.send(job) {
                Ok(()) => return,
                Err(mpsc::SendError(job)) => job,
            },
            None => job,
        };

        match spawn_lane(index) {
            Ok(sender) => {
                if let Err(mpsc::SendError(job)) = sender.send(job) {
                    // The new lane died before taking work.
                    run_inline(lane, job);
                    return;
                }
                *lane = Some(sender);
            }
            Err(err) => {
                warn!(lane = index, error = %err, "failed to start handler thread, running inline");
                run_inline(lane, job);
            }
        }
    }
}

/// Run `job` on the calling thread with the lane lock released.
fn run_inline(mut lane: MutexGuard<'_, Option<Sender<Job>>>, job: Job) {
    *lane = None;
    drop(lane);
    job();
}

fn spawn_lane(index: usize) -> std::io::Result<Sender<Job>> {
    let (sender, receiver) = mpsc::channel::<Job>();
    thread::Builder::new()
        .name(format!("dolphinwatch-handler-{index}"))
        .spawn(move || {
            for job in receiver {
                job();
            }
        })?;
    debug!(lane = index, "handler thread started");
    Ok(sender)
}

/// Invoke a handler, logging its failures instead of propagating them.
fn run_handler(addr: u32, handler: &MemoryHandler, value: MemoryValue) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(value))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            if matches!(err.downcast_ref::<ClientError>(), Some(ClientError::NotConnected)) {
                debug!(
                    addr = format_args!("{addr:#x}"),
                    "memory handler ran after disconnect: {err}"
                );
            } else {
                error!(addr = format_args!("{addr:#x}"), error = %err, "memory handler failed");
            }
        }
        Err(payload) => {
            error!(
                addr = format_args!("{addr:#x}"),
                panic = panic_message(payload.as_ref()),
                "memory handler panicked"
            );
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

/// Classifies framed lines and sends each to its consumer.
pub(crate) struct Inbound {
    pub(crate) registry: Arc<CallbackRegistry>,
    pub(crate) ack: Arc<AckSlot>,
    pub(crate) log_sink: Arc<dyn LogSink>,
    pub(crate) dispatcher: Arc<Dispatcher>,
}

impl Inbound {
    pub(crate) fn route(&self, line: &str) {
        if line.is_empty() {
            return;
        }
        trace!(line, "received");

        let message = match parse_message(line) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "discarding malformed message");
                return;
            }
        };

        match message {
            Message::Mem { addr, value } => self.deliver(addr, MemoryValue::Single(value)),
            Message::MemMulti { addr, values } => self.deliver(addr, MemoryValue::Multi(values)),
            Message::Success => self.ack.resolve(true),
            Message::Fail => self.ack.resolve(false),
            Message::Log { level, text } => self.log_sink.log(level, &text),
            Message::Unknown(line) => warn!(line = %line, "unrecognized command from server"),
        }
    }

    fn deliver(&self, addr: u32, value: MemoryValue) {
        match self.registry.take_for_delivery(addr) {
            Some(handler) => self.dispatcher.dispatch(addr, handler, value),
            None => warn!(
                addr = format_args!("{addr:#x}"),
                "received data for address without a registered callback"
            ),
        }
    }
}
