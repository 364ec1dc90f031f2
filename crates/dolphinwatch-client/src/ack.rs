//! Single-slot rendezvous for `SUCCESS`/`FAIL` acknowledgements.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AckState {
    /// Nothing has been requested yet.
    Idle,
    /// A command is waiting for its acknowledgement.
    Pending,
    /// The last request was answered (or failed by a disconnect).
    Resolved(bool),
}

/// Holds at most one outstanding acknowledgement.
///
/// The server does not tag acknowledgements with a request id; an answer
/// resolves whatever request is pending when it arrives.
#[derive(Debug)]
pub struct AckSlot {
    state: Mutex<AckState>,
    changed: Condvar,
}

impl Default for AckSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl AckSlot {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AckState::Idle),
            changed: Condvar::new(),
        }
    }

    /// Wait up to `timeout` for a pending acknowledgement to resolve.
    ///
    /// Returns false if it was still pending when the timeout expired.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while *state == AckState::Pending {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .changed
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Arm a fresh slot for the next request.
    pub fn arm(&self) {
        *self.lock() = AckState::Pending;
    }

    /// Resolve the pending request with the server's answer.
    ///
    /// Answers arriving with nothing pending are dropped.
    pub fn resolve(&self, success: bool) {
        let mut state = self.lock();
        if *state != AckState::Pending {
            debug!(success, "acknowledgement without pending request ignored");
            return;
        }
        *state = AckState::Resolved(success);
        self.changed.notify_all();
    }

    /// Resolve a pending request to failure. Used on disconnect.
    pub fn fail_pending(&self) {
        let mut state = self.lock();
        if *state == AckState::Pending {
            *state = AckState::Resolved(false);
            self.changed.notify_all();
        }
    }

    /// Block until the armed request resolves.
    ///
    /// Returns `None` if `timeout` expires first.
    pub fn wait(&self, timeout: Option<Duration>) -> Option<bool> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock();
        loop {
            match *state {
                AckState::Resolved(success) => return Some(success),
                AckState::Idle => return Some(false),
                AckState::Pending => {}
            }
            state = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    self.changed
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                None => self
                    .changed
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Returns true while a request is waiting for its acknowledgement.
    pub fn is_pending(&self) -> bool {
        *self.lock() == AckState::Pending
    }

    fn lock(&self) -> MutexGuard<'_, AckState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn resolves_with_server_answer() {
        let slot = Arc::new(AckSlot::new());
        slot.arm();

        let resolver = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                slot.resolve(true);
            })
        };

        assert_eq!(slot.wait(None), Some(true));
        resolver.join().unwrap();

        slot.arm();
        slot.resolve(false);
        assert_eq!(slot.wait(None), Some(false));
    }

    #[test]
    fn disconnect_unblocks_waiter() {
        let slot = Arc::new(AckSlot::new());
        slot.arm();

        let waiter = {
            let slot = Arc::clone(&slot);
            thread::spawn(move || slot.wait(None))
        };

        thread::sleep(Duration::from_millis(20));
        slot.fail_pending();
        assert_eq!(waiter.join().unwrap(), Some(false));
    }

    #[test]
    fn wait_times_out() {
        let slot = AckSlot::new();
        slot.arm();
        assert_eq!(slot.wait(Some(Duration::from_millis(20))), None);
        assert!(slot.is_pending());
    }

    #[test]
    fn drain_waits_for_pending_then_gives_up() {
        let slot = AckSlot::new();
        assert!(slot.drain(Duration::from_millis(10)));

        slot.arm();
        let started = Instant::now();
        assert!(!slot.drain(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));

        slot.resolve(true);
        assert!(slot.drain(Duration::from_millis(10)));
    }

    #[test]
    fn stray_answers_are_ignored() {
        let slot = AckSlot::new();
        slot.resolve(true);
        assert!(!slot.is_pending());

        slot.arm();
        slot.resolve(false);
        slot.resolve(true);
        assert_eq!(slot.wait(None), Some(false));
    }

    #[test]
    fn fail_pending_without_request_is_noop() {
        let slot = AckSlot::new();
        slot.fail_pending();
        slot.arm();
        assert!(slot.is_pending());
    }
}
