//! Change notification for the request registry.
//!
//! sled hands each `watch_prefix` subscriber a bounded buffer and blocks
//! writers once it is full, so a viewer that stops polling would stall every
//! write. Instead, one thread per registry drains the watcher as fast as
//! events arrive and folds them into a version counter. Subscriptions wait on
//! the counter and re-read the registry when it moves.
use super::error::{Result, SnackError};
use sled::Tree;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Default)]
struct State {
    version: u64,
    closed: bool,
}

#[derive(Debug, Default)]
pub(crate) struct ChangeSignal {
    state: Mutex<State>,
    changed: Condvar,
}

impl ChangeSignal {
    /// Start draining changes to `tree`. The thread stops once the tree is
    /// gone or nobody holds the signal any more.
    pub(crate) fn watch(tree: &Tree) -> Result<Arc<Self>> {
        let signal = Arc::new(Self::default());
        let forward = Arc::downgrade(&signal);
        let events = tree.watch_prefix(b"");

        thread::Builder::new()
            .name("request-watcher".into())
            .spawn(move || {
                for _event in events {
                    let Some(signal) = forward.upgrade() else {
                        debug!("request watcher released");
                        return;
                    };
                    signal.bump();
                }
                if let Some(signal) = forward.upgrade() {
                    signal.close();
                }
                debug!("request watcher stopped");
            })?;

        Ok(signal)
    }

    pub(crate) fn version(&self) -> u64 {
        self.lock().version
    }

    /// Wait until the version differs from `seen`. Returns the new version,
    /// or `None` once `timeout` has passed. `None` as timeout waits forever.
    pub(crate) fn wait_past(&self, seen: u64, timeout: Option<Duration>) -> Result<Option<u64>> {
        let deadline = timeout.and_then(|timeout| Instant::now().checked_add(timeout));
        let mut state = self.lock();
        loop {
            if state.version != seen {
                return Ok(Some(state.version));
            }
            if state.closed {
                return Err(SnackError::SubscriptionClosed);
            }

            state = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return Ok(None);
                    }
                    self.changed
                        .wait_timeout(state, remaining)
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

    fn bump(&self) {
        let mut state = self.lock();
        state.version = state.version.wrapping_add(1);
        self.changed.notify_all();
    }

    fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
