//! Cancel-and-restart debounce for continuous scanner input.
//!
//! Every input change aborts the pending submission and schedules a new one bound to the
//! latest value. Only the value that survives the quiet period is delivered; earlier
//! values are dropped, never queued.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tracing::trace;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
/// Inputs of three characters or fewer are never auto-submitted.
pub const DEFAULT_MIN_AUTO_SUBMIT_LEN: usize = 4;

pub struct ScanDebouncer {
    delay: Duration,
    min_len: usize,
    pending: Option<JoinHandle<()>>,
    tx: UnboundedSender<String>,
}

impl ScanDebouncer {
    /// Must be called inside a tokio runtime. Submitted values arrive on the returned
    /// receiver.
    pub fn new(delay: Duration, min_len: usize) -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                delay,
                min_len,
                pending: None,
                tx,
            },
            rx,
        )
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns whether a submission was scheduled for `value`.
    pub fn input_changed(&mut self, value: &str) -> bool {
        self.cancel();
        let value = value.trim();
        if value.chars().count() < self.min_len {
            return false;
        }

        let tx = self.tx.clone();
        let delay = self.delay;
        let value = value.to_string();
        trace!(%value, ?delay, "scheduling debounced submit");
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(value);
        }));
        true
    }

    /// Bypasses the timer, e.g. on an explicit Enter.
    pub fn submit_now(&mut self, value: &str) {
        self.cancel();
        let _ = self.tx.send(value.trim().to_string());
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.is_finished())
    }
}

impl Drop for ScanDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
