//! Clear-Scan Debouncer
//!
//! Coalesces repeated maintenance requests into one delayed message posted
//! back to the coordinator's inbox.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct ClearScanDebouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl ClearScanDebouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    /// Schedule `due` to be posted after the delay. No-op while a previous
    /// trigger is still pending. Returns whether a new delay was scheduled.
    pub fn trigger<M>(&mut self, inbox: &mpsc::UnboundedSender<M>, due: M) -> bool
    where
        M: Send + 'static,
    {
        if self.pending.is_some() {
            return false;
        }

        let inbox = inbox.clone();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = inbox.send(due);
        }));
        debug!("Clear-scan scheduled in {:?}", delay);
        true
    }

    /// Mark the pending delay as consumed. Must be called before running the
    /// maintenance action so that triggers during it schedule a fresh delay.
    pub fn fire(&mut self) {
        self.pending = None;
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for ClearScanDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
