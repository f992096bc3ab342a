//! Generation-counted retry timer.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::event::MachineInput;
use crate::provider::Envelope;

/// Schedules [`MachineInput::RetryFired`] after a delay.
///
/// At most one timer is pending: scheduling a new one aborts the previous
/// timer. The fired input carries its generation, so even a timer that
/// escaped the abort is rejected by the state machine.
#[derive(Debug)]
pub struct RetryScheduler {
    tx: mpsc::UnboundedSender<Envelope>,
    pending: Option<(u64, JoinHandle<()>)>,
}

impl RetryScheduler {
    /// Creates a scheduler that fires into `tx`.
    pub fn new(tx: mpsc::UnboundedSender<Envelope>) -> Self {
        Self { tx, pending: None }
    }

    /// Schedules a retry for `generation` after `delay`.
    pub fn schedule(&mut self, delay: Duration, generation: u64) {
        self.cancel();

        debug!(generation, delay = ?delay, "Retry scheduled");
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(generation, "Retry timer fired");
            let _ = tx.send(Envelope::internal(MachineInput::RetryFired { generation }));
        });
        self.pending = Some((generation, handle));
    }

    /// Aborts the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some((generation, handle)) = self.pending.take()
            && !handle.is_finished()
        {
            trace!(generation, "Retry timer cancelled");
            handle.abort();
        }
    }

    /// Generation of the pending timer.
    pub fn pending_generation(&self) -> Option<u64> {
        self.pending
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(generation, _)| *generation)
    }
}

impl Drop for RetryScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
