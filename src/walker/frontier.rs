//! Frontier queues
//!
//! Object ids waiting to be expanded in the next wave. Appends come from
//! many tasks at once; the coordinator drains the whole queue at the start
//! of each phase. Duplicates are allowed here, the claim registry filters
//! them out when the id is expanded.

use crossbeam_channel::{unbounded, Receiver, Sender};

/// Unbounded, lock-free append queue drained once per wave
#[derive(Debug)]
pub struct Frontier<T = String> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> Frontier<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Queue an id for the next wave
    pub fn push(&self, item: impl Into<T>) {
        // Both ends live in self, so the channel cannot be disconnected
        let _ = self.sender.send(item.into());
    }

    /// Take every queued id, leaving the frontier empty
    ///
    /// Ids pushed while draining are either returned or left for the next
    /// drain; none are lost.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }

    /// Current queue length
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

impl<T> Default for Frontier<T> {
    fn default() -> Self {
        Self::new()
    }
}
