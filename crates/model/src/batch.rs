//! Queue of transactions waiting to be applied together.
//!
//! The queue holds a deadline set when its first transaction arrives.
//! Draining takes every queued transaction at once and clears the deadline,
//! so transactions submitted afterwards start a fresh batch.

use crossbeam_channel::{bounded, Receiver, Sender};
use rowflow_store::{Transaction, TransactionResult};
use std::time::{Duration, Instant};

/// Called with the result of a batched transaction after the refresh.
pub type BatchCallback = Box<dyn FnOnce(&TransactionResult)>;

/// A transaction waiting in the queue.
pub struct PendingTransaction {
    pub transaction: Transaction,
    callback: Option<BatchCallback>,
    sender: Sender<TransactionResult>,
}

impl PendingTransaction {
    /// Delivers the result to the callback and the receiver.
    ///
    /// A dropped receiver is not an error: the caller chose not to wait.
    pub fn complete(self, result: TransactionResult) {
        if let Some(callback) = self.callback {
            callback(&result);
        }
        let _ = self.sender.send(result);
    }
}

/// Transactions queued until a deadline or an explicit flush.
#[derive(Default)]
pub struct BatchQueue {
    pending: Vec<PendingTransaction>,
    deadline: Option<Instant>,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a transaction and returns the receiver of its result.
    ///
    /// The first transaction of a batch sets the deadline to `now + wait`.
    pub fn push(
        &mut self,
        transaction: Transaction,
        callback: Option<BatchCallback>,
        now: Instant,
        wait: Duration,
    ) -> Receiver<TransactionResult> {
        let (sender, receiver) = bounded(1);
        if self.deadline.is_none() {
            self.deadline = Some(now + wait);
        }
        self.pending.push(PendingTransaction {
            transaction,
            callback,
            sender,
        });
        receiver
    }

    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the deadline has passed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes every queued transaction and cancels the deadline.
    pub fn drain(&mut self) -> Vec<PendingTransaction> {
        self.deadline = None;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::TryRecvError;

    #[test]
    fn test_deadline_set_by_first_push() {
        let mut queue = BatchQueue::new();
        let start = Instant::now();
        let wait = Duration::from_millis(50);

        let _first = queue.push(Transaction::new(), None, start, wait);
        let _second = queue.push(Transaction::new(), None, start + Duration::from_millis(30), wait);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.deadline(), Some(start + wait));
        assert!(!queue.is_due(start + Duration::from_millis(49)));
        assert!(queue.is_due(start + wait));
    }

    #[test]
    fn test_drain_starts_fresh_batch() {
        let mut queue = BatchQueue::new();
        let start = Instant::now();
        let wait = Duration::from_millis(10);

        let receiver = queue.push(Transaction::new(), None, start, wait);
        let drained = queue.drain();
        assert_eq!(drained.len(), 1);
        assert!(queue.is_empty());
        assert_eq!(queue.deadline(), None);

        assert_eq!(receiver.try_recv(), Err(TryRecvError::Empty));
        for pending in drained {
            pending.complete(TransactionResult::default());
        }
        assert_eq!(receiver.try_recv(), Ok(TransactionResult::default()));

        let later = start + Duration::from_millis(100);
        let _next = queue.push(Transaction::new(), None, later, wait);
        assert_eq!(queue.deadline(), Some(later + wait));
    }

    #[test]
    fn test_complete_with_dropped_receiver() {
        let mut queue = BatchQueue::new();
        let receiver = queue.push(Transaction::new(), None, Instant::now(), Duration::ZERO);
        drop(receiver);
        for pending in queue.drain() {
            pending.complete(TransactionResult::default());
        }
    }
}
