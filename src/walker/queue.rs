//! Work queue with backpressure support
//!
//! A bounded queue of directory units of work. When the queue is full,
//! backpressure is applied by processing subdirectories inline on the
//! worker that discovered them rather than blocking.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Statistics for the work queue
#[derive(Debug, Default)]
pub struct QueueStats {
    /// Total units enqueued
    pub enqueued: AtomicU64,

    /// Total units dequeued
    pub dequeued: AtomicU64,

    /// Units processed inline due to backpressure
    pub inline_processed: AtomicU64,

    /// Number of times backpressure was applied
    pub backpressure_events: AtomicU64,
}

impl QueueStats {
    pub fn inline_count(&self) -> u64 {
        self.inline_processed.load(Ordering::Relaxed)
    }

    pub fn backpressure_count(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }
}

/// Bounded work queue shared by all workers of one traversal.
pub struct WorkQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
    capacity: usize,
    stats: Arc<QueueStats>,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            stats: Arc::new(QueueStats::default()),
        }
    }

    /// Get a sender for this queue (clone for each worker)
    pub fn sender(&self) -> WorkQueueSender<T> {
        WorkQueueSender {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    /// Get a receiver for this queue (clone for each worker)
    pub fn receiver(&self) -> WorkQueueReceiver<T> {
        WorkQueueReceiver {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }

    pub fn stats(&self) -> Arc<QueueStats> {
        Arc::clone(&self.stats)
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Handle for sending units to the queue
pub struct WorkQueueSender<T> {
    sender: Sender<T>,
    stats: Arc<QueueStats>,
}

// Derived Clone would require T: Clone
impl<T> Clone for WorkQueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> WorkQueueSender<T> {
    /// Try to send a unit to the queue.
    ///
    /// Returns `Ok(true)` if sent, `Ok(false)` on a full queue
    /// (backpressure; the item is handed back), `Err` if disconnected.
    pub fn try_send(&self, unit: T) -> Result<bool, ()> {
        match self.sender.try_send(unit) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                Ok(true)
            }
            Err(TrySendError::Full(_)) => {
                self.stats
                    .backpressure_events
                    .fetch_add(1, Ordering::Relaxed);
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(()),
        }
    }

    /// Record that a unit was processed inline (for stats)
    pub fn record_inline(&self) {
        self.stats.inline_processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle for receiving units from the queue
pub struct WorkQueueReceiver<T> {
    receiver: Receiver<T>,
    stats: Arc<QueueStats>,
}

impl<T> Clone for WorkQueueReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            receiver: self.receiver.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> WorkQueueReceiver<T> {
    /// Receive with timeout, so the worker loop can check its shutdown
    /// flag between units.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        match self.receiver.recv_timeout(timeout) {
            Ok(unit) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(unit)
            }
            Err(_) => None,
        }
    }

    pub fn try_recv(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(unit) => {
                self.stats.dequeued.fetch_add(1, Ordering::Relaxed);
                Some(unit)
            }
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_basic() {
        let queue: WorkQueue<String> = WorkQueue::new(10);
        let sender = queue.sender();
        let receiver = queue.receiver();

        sender.try_send("/test".into()).unwrap();
        assert!(!queue.is_empty());
        assert_eq!(queue.len(), 1);

        let unit = receiver.try_recv().unwrap();
        assert_eq!(unit, "/test");
        assert!(queue.is_empty());
        assert_eq!(queue.stats().dequeued.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_queue_backpressure() {
        let queue: WorkQueue<u32> = WorkQueue::new(2);
        let sender = queue.sender();

        assert!(sender.try_send(1).unwrap());
        assert!(sender.try_send(2).unwrap());

        // Queue is full - should return false (backpressure)
        assert!(!sender.try_send(3).unwrap());
        assert_eq!(queue.stats().backpressure_count(), 1);

        sender.record_inline();
        assert_eq!(queue.stats().inline_count(), 1);
    }
}
