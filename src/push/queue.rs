/// Per-sensor submission queues of readings awaiting delivery
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::Reading;

/// Readings are kept ordered by timestamp within each sensor's queue. A reading
/// leaves its queue only when drained for a push attempt and comes back through
/// [`SubmissionQueue::requeue`] if that attempt fails.
#[derive(Debug, Default)]
pub struct SubmissionQueue {
    queues: Mutex<HashMap<String, Vec<Reading>>>,
    queued: AtomicU64,
    pushed: AtomicU64,
}

fn insert_ordered(queue: &mut Vec<Reading>, reading: Reading) {
    // Equal timestamps keep arrival order
    let at = queue.partition_point(|r| r.timestamp <= reading.timestamp);
    queue.insert(at, reading);
}

impl SubmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Reading>>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn submit(&self, reading: Reading) {
        let mut queues = self.lock();
        let queue = queues.entry(reading.sensor_id.clone()).or_default();
        insert_ordered(queue, reading);
        self.queued.fetch_add(1, Ordering::Relaxed);
    }

    /// Take every pending reading, one timestamp-ordered batch per sensor
    pub fn drain_all(&self) -> Vec<(String, Vec<Reading>)> {
        let mut queues = self.lock();
        let mut batches: Vec<(String, Vec<Reading>)> = queues
            .iter_mut()
            .filter(|(_, queue)| !queue.is_empty())
            .map(|(id, queue)| (id.clone(), std::mem::take(queue)))
            .collect();
        batches.sort_by(|a, b| a.0.cmp(&b.0));
        batches
    }

    /// Put an undelivered batch back, keeping original timestamps
    pub fn requeue(&self, sensor_id: &str, batch: Vec<Reading>) {
        let mut queues = self.lock();
        let queue = queues.entry(sensor_id.to_string()).or_default();
        for reading in batch {
            insert_ordered(queue, reading);
        }
    }

    /// Record a batch as accepted by the collector
    pub fn mark_delivered(&self, count: usize) {
        self.queued.fetch_sub(count as u64, Ordering::Relaxed);
        self.pushed.fetch_add(count as u64, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn pending(&self, sensor_id: &str) -> Vec<Reading> {
        self.lock().get(sensor_id).cloned().unwrap_or_default()
    }

    /// (queued, pushed) since start
    pub fn counts(&self) -> (u64, u64) {
        (
            self.queued.load(Ordering::Relaxed),
            self.pushed.load(Ordering::Relaxed),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Measurement;

    fn reading(sensor_id: &str, timestamp: i64, value: f64) -> Reading {
        let mut measurement = Measurement::new();
        measurement.insert("temperature".to_string(), value);
        Reading {
            sensor_id: sensor_id.to_string(),
            timestamp,
            measurement,
        }
    }

    #[test]
    fn drains_timestamp_ordered_batches() {
        let queue = SubmissionQueue::new();
        queue.submit(reading("B", 300, 3.0));
        queue.submit(reading("A", 200, 2.0));
        queue.submit(reading("B", 100, 1.0));
        queue.submit(reading("B", 200, 2.0));

        let batches = queue.drain_all();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0, "A");
        let stamps: Vec<i64> = batches[1].1.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![100, 200, 300]);

        assert!(queue.drain_all().is_empty());
        assert_eq!(queue.counts(), (4, 0));
    }

    #[test]
    fn requeued_batch_reappears_unchanged() {
        let queue = SubmissionQueue::new();
        queue.submit(reading("A", 100, 1.0));
        queue.submit(reading("A", 160, 2.0));

        let (id, batch) = queue.drain_all().remove(0);
        let original = batch.clone();
        // A newer reading lands while the batch is in flight
        queue.submit(reading("A", 220, 3.0));
        queue.requeue(&id, batch);

        let pending = queue.pending("A");
        assert_eq!(pending.len(), 3);
        assert_eq!(&pending[..2], &original[..]);
        assert_eq!(pending[2].timestamp, 220);
        assert_eq!(queue.counts(), (3, 0));
    }

    #[test]
    fn delivery_moves_counts() {
        let queue = SubmissionQueue::new();
        queue.submit(reading("A", 100, 1.0));
        queue.submit(reading("A", 200, 1.0));
        let (_, batch) = queue.drain_all().remove(0);
        queue.mark_delivered(batch.len());
        assert_eq!(queue.counts(), (0, 2));
        assert!(queue.pending("A").is_empty());
    }
}
