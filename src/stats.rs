/// Ingestion counters shared between the reader, decoder and status workers
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct FrameStats {
    pub bytes: AtomicU64,
    pub dropped_bytes: AtomicU64,
    pub identified: AtomicU64,
    pub processed: AtomicU64,
    pub rejected: AtomicU64,
    pub resolution_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub bytes: u64,
    pub dropped_bytes: u64,
    pub identified: u64,
    pub processed: u64,
    pub rejected: u64,
    pub resolution_failures: u64,
}

impl FrameStats {
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes: self.bytes.load(Ordering::Relaxed),
            dropped_bytes: self.dropped_bytes.load(Ordering::Relaxed),
            identified: self.identified.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            resolution_failures: self.resolution_failures.load(Ordering::Relaxed),
        }
    }
}
