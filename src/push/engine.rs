/// Periodic drain-and-send cycle towards the remote collector
use futures_util::FutureExt;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Duration};

use super::SubmissionQueue;
use crate::models::Reading;
use crate::remote::RemoteService;
use crate::sensors::SensorRegistry;

/// Holds the in-progress flag for the lifetime of one cycle
///
/// Released on drop, so early returns and panics inside a cycle still clear it.
struct CycleGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Batches drained for a cycle and not yet confirmed by the collector
///
/// Whatever is still held when this is dropped goes back into the queue, so a
/// cycle that bails out or unwinds never loses readings.
struct InFlight<'a> {
    queue: &'a SubmissionQueue,
    batches: VecDeque<(String, Vec<Reading>)>,
}

impl InFlight<'_> {
    fn readings(&self) -> usize {
        self.batches.iter().map(|(_, batch)| batch.len()).sum()
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        for (sensor_id, batch) in self.batches.drain(..) {
            self.queue.requeue(&sensor_id, batch);
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub delivered: usize,
    pub requeued: usize,
    pub config_updates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Another cycle was still running
    Skipped,
    Completed(CycleReport),
}

pub struct PushEngine {
    registry: Arc<SensorRegistry>,
    queue: Arc<SubmissionQueue>,
    remote: Arc<dyn RemoteService>,
    update_remote: bool,
    in_progress: AtomicBool,
    degraded: AtomicBool,
}

impl PushEngine {
    pub fn new(
        registry: Arc<SensorRegistry>,
        queue: Arc<SubmissionQueue>,
        remote: Arc<dyn RemoteService>,
        update_remote: bool,
    ) -> Self {
        Self {
            registry,
            queue,
            remote,
            update_remote,
            in_progress: AtomicBool::new(false),
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the last delivery attempt failed
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    /// Run one push cycle over every sensor with pending readings
    ///
    /// A batch the collector does not accept goes back into its queue. When the
    /// collector cannot be reached at all, the rest of the cycle's batches are
    /// requeued without being attempted.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let _guard = match CycleGuard::acquire(&self.in_progress) {
            Some(guard) => guard,
            None => {
                debug!("Push cycle still running, skipping");
                return CycleOutcome::Skipped;
            }
        };

        let mut in_flight = InFlight {
            queue: &self.queue,
            batches: self.queue.drain_all().into(),
        };
        let mut report = CycleReport {
            batches: in_flight.batches.len(),
            ..Default::default()
        };

        loop {
            let result = match in_flight.batches.front() {
                Some((sensor_id, batch)) => self.remote.push_records(sensor_id, batch).await,
                None => break,
            };
            let Some((sensor_id, batch)) = in_flight.batches.pop_front() else {
                break;
            };

            match result {
                Ok(update) => {
                    self.queue.mark_delivered(batch.len());
                    report.delivered += batch.len();
                    self.degraded.store(false, Ordering::Relaxed);

                    if let Some(update) = update {
                        if !self.update_remote && self.registry.apply_update(&sensor_id, &update) {
                            report.config_updates += 1;
                            info!("Applied remote config update to sensor {}", sensor_id);
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        "Push of {} readings for {} failed: {}",
                        batch.len(),
                        sensor_id,
                        e
                    );
                    self.degraded.store(true, Ordering::Relaxed);
                    report.requeued += batch.len();
                    self.queue.requeue(&sensor_id, batch);

                    if e.is_transport() {
                        // The rest goes back when `in_flight` drops
                        report.requeued += in_flight.readings();
                        break;
                    }
                }
            }
        }
        drop(in_flight);

        if report.batches > 0 {
            let (queued, pushed) = self.queue.counts();
            info!(
                "Push cycle: {} delivered, {} requeued, {} config updates (queued/pushed {}/{})",
                report.delivered, report.requeued, report.config_updates, queued, pushed
            );
        }

        CycleOutcome::Completed(report)
    }

    /// Run push cycles every `period` until the stop signal fires
    pub async fn run(&self, period: Duration, mut stop: watch::Receiver<bool>) {
        while !*stop.borrow() {
            if AssertUnwindSafe(self.run_cycle()).catch_unwind().await.is_err() {
                error!("Push cycle panicked; undelivered readings were requeued");
                self.degraded.store(true, Ordering::Relaxed);
            }

            tokio::select! {
                _ = stop.changed() => break,
                _ = sleep(period) => {}
            }
        }
    }
}
