//! Sequential probe loop owned by one worker.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::error::Result;
use crate::metrics::LatencyHistogram;
use crate::probe::{LifecycleProbe, ProbeResult, REQUESTS_PER_PROBE};
use crate::target::KvStore;

/// Average time per HTTP request, counting every scheduled request.
///
/// Failed probes still count toward the divisor, so failures pull the mean
/// down. Zero jobs yield a zero mean.
pub fn mean_per_request(accumulated: Duration, jobs: u64) -> Duration {
    let requests = u128::from(jobs) * u128::from(REQUESTS_PER_PROBE);
    if requests == 0 {
        return Duration::ZERO;
    }
    let nanos = accumulated.as_nanos() / requests;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub worker_id: usize,
    pub jobs_run: u64,
    pub failures: u64,
    /// Sum of the per-probe mean latencies, `(L1+L2+L3+L4)/4`, of every
    /// passed probe
    pub latency_accumulator: Duration,
    pub elapsed: Duration,
    pub latencies: LatencyHistogram,
}

impl WorkerSummary {
    /// Fold one probe outcome into the counters.
    pub fn record(&mut self, result: &ProbeResult) {
        match result {
            ProbeResult::Passed(steps) => {
                self.latency_accumulator += steps.mean();
                for latency in steps.iter() {
                    self.latencies.record(latency);
                }
            }
            ProbeResult::Failed(_) => self.failures += 1,
        }
        self.jobs_run += 1;
    }

    pub fn successes(&self) -> u64 {
        self.jobs_run - self.failures
    }

    pub fn mean_latency(&self) -> Duration {
        mean_per_request(self.latency_accumulator, self.jobs_run)
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} tests done in {:.3}s. {} failed. Mean response time = {:.3}ms.",
            self.jobs_run,
            self.elapsed.as_secs_f64(),
            self.failures,
            self.mean_latency().as_secs_f64() * 1000.0
        )
    }
}

pub struct WorkerLoop<S: KvStore + ?Sized> {
    id: usize,
    store: Arc<S>,
}

impl<S: KvStore + ?Sized> WorkerLoop<S> {
    pub fn new(id: usize, store: Arc<S>) -> Self {
        Self { id, store }
    }

    /// Run `job_count` probes back to back.
    pub async fn run(&self, job_count: u64) -> Result<WorkerSummary> {
        let mut summary = WorkerSummary {
            worker_id: self.id,
            jobs_run: 0,
            failures: 0,
            latency_accumulator: Duration::ZERO,
            elapsed: Duration::ZERO,
            latencies: LatencyHistogram::new()?,
        };
        debug!(worker = self.id, jobs = job_count, "worker started");

        let started = Instant::now();
        let probe = LifecycleProbe::new(self.store.as_ref());
        for _ in 0..job_count {
            summary.record(&probe.run().await);
        }
        summary.elapsed = started.elapsed();

        info!(
            worker = self.id,
            jobs = summary.jobs_run,
            failures = summary.failures,
            mean_ms = summary.mean_latency().as_secs_f64() * 1000.0,
            "worker finished"
        );
        Ok(summary)
    }
}
