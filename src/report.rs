//! Aggregation of worker summaries and the printed run report.

use std::io::{self, Write};
use std::time::Duration;

use crate::error::Result;
use crate::metrics::{LatencyHistogram, LatencyPercentiles};
use crate::probe::REQUESTS_PER_PROBE;
use crate::scheduler::RunConfiguration;
use crate::worker::{mean_per_request, WorkerSummary};

pub const FINISHED_MARKER: &str = "Tests finished.";

/// Cross-worker aggregate of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub total_jobs: u64,
    pub failures: u64,
    pub total_requests: u64,
    pub mean_latency: Duration,
    pub percentiles: LatencyPercentiles,
    pub elapsed: Duration,
    pub workers: Vec<WorkerSummary>,
}

impl RunReport {
    /// Fold per-worker summaries; workers are ordered by id.
    pub fn from_summaries(mut workers: Vec<WorkerSummary>, elapsed: Duration) -> Result<Self> {
        workers.sort_by_key(|w| w.worker_id);

        let mut merged = LatencyHistogram::new()?;
        let mut total_jobs = 0u64;
        let mut failures = 0u64;
        let mut accumulated = Duration::ZERO;
        for worker in &workers {
            total_jobs += worker.jobs_run;
            failures += worker.failures;
            accumulated += worker.latency_accumulator;
            merged.merge(&worker.latencies)?;
        }

        Ok(Self {
            total_jobs,
            failures,
            total_requests: total_jobs * u64::from(REQUESTS_PER_PROBE),
            mean_latency: mean_per_request(accumulated, total_jobs),
            percentiles: merged.percentiles(),
            elapsed,
            workers,
        })
    }

    pub fn successes(&self) -> u64 {
        self.total_jobs - self.failures
    }
}

/// Writes the plan and the final report to a sink, stdout in the binary.
pub struct Reporter<W: Write> {
    out: W,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn plan(&mut self, cfg: &RunConfiguration) -> io::Result<()> {
        writeln!(
            self.out,
            "{} threads, {} jobs per thread, {} requests per job.",
            cfg.worker_count, cfg.jobs_per_worker, REQUESTS_PER_PROBE
        )?;
        writeln!(self.out, "\t{} requests", cfg.total_requests())?;
        let dropped = cfg.unscheduled_jobs();
        if dropped > 0 {
            writeln!(
                self.out,
                "\t{} of {} jobs not scheduled ({} jobs do not split evenly across {} threads)",
                dropped, cfg.total_jobs, cfg.total_jobs, cfg.worker_count
            )?;
        }
        self.out.flush()
    }

    pub fn report(&mut self, report: &RunReport) -> io::Result<()> {
        for worker in &report.workers {
            writeln!(self.out, "[worker {}] {}", worker.worker_id, worker.summary_line())?;
        }

        let p = &report.percentiles;
        writeln!(self.out)?;
        writeln!(self.out, "=== RESULTS ===")?;
        writeln!(
            self.out,
            "Probes:             {} ({} failed)",
            report.total_jobs, report.failures
        )?;
        writeln!(self.out, "Requests:           {}", report.total_requests)?;
        writeln!(
            self.out,
            "Mean response time: {:.3}ms",
            report.mean_latency.as_secs_f64() * 1000.0
        )?;
        writeln!(
            self.out,
            "Latency:            P50={:.2}ms P95={:.2}ms P99={:.2}ms Max={:.2}ms",
            p.p50_ms(),
            p.p95_ms(),
            p.p99_ms(),
            p.max_ms()
        )?;
        writeln!(
            self.out,
            "Elapsed time:       {:.3}s",
            report.elapsed.as_secs_f64()
        )?;
        writeln!(self.out, "{FINISHED_MARKER}")?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
