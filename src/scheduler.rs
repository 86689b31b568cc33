use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::error::{HarnessError, Result};
use crate::probe::REQUESTS_PER_PROBE;
use crate::report::{Reporter, RunReport};
use crate::target::KvStore;
use crate::worker::WorkerLoop;

/// Available parallelism of the host, at least 1.
pub fn host_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// How a requested job count is split across workers. Computed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfiguration {
    pub total_jobs: u64,
    pub worker_count: usize,
    pub jobs_per_worker: u64,
}

impl RunConfiguration {
    pub fn new(total_jobs: u64, worker_count: usize) -> Result<Self> {
        if worker_count == 0 {
            return Err(HarnessError::NoWorkers);
        }
        Ok(Self {
            total_jobs,
            worker_count,
            jobs_per_worker: total_jobs / worker_count as u64,
        })
    }

    /// One worker per available processing unit.
    pub fn for_host(total_jobs: u64) -> Result<Self> {
        Self::new(total_jobs, host_parallelism())
    }

    /// Probes that will actually run.
    pub fn scheduled_jobs(&self) -> u64 {
        self.worker_count as u64 * self.jobs_per_worker
    }

    /// Jobs lost to the truncating split.
    pub fn unscheduled_jobs(&self) -> u64 {
        self.total_jobs - self.scheduled_jobs()
    }

    pub fn total_requests(&self) -> u64 {
        self.scheduled_jobs() * u64::from(REQUESTS_PER_PROBE)
    }
}

/// Fans a run out over a fixed set of concurrent workers and joins them.
pub struct Scheduler<S: KvStore + ?Sized + 'static> {
    config: RunConfiguration,
    store: Arc<S>,
}

impl<S: KvStore + ?Sized + 'static> Scheduler<S> {
    pub fn new(config: RunConfiguration, store: Arc<S>) -> Self {
        Self { config, store }
    }

    /// Print the plan, run every worker to completion, then report.
    ///
    /// Nothing after the plan is printed until the last worker has finished.
    pub async fn run<W: Write>(&self, reporter: &mut Reporter<W>) -> Result<RunReport> {
        let cfg = self.config;
        reporter.plan(&cfg)?;
        info!(
            workers = cfg.worker_count,
            jobs_per_worker = cfg.jobs_per_worker,
            unscheduled = cfg.unscheduled_jobs(),
            "starting run"
        );

        let started = Instant::now();
        let mut tasks = JoinSet::new();
        for id in 0..cfg.worker_count {
            let worker = WorkerLoop::new(id, Arc::clone(&self.store));
            let jobs = cfg.jobs_per_worker;
            tasks.spawn(async move { worker.run(jobs).await });
        }

        let mut summaries = Vec::with_capacity(cfg.worker_count);
        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(summary)) => summaries.push(summary),
                Ok(Err(e)) => {
                    error!(error = %e, "worker failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!(error = %e, "worker task aborted");
                    first_error.get_or_insert(HarnessError::Worker(e));
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let report = RunReport::from_summaries(summaries, started.elapsed())?;
        info!(
            jobs = report.total_jobs,
            failures = report.failures,
            mean_ms = report.mean_latency.as_secs_f64() * 1000.0,
            elapsed_s = report.elapsed.as_secs_f64(),
            "run finished"
        );
        reporter.report(&report)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::MockKvStore;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(1000, 8, 125, 4000)]
    #[case(8, 2, 4, 32)]
    #[case(10, 4, 2, 32)]
    #[case(3, 4, 0, 0)]
    #[case(0, 1, 0, 0)]
    fn test_partition(
        #[case] total: u64,
        #[case] workers: usize,
        #[case] per_worker: u64,
        #[case] requests: u64,
    ) {
        let cfg = RunConfiguration::new(total, workers).unwrap();
        assert_eq!(cfg.jobs_per_worker, per_worker);
        assert_eq!(cfg.total_requests(), requests);
        assert_eq!(cfg.unscheduled_jobs(), total - per_worker * workers as u64);
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            RunConfiguration::new(10, 0),
            Err(HarnessError::NoWorkers)
        ));
    }

    #[test]
    fn test_for_host_uses_available_parallelism() {
        let cfg = RunConfiguration::for_host(1000).unwrap();
        assert_eq!(cfg, RunConfiguration::new(1000, host_parallelism()).unwrap());
        assert!(cfg.worker_count >= 1);
    }

    proptest! {
        #[test]
        fn prop_partition_never_overschedules(total in 0u64..1_000_000, workers in 1usize..256) {
            let cfg = RunConfiguration::new(total, workers).unwrap();
            prop_assert_eq!(cfg.jobs_per_worker, total / workers as u64);
            prop_assert!(cfg.scheduled_jobs() <= total);
            prop_assert!(cfg.unscheduled_jobs() < workers as u64);
            prop_assert_eq!(cfg.total_requests(), workers as u64 * cfg.jobs_per_worker * 4);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_run_with_failing_creates_completes() {
        let mut store = MockKvStore::new();
        store.expect_create().times(8).returning(|_, _| Ok(500));
        store.expect_read().never();
        store.expect_delete().never();

        let cfg = RunConfiguration::new(8, 2).unwrap();
        let scheduler = Scheduler::new(cfg, Arc::new(store));
        let mut reporter = Reporter::new(Vec::new());
        let report = scheduler.run(&mut reporter).await.unwrap();

        assert_eq!(report.workers.len(), 2);
        for worker in &report.workers {
            assert_eq!(worker.jobs_run, 4);
            assert_eq!(worker.failures, 4);
            assert_eq!(worker.mean_latency(), std::time::Duration::ZERO);
        }
        assert_eq!(report.failures, 8);

        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.starts_with("2 threads, 4 jobs per thread"));
        assert!(text.trim_end().ends_with("Tests finished."));
    }

    #[tokio::test]
    async fn test_run_with_no_scheduled_jobs() {
        let mut store = MockKvStore::new();
        store.expect_create().never();
        store.expect_read().never();

        let cfg = RunConfiguration::new(1, 3).unwrap();
        let scheduler = Scheduler::new(cfg, Arc::new(store));
        let mut reporter = Reporter::new(Vec::new());
        let report = scheduler.run(&mut reporter).await.unwrap();

        assert_eq!(report.total_jobs, 0);
        assert_eq!(report.workers.len(), 3);
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert!(text.contains("1 of 1 jobs not scheduled"));
        assert!(text.contains("Tests finished."));
    }
}
