//! Per-request latency distribution

use hdrhistogram::Histogram;
use std::time::Duration;

use crate::error::HarnessError;

/// One hour, in microseconds. Slower requests saturate at this bound.
const MAX_TRACKED_MICROS: u64 = 3_600_000_000;

#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl LatencyHistogram {
    pub fn new() -> Result<Self, HarnessError> {
        let inner = Histogram::new_with_bounds(1, MAX_TRACKED_MICROS, 3)
            .map_err(|e| HarnessError::Histogram(e.to_string()))?;
        Ok(Self { inner })
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.inner.saturating_record(micros);
    }

    pub fn merge(&mut self, other: &LatencyHistogram) -> Result<(), HarnessError> {
        self.inner
            .add(&other.inner)
            .map_err(|e| HarnessError::Histogram(e.to_string()))
    }

    pub fn count(&self) -> u64 {
        self.inner.len()
    }

    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.inner.len() == 0 {
            return LatencyPercentiles::default();
        }
        LatencyPercentiles {
            p50_us: self.inner.value_at_percentile(50.0),
            p95_us: self.inner.value_at_percentile(95.0),
            p99_us: self.inner.value_at_percentile(99.0),
            max_us: self.inner.max(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencyPercentiles {
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

impl LatencyPercentiles {
    pub fn p50_ms(&self) -> f64 {
        self.p50_us as f64 / 1000.0
    }

    pub fn p95_ms(&self) -> f64 {
        self.p95_us as f64 / 1000.0
    }

    pub fn p99_ms(&self) -> f64 {
        self.p99_us as f64 / 1000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_us as f64 / 1000.0
    }
}
