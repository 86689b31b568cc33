//! One create/read/delete/verify-deleted lifecycle against the store.
//!
//! The lifecycle is a small state machine:
//!
//! ```text
//! Pending -> Created -> ReadVerified -> Deleted -> DeleteVerified
//!    |          |            |             |
//!    +----------+------------+-------------+--> Failed(step)
//! ```
//!
//! The first failing step ends the probe. Nothing is retried and nothing is
//! cleaned up.

use std::fmt;
use std::time::{Duration, Instant};
use tracing::warn;
use uuid::Uuid;

use crate::error::ProbeError;
use crate::target::{KvStore, ReadReply};

/// Number of HTTP requests a successful probe issues.
pub const REQUESTS_PER_PROBE: u32 = 4;

/// Resource identifier used for one probe, never reused.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProbeKey(String);

impl ProbeKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProbeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload written under a [`ProbeKey`] and checked on read-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeValue(String);

impl ProbeValue {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProbeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Create,
    Read,
    Delete,
    VerifyDeleted,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Create, Step::Read, Step::Delete, Step::VerifyDeleted];

    pub fn index(&self) -> usize {
        match self {
            Step::Create => 0,
            Step::Read => 1,
            Step::Delete => 2,
            Step::VerifyDeleted => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Create => "create",
            Step::Read => "read",
            Step::Delete => "delete",
            Step::VerifyDeleted => "verify_deleted",
        }
    }

    /// What a passing response looks like, for failure logs.
    pub fn expectation(&self) -> &'static str {
        match self {
            Step::Create => "HTTP 200",
            Step::Read => "HTTP 200 carrying the written value",
            Step::Delete => "HTTP 200",
            Step::VerifyDeleted => "HTTP 404",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Pending,
    Created,
    ReadVerified,
    Deleted,
    DeleteVerified,
    Failed(Step),
}

impl ProbeState {
    /// The step to issue from this state; `None` once terminal.
    pub fn pending_step(self) -> Option<Step> {
        match self {
            ProbeState::Pending => Some(Step::Create),
            ProbeState::Created => Some(Step::Read),
            ProbeState::ReadVerified => Some(Step::Delete),
            ProbeState::Deleted => Some(Step::VerifyDeleted),
            ProbeState::DeleteVerified | ProbeState::Failed(_) => None,
        }
    }

    pub fn on_success(self) -> Self {
        match self {
            ProbeState::Pending => ProbeState::Created,
            ProbeState::Created => ProbeState::ReadVerified,
            ProbeState::ReadVerified => ProbeState::Deleted,
            ProbeState::Deleted => ProbeState::DeleteVerified,
            terminal => terminal,
        }
    }

    pub fn on_failure(self) -> Self {
        match self.pending_step() {
            Some(step) => ProbeState::Failed(step),
            None => self,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.pending_step().is_none()
    }
}

/// Latency of each of the four requests of a completed probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLatencies([Duration; 4]);

impl StepLatencies {
    pub fn new(latencies: [Duration; 4]) -> Self {
        Self(latencies)
    }

    pub fn get(&self, step: Step) -> Duration {
        self.0[step.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.0.iter().copied()
    }

    pub fn total(&self) -> Duration {
        self.0.iter().sum()
    }

    pub fn mean(&self) -> Duration {
        self.total() / REQUESTS_PER_PROBE
    }
}

#[derive(Debug)]
pub struct ProbeFailure {
    pub key: ProbeKey,
    pub step: Step,
    pub error: ProbeError,
    /// Latencies of the steps issued before giving up, failing step included
    pub latencies: Vec<Duration>,
}

#[derive(Debug)]
pub enum ProbeResult {
    Passed(StepLatencies),
    Failed(ProbeFailure),
}

impl ProbeResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeResult::Passed(_))
    }

    /// Mean per-request latency, defined only for a passed probe.
    pub fn mean_latency(&self) -> Option<Duration> {
        match self {
            ProbeResult::Passed(latencies) => Some(latencies.mean()),
            ProbeResult::Failed(_) => None,
        }
    }

    /// Terminal state the lifecycle stopped in.
    pub fn final_state(&self) -> ProbeState {
        match self {
            ProbeResult::Passed(_) => ProbeState::DeleteVerified,
            ProbeResult::Failed(failure) => ProbeState::Failed(failure.step),
        }
    }

    pub fn failure(&self) -> Option<&ProbeFailure> {
        match self {
            ProbeResult::Passed(_) => None,
            ProbeResult::Failed(failure) => Some(failure),
        }
    }
}

pub struct LifecycleProbe<'a, S: KvStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: KvStore + ?Sized> LifecycleProbe<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run the lifecycle for a fresh key and value.
    pub async fn run(&self) -> ProbeResult {
        self.run_with(ProbeKey::generate(), ProbeValue::generate()).await
    }

    pub async fn run_with(&self, key: ProbeKey, value: ProbeValue) -> ProbeResult {
        let mut state = ProbeState::Pending;
        let mut latencies = [Duration::ZERO; 4];
        let mut error = None;

        while let Some(step) = state.pending_step() {
            let started = Instant::now();
            let outcome = self.execute(step, &key, &value).await;
            latencies[step.index()] = started.elapsed();

            match outcome {
                Ok(()) => state = state.on_success(),
                Err(e) => {
                    state = state.on_failure();
                    error = Some(e);
                }
            }
        }

        match (state, error) {
            (ProbeState::Failed(step), Some(error)) => {
                warn!(
                    key = %key,
                    step = step.as_str(),
                    expected = step.expectation(),
                    actual = %error,
                    "probe failed"
                );
                ProbeResult::Failed(ProbeFailure {
                    key,
                    step,
                    error,
                    latencies: latencies[..=step.index()].to_vec(),
                })
            }
            (state, _) => {
                debug_assert_eq!(state, ProbeState::DeleteVerified);
                ProbeResult::Passed(StepLatencies::new(latencies))
            }
        }
    }

    async fn execute(&self, step: Step, key: &ProbeKey, value: &ProbeValue) -> Result<(), ProbeError> {
        match step {
            Step::Create => {
                let status = self.store.create(key.as_str(), value.as_str()).await?;
                expect_status(status, 200)
            }
            Step::Read => match self.store.read(key.as_str()).await? {
                ReadReply::Found(entries) => match entries.get(key.as_str()) {
                    Some(actual) if actual == value.as_str() => Ok(()),
                    Some(actual) => Err(ProbeError::ValueMismatch {
                        expected: value.to_string(),
                        actual: actual.clone(),
                    }),
                    None => Err(ProbeError::MissingKey),
                },
                other => Err(ProbeError::UnexpectedStatus {
                    expected: 200,
                    actual: other.status(),
                }),
            },
            Step::Delete => {
                let status = self.store.delete(key.as_str()).await?;
                expect_status(status, 200)
            }
            Step::VerifyDeleted => match self.store.read(key.as_str()).await? {
                ReadReply::NotFound => Ok(()),
                ReadReply::Found(_) => Err(ProbeError::StillPresent { status: 200 }),
                ReadReply::Status(actual) => Err(ProbeError::UnexpectedStatus {
                    expected: 404,
                    actual,
                }),
            },
        }
    }
}

fn expect_status(actual: u16, expected: u16) -> Result<(), ProbeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ProbeError::UnexpectedStatus { expected, actual })
    }
}
