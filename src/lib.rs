//! Concurrent load harness for key-value HTTP stores.
//!
//! Every probe writes a fresh key, reads it back, deletes it and checks that
//! it is gone. Workers run probes back to back; the scheduler runs one worker
//! per available core and reports the aggregate once all of them are done.

pub mod config;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod report;
pub mod scheduler;
pub mod target;
pub mod telemetry;
pub mod worker;

pub use config::Config;
pub use error::{ConfigError, HarnessError, ProbeError};
pub use probe::{LifecycleProbe, ProbeKey, ProbeResult, ProbeState, ProbeValue, Step, StepLatencies};
pub use report::{Reporter, RunReport};
pub use scheduler::{RunConfiguration, Scheduler};
pub use target::{HttpKvStore, KvStore, ReadReply};
pub use worker::{WorkerLoop, WorkerSummary};
