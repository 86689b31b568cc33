use anyhow::{Context, Result};
use clap::Parser;
use kvprobe::{telemetry, Config, HttpKvStore, Reporter, RunConfiguration, Scheduler};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "kvprobe")]
#[command(about = "Create/read/delete/verify load test against a key-value HTTP store")]
#[command(version)]
struct Cli {
    /// Total number of probes, split evenly across one worker per core
    #[arg(value_name = "JOBS", default_value_t = 1000)]
    jobs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("failed to read .env");
        }
    }
    telemetry::init_tracing();

    let cfg = Config::load().context("failed to load configuration")?;
    debug!(?cfg, "configuration loaded");

    let store = HttpKvStore::new(&cfg.target).context("failed to build HTTP client")?;
    info!(target_url = store.base_url(), jobs = cli.jobs, "starting kvprobe");

    let run = RunConfiguration::for_host(cli.jobs)?;
    let scheduler = Scheduler::new(run, Arc::new(store));
    let mut reporter = Reporter::new(std::io::stdout().lock());
    scheduler.run(&mut reporter).await?;

    Ok(())
}
