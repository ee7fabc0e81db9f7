//! Repeat mode
//!
//! Each job gets its own interval task. The first tick fires immediately;
//! job bodies are blocking and run on the blocking pool. Jobs touch disjoint
//! tables, so one job failing or running long does not hold up the others.

use anyhow::{Context, Result};
use log::{error, info};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use warehouse::{Job, RecordSource, RepeatInterval, WarehouseStore, run_job};

/// Run `jobs` on their intervals until Ctrl-C or SIGTERM
///
/// A job still in flight at shutdown is abandoned; its committed windows
/// are kept and the next start resumes from them.
pub fn run_forever(
    jobs: &[Job],
    source: Arc<dyn RecordSource>,
    store: Arc<dyn WarehouseStore>,
) -> Result<()> {
    let mut schedule = Vec::with_capacity(jobs.len());
    for &job in jobs {
        schedule.push((job, RepeatInterval::from_env(job.default_interval())?));
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
    let result = runtime.block_on(async move {
        let mut tasks = JoinSet::new();
        for (job, interval) in schedule {
            info!("Scheduling the {} job every {}", job, interval);
            tasks.spawn(repeat_job(job, interval, Arc::clone(&source), Arc::clone(&store)));
        }

        let signal = wait_for_shutdown().await;
        tasks.abort_all();
        signal
    });
    runtime.shutdown_background();

    info!("Shut down");
    result
}

async fn repeat_job(
    job: Job,
    interval: RepeatInterval,
    source: Arc<dyn RecordSource>,
    store: Arc<dyn WarehouseStore>,
) {
    let mut ticker = tokio::time::interval(interval.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let source = Arc::clone(&source);
        let store = Arc::clone(&store);
        let outcome =
            tokio::task::spawn_blocking(move || run_job(job, source.as_ref(), store.as_ref()))
                .await;

        match outcome {
            Ok(Ok(_)) => info!("{} job complete, see you again in {}", job, interval),
            Ok(Err(e)) => {
                error!("{:#}", e);
                info!("Will retry the {} job in {}", job, interval);
            }
            Err(e) => error!("{} job did not finish: {}", job, e),
        }
    }
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate =
            signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received Ctrl-C, stopping");
            }
            _ = terminate.recv() => info!("Received SIGTERM, stopping"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Received Ctrl-C, stopping");
    }

    Ok(())
}
