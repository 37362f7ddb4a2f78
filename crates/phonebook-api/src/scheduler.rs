//! Fixed-interval trigger for sync cycles.

use std::time::Duration;

use phonebook_core::sync::{CycleOutcome, Orchestrator};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Spawn the sync loop. The first cycle runs immediately.
pub fn spawn(orchestrator: Orchestrator, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(interval_secs = every.as_secs(), "Sync scheduler started");

        loop {
            ticker.tick().await;
            let cycle = orchestrator.clone();
            // A panicking cycle only ends its own task; the next tick still runs
            if let Err(error) = tokio::spawn(async move { run_once(&cycle).await }).await {
                tracing::error!(error = %error, "Sync cycle task failed");
            }
        }
    })
}

async fn run_once(orchestrator: &Orchestrator) {
    match orchestrator.run_cycle().await {
        Ok(CycleOutcome::Skipped) => {}
        Ok(CycleOutcome::Completed(reports)) => {
            let failed = reports.iter().filter(|report| report.result.is_err()).count();
            tracing::info!(directories = reports.len(), failed, "Sync cycle finished");
        }
        Err(error) => tracing::error!(error = %error, "Sync cycle aborted"),
    }
}
