use phonebook_core::models::DirectoryId;
use phonebook_core::sync::{CycleOutcome, DirectoryReport, Orchestrator};

use crate::error::CliError;

pub async fn run_sync(
    orchestrator: &Orchestrator,
    directory: Option<DirectoryId>,
) -> Result<CycleOutcome, CliError> {
    let outcome = match directory {
        Some(id) => orchestrator.sync_directory(id).await?,
        None => orchestrator.run_cycle().await?,
    };

    let reports = match &outcome {
        CycleOutcome::Skipped => {
            println!("Another sync is running; skipped.");
            return Ok(outcome);
        }
        CycleOutcome::Completed(reports) => reports,
    };

    if reports.is_empty() {
        println!("No active directories.");
    }
    for line in format_report_lines(reports) {
        println!("{line}");
    }

    let failed = reports.iter().filter(|report| report.result.is_err()).count();
    if failed > 0 {
        return Err(CliError::SyncFailed(failed));
    }
    Ok(outcome)
}

pub fn format_report_lines(reports: &[DirectoryReport]) -> Vec<String> {
    reports
        .iter()
        .map(|entry| match &entry.result {
            Ok(summary) => {
                let report = &summary.report;
                let mut line = format!(
                    "{}: {} created, {} updated, {} deleted, {} unchanged",
                    entry.name, report.created, report.updated, report.deleted, report.unchanged
                );
                let deferred = report.pending_creates.len() + report.pending_updates.len();
                if deferred > 0 {
                    line.push_str(&format!(
                        ", {deferred} deferred ({} notification(s) sent)",
                        summary.notifications_sent
                    ));
                }
                line
            }
            Err(error) => format!("{}: failed: {error}", entry.name),
        })
        .collect()
}
