//! Sync orchestration: one cycle reconciles every active directory in turn.

mod lock;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use lock::{CycleGuard, CycleLock};

use crate::db::{DirectoryRepository, SqliteContactRepository, SqliteDirectoryRepository};
use crate::directory::{fetch_snapshot, DirectoryConnector, DirectoryError};
use crate::models::{DirectoryConfig, DirectoryId};
use crate::notify::{Mailer, NotificationGate};
use crate::reconcile::{reconcile, ReconcileReport};
use crate::services::DatabaseService;
use crate::util::now_whole_seconds;
use crate::{Error, Result};

/// Why one directory's pass failed
#[derive(Debug, Error)]
pub enum SyncError {
    /// Could not fetch the snapshot; nothing was written
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Persistence failed mid-pass; the pass was rolled back
    #[error("Reconciliation failed: {0}")]
    Reconciliation(#[source] Error),
}

/// Result of a successful directory pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub report: ReconcileReport,
    pub notifications_sent: usize,
    pub watermark: DateTime<Utc>,
}

/// One directory's entry in a cycle report
#[derive(Debug)]
pub struct DirectoryReport {
    pub directory_id: DirectoryId,
    pub name: String,
    pub result: std::result::Result<PassSummary, SyncError>,
}

/// What a cycle invocation did
#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle held the lock; no directory was touched
    Skipped,
    Completed(Vec<DirectoryReport>),
}

/// Drives reconciliation cycles under a single-flight lock
#[derive(Clone)]
pub struct Orchestrator {
    db: DatabaseService,
    connector: Arc<dyn DirectoryConnector>,
    gate: NotificationGate,
    lock: CycleLock,
}

impl Orchestrator {
    pub fn new(
        db: DatabaseService,
        connector: Arc<dyn DirectoryConnector>,
        mailer: Arc<dyn Mailer>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            connector,
            gate: NotificationGate::new(mailer, base_url),
            lock: CycleLock::new(None),
        }
    }

    /// Also hold an advisory lock on `path` while a cycle runs
    #[must_use]
    pub fn with_lock_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock = CycleLock::new(Some(path.into()));
        self
    }

    pub const fn database(&self) -> &DatabaseService {
        &self.db
    }

    /// Run one cycle over every active directory.
    ///
    /// Directories are processed sequentially; a failing directory is
    /// recorded and the cycle moves on.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Some(_guard) = self.lock.try_acquire()? else {
            tracing::info!("Sync cycle already running; skipping this tick");
            return Ok(CycleOutcome::Skipped);
        };

        let directories = self.db.list_active_directories().await?;
        tracing::debug!(directories = directories.len(), "Starting sync cycle");

        let mut reports = Vec::with_capacity(directories.len());
        for directory in directories {
            reports.push(self.run_pass(directory).await);
        }
        Ok(CycleOutcome::Completed(reports))
    }

    /// Run one directory's pass under the cycle lock, active or not.
    pub async fn sync_directory(&self, id: DirectoryId) -> Result<CycleOutcome> {
        let Some(_guard) = self.lock.try_acquire()? else {
            tracing::info!(directory_id = id, "Sync cycle already running; skipping");
            return Ok(CycleOutcome::Skipped);
        };

        let directory = self
            .db
            .get_directory(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("directory {id}")))?;
        Ok(CycleOutcome::Completed(vec![self.run_pass(directory).await]))
    }

    async fn run_pass(&self, directory: DirectoryConfig) -> DirectoryReport {
        let result = self.pass(&directory).await;
        match &result {
            Ok(summary) => tracing::info!(
                directory_id = directory.id,
                created = summary.report.created,
                updated = summary.report.updated,
                deleted = summary.report.deleted,
                deferred_creates = summary.report.pending_creates.len(),
                deferred_updates = summary.report.pending_updates.len(),
                "Directory synced"
            ),
            Err(SyncError::Directory(error)) if error.is_transient() => tracing::warn!(
                directory_id = directory.id,
                error = %error,
                "Directory unavailable; retrying next cycle"
            ),
            Err(error) => tracing::error!(
                directory_id = directory.id,
                error = %error,
                "Directory sync failed"
            ),
        }

        DirectoryReport {
            directory_id: directory.id,
            name: directory.name,
            result,
        }
    }

    async fn pass(
        &self,
        directory: &DirectoryConfig,
    ) -> std::result::Result<PassSummary, SyncError> {
        // Taken before the fetch so edits racing the snapshot stay above the mark
        let watermark = now_whole_seconds();
        let snapshot = fetch_snapshot(self.connector.as_ref(), directory).await?;

        let report = self
            .db
            .with_transaction(|tx| {
                let report = reconcile(&SqliteContactRepository::new(tx), directory, &snapshot)?;
                SqliteDirectoryRepository::new(tx).set_watermark(directory.id, watermark)?;
                Ok(report)
            })
            .await
            .map_err(SyncError::Reconciliation)?;

        let notifications_sent = self.gate.dispatch(directory, &report).await;
        Ok(PassSummary {
            report,
            notifications_sent,
            watermark,
        })
    }
}
