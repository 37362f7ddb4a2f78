//! One-shot application of a single deferred create or update.
//!
//! Deferred changes are never stored, so both actions re-read the entry
//! from the directory before touching the local store.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::db::{ContactRepository, SqliteContactRepository};
use crate::directory::{codec, fetch_record, DirectoryConnector};
use crate::models::{Contact, DirectoryConfig, DirectoryId, FieldChange};
use crate::services::DatabaseService;
use crate::{Error, Result};

/// What a quick action did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QuickActionOutcome {
    /// The local store already reflects the directory entry
    AlreadyApplied,
    /// The change was written; `changes` is empty for a create
    Applied { changes: Vec<FieldChange> },
    /// The directory no longer has a matching entry
    NotFoundRemotely,
    /// No local contact carries the GUID
    NotFoundLocally,
}

impl fmt::Display for QuickActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyApplied => f.write_str("Already up to date; nothing to do."),
            Self::Applied { changes } if changes.is_empty() => f.write_str("Contact added."),
            Self::Applied { changes } => {
                let fields: Vec<&str> = changes.iter().map(|change| change.field.as_str()).collect();
                write!(f, "Contact updated: {}.", fields.join(", "))
            }
            Self::NotFoundRemotely => f.write_str("The directory no longer has this entry."),
            Self::NotFoundLocally => f.write_str("No local contact has this GUID."),
        }
    }
}

/// Applies deferred changes by directory and GUID
#[derive(Clone)]
pub struct QuickActionResolver {
    db: DatabaseService,
    connector: Arc<dyn DirectoryConnector>,
}

impl QuickActionResolver {
    pub fn new(db: DatabaseService, connector: Arc<dyn DirectoryConnector>) -> Self {
        Self { db, connector }
    }

    async fn directory(&self, directory_id: DirectoryId) -> Result<DirectoryConfig> {
        self.db
            .get_directory(directory_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("directory {directory_id}")))
    }

    async fn local(&self, directory_id: DirectoryId, guid: &str) -> Result<Option<Contact>> {
        self.db
            .with_connection(|conn| {
                SqliteContactRepository::new(conn).find_by_guid(directory_id, guid)
            })
            .await
    }

    /// Create the contact for a directory entry unless it already exists.
    pub async fn apply_create(
        &self,
        directory_id: DirectoryId,
        guid: &str,
    ) -> Result<QuickActionOutcome> {
        let directory = self.directory(directory_id).await?;
        let guid = codec::canonical_guid(guid).unwrap_or_else(|| guid.trim().to_string());

        if self.local(directory_id, &guid).await?.is_some() {
            return Ok(QuickActionOutcome::AlreadyApplied);
        }

        let Some(remote) = fetch_record(self.connector.as_ref(), &directory, &guid).await? else {
            tracing::info!(directory_id, guid = %guid, "Quick add target no longer in directory");
            return Ok(QuickActionOutcome::NotFoundRemotely);
        };

        self.db
            .with_transaction(|tx| {
                let repo = SqliteContactRepository::new(tx);
                // Re-check inside the transaction in case a cycle created it meanwhile
                if repo.find_by_guid(directory_id, &remote.guid)?.is_some() {
                    return Ok(QuickActionOutcome::AlreadyApplied);
                }
                repo.create(&Contact::from_remote(directory_id, &remote))?;
                Ok(QuickActionOutcome::Applied {
                    changes: Vec::new(),
                })
            })
            .await
            .inspect(|outcome| {
                if matches!(outcome, QuickActionOutcome::Applied { .. }) {
                    tracing::info!(directory_id, guid = %guid, "Quick add applied");
                }
            })
    }

    /// Bring an existing contact in line with its live directory entry.
    pub async fn apply_update(
        &self,
        directory_id: DirectoryId,
        guid: &str,
    ) -> Result<QuickActionOutcome> {
        let directory = self.directory(directory_id).await?;
        let guid = codec::canonical_guid(guid).unwrap_or_else(|| guid.trim().to_string());

        if self.local(directory_id, &guid).await?.is_none() {
            return Ok(QuickActionOutcome::NotFoundLocally);
        }

        let Some(remote) = fetch_record(self.connector.as_ref(), &directory, &guid).await? else {
            tracing::info!(directory_id, guid = %guid, "Quick update target no longer in directory");
            return Ok(QuickActionOutcome::NotFoundRemotely);
        };

        self.db
            .with_transaction(|tx| {
                let repo = SqliteContactRepository::new(tx);
                let Some(mut local) = repo.find_by_guid(directory_id, &guid)? else {
                    return Ok(QuickActionOutcome::NotFoundLocally);
                };
                let changes = local.diff(&remote);
                if changes.is_empty() {
                    return Ok(QuickActionOutcome::AlreadyApplied);
                }
                local.apply_remote(&remote);
                repo.update(&local)?;
                Ok(QuickActionOutcome::Applied { changes })
            })
            .await
            .inspect(|outcome| {
                if let QuickActionOutcome::Applied { changes } = outcome {
                    tracing::info!(
                        directory_id,
                        guid = %guid,
                        fields = changes.len(),
                        "Quick update applied"
                    );
                }
            })
    }
}
