//! Reconciliation of a directory snapshot against the local contact store.
//!
//! One pass deletes local mirrors whose entry vanished, then walks the
//! snapshot applying or deferring creates and updates. All writes go through
//! the repository it is handed; callers run it inside a transaction so a
//! failed pass leaves nothing behind.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::ContactRepository;
use crate::models::{Contact, DirectoryConfig, FieldChange, RemoteRecord};
use crate::Result;

/// A changed directory entry waiting for manual confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpdate {
    pub guid: String,
    pub display_name: String,
    pub changes: Vec<FieldChange>,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Differing records held back by the watermark guard
    pub stale: usize,
    pub pending_creates: Vec<RemoteRecord>,
    pub pending_updates: Vec<PendingUpdate>,
}

impl ReconcileReport {
    /// Whether the pass wrote anything
    pub const fn has_mutations(&self) -> bool {
        self.created + self.updated + self.deleted > 0
    }
}

/// Whether a remote timestamp is newer than what the store already reflects.
///
/// Missing timestamps and a never-synced directory always pass.
pub fn passes_watermark(stamp: Option<DateTime<Utc>>, watermark: Option<DateTime<Utc>>) -> bool {
    match (stamp, watermark) {
        (Some(stamp), Some(watermark)) => stamp > watermark,
        _ => true,
    }
}

/// Reconcile `snapshot` into the contacts of `directory`.
///
/// Returns the first persistence error unchanged; the caller is expected to
/// roll back.
pub fn reconcile(
    contacts: &impl ContactRepository,
    directory: &DirectoryConfig,
    snapshot: &[RemoteRecord],
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let remote_guids: HashSet<&str> = snapshot.iter().map(|record| record.guid.as_str()).collect();

    let mut local_by_guid: HashMap<String, Contact> = HashMap::new();
    for contact in contacts.list_reconcilable(directory.id)? {
        let Some(guid) = contact.guid.clone() else {
            continue;
        };
        if remote_guids.contains(guid.as_str()) {
            local_by_guid.insert(guid, contact);
        } else {
            contacts.delete(contact.id)?;
            report.deleted += 1;
            tracing::debug!(directory_id = directory.id, guid = %guid, "Deleted contact missing from directory");
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(snapshot.len());
    for remote in snapshot {
        if remote.guid.is_empty() || !seen.insert(remote.guid.as_str()) {
            tracing::warn!(directory_id = directory.id, guid = %remote.guid, "Skipping duplicate or blank GUID in snapshot");
            continue;
        }

        match local_by_guid.get(&remote.guid) {
            Some(local) => {
                let changes = local.diff(remote);
                if changes.is_empty() {
                    report.unchanged += 1;
                    continue;
                }
                if !passes_watermark(remote.changed_at, directory.last_sync) {
                    report.stale += 1;
                    continue;
                }

                if directory.notify_on_update {
                    report.pending_updates.push(PendingUpdate {
                        guid: remote.guid.clone(),
                        display_name: remote.name().to_string(),
                        changes,
                    });
                } else {
                    let mut updated = local.clone();
                    updated.apply_remote(remote);
                    contacts.update(&updated)?;
                    report.updated += 1;
                    tracing::debug!(
                        directory_id = directory.id,
                        guid = %remote.guid,
                        fields = changes.len(),
                        "Updated contact from directory"
                    );
                }
            }
            None => {
                if !passes_watermark(remote.created_at, directory.last_sync) {
                    report.stale += 1;
                    continue;
                }

                if directory.notify_on_add {
                    report.pending_creates.push(remote.clone());
                } else {
                    contacts.create(&Contact::from_remote(directory.id, remote))?;
                    report.created += 1;
                    tracing::debug!(directory_id = directory.id, guid = %remote.guid, "Created contact from directory");
                }
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::{Database, DirectoryRepository, SqliteContactRepository, SqliteDirectoryRepository};
    use crate::models::{ContactField, ContactId, DirectoryId};
    use crate::Error;

    fn setup() -> (Database, DirectoryConfig) {
        let db = Database::open_in_memory().unwrap();
        let directory = SqliteDirectoryRepository::new(db.connection())
            .create(&DirectoryConfig::new("corp", "dc1", "dc=corp", "svc", "pw"))
            .unwrap();
        (db, directory)
    }

    fn remote(guid: &str, name: &str, mail: &str) -> RemoteRecord {
        RemoteRecord {
            display_name: Some(name.to_string()),
            mail: Some(mail.to_string()),
            ..RemoteRecord::new(guid)
        }
    }

    fn seed(db: &Database, directory_id: DirectoryId, record: &RemoteRecord) -> Contact {
        SqliteContactRepository::new(db.connection())
            .create(&Contact::from_remote(directory_id, record))
            .unwrap()
    }

    fn watermark() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn deletes_mirrors_missing_from_snapshot_and_keeps_manual_contacts() {
        let (db, directory) = setup();
        let repo = SqliteContactRepository::new(db.connection());
        seed(&db, directory.id, &remote("{d}", "Dora", "dora@corp"));
        let manual = repo.create(&Contact::manual(directory.id, "Front desk")).unwrap();

        let report = reconcile(&repo, &directory, &[]).unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(repo.list_by_directory(directory.id).unwrap(), vec![manual]);
    }

    #[test]
    fn deletion_ignores_notification_gates() {
        let (db, mut directory) = setup();
        directory.notify_on_add = true;
        directory.notify_on_update = true;
        seed(&db, directory.id, &remote("{d}", "Dora", "dora@corp"));
        let repo = SqliteContactRepository::new(db.connection());

        let report = reconcile(&repo, &directory, &[]).unwrap();

        assert_eq!(report.deleted, 1);
        assert!(repo.list_by_directory(directory.id).unwrap().is_empty());
    }

    #[test]
    fn creates_and_updates_when_gates_are_off() {
        let (db, directory) = setup();
        let mut placed = seed(&db, directory.id, &remote("{a}", "Ada", "ada@old"));
        placed.coordinates = Some("10,20".to_string());
        placed.is_on_map = true;
        let repo = SqliteContactRepository::new(db.connection());
        repo.update(&placed).unwrap();

        let snapshot = vec![
            RemoteRecord {
                photo: Some("cGhvdG8=".to_string()),
                ..remote("{a}", "Ada", "ada@new")
            },
            remote("{c}", "Cleo", "cleo@corp"),
        ];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!((report.created, report.updated, report.deleted), (1, 1, 0));
        let ada = repo.find_by_guid(directory.id, "{a}").unwrap().unwrap();
        assert_eq!(ada.mail.as_deref(), Some("ada@new"));
        assert_eq!(ada.photo.as_deref(), Some("cGhvdG8="));
        assert_eq!(ada.coordinates.as_deref(), Some("10,20"));
        assert!(ada.is_on_map);
        assert!(repo.find_by_guid(directory.id, "{c}").unwrap().is_some());
    }

    #[test]
    fn photo_alone_does_not_count_as_change() {
        let (db, directory) = setup();
        seed(&db, directory.id, &remote("{a}", "Ada", "ada@corp"));
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![RemoteRecord {
            photo: Some("bmV3".to_string()),
            ..remote("{a}", "Ada", "ada@corp")
        }];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.unchanged, 1);
        assert_eq!(report.updated, 0);
        let ada = repo.find_by_guid(directory.id, "{a}").unwrap().unwrap();
        assert_eq!(ada.photo, None);
    }

    #[test]
    fn stale_change_is_ignored() {
        let (db, mut directory) = setup();
        directory.last_sync = Some(watermark());
        seed(&db, directory.id, &remote("{a}", "Ada", "ada@old"));
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![
            RemoteRecord {
                changed_at: Some(watermark()),
                ..remote("{a}", "Ada", "ada@new")
            },
            RemoteRecord {
                created_at: Some(watermark() - Duration::hours(1)),
                ..remote("{c}", "Cleo", "cleo@corp")
            },
        ];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.stale, 2);
        assert!(!report.has_mutations());
        let ada = repo.find_by_guid(directory.id, "{a}").unwrap().unwrap();
        assert_eq!(ada.mail.as_deref(), Some("ada@old"));
        assert!(repo.find_by_guid(directory.id, "{c}").unwrap().is_none());
    }

    #[test]
    fn change_newer_than_watermark_is_applied() {
        let (db, mut directory) = setup();
        directory.last_sync = Some(watermark());
        seed(&db, directory.id, &remote("{a}", "Ada", "ada@old"));
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![RemoteRecord {
            changed_at: Some(watermark() + Duration::seconds(1)),
            ..remote("{a}", "Ada", "ada@new")
        }];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.updated, 1);
    }

    #[test]
    fn update_gate_defers_with_full_diff() {
        let (db, mut directory) = setup();
        directory.notify_on_update = true;
        seed(&db, directory.id, &remote("{a}", "Ada", "ada@old"));
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![RemoteRecord {
            title: Some("CTO".to_string()),
            ..remote("{a}", "Ada L.", "ada@new")
        }];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.updated, 0);
        assert_eq!(
            report.pending_updates,
            vec![PendingUpdate {
                guid: "{a}".to_string(),
                display_name: "Ada L.".to_string(),
                changes: vec![
                    FieldChange {
                        field: ContactField::DisplayName,
                        old: Some("Ada".to_string()),
                        new: Some("Ada L.".to_string()),
                    },
                    FieldChange {
                        field: ContactField::Mail,
                        old: Some("ada@old".to_string()),
                        new: Some("ada@new".to_string()),
                    },
                    FieldChange {
                        field: ContactField::Title,
                        old: None,
                        new: Some("CTO".to_string()),
                    },
                ],
            }]
        );
        let ada = repo.find_by_guid(directory.id, "{a}").unwrap().unwrap();
        assert_eq!(ada.mail.as_deref(), Some("ada@old"));
    }

    #[test]
    fn add_gate_defers_creation() {
        let (db, mut directory) = setup();
        directory.notify_on_add = true;
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![remote("{c}", "Cleo", "cleo@corp")];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.created, 0);
        assert_eq!(report.pending_creates, snapshot);
        assert!(repo.list_by_directory(directory.id).unwrap().is_empty());
    }

    #[test]
    fn missing_name_is_stored_as_empty() {
        let (db, directory) = setup();
        let repo = SqliteContactRepository::new(db.connection());

        reconcile(&repo, &directory, &[RemoteRecord::new("{x}")]).unwrap();

        let created = repo.find_by_guid(directory.id, "{x}").unwrap().unwrap();
        assert_eq!(created.display_name, "");

        let report = reconcile(&repo, &directory, &[RemoteRecord::new("{x}")]).unwrap();
        assert_eq!(report.unchanged, 1);
    }

    #[test]
    fn duplicate_snapshot_guid_is_created_once() {
        let (db, directory) = setup();
        let repo = SqliteContactRepository::new(db.connection());

        let snapshot = vec![remote("{c}", "Cleo", "a@corp"), remote("{c}", "Cleo", "b@corp")];
        let report = reconcile(&repo, &directory, &snapshot).unwrap();

        assert_eq!(report.created, 1);
    }

    struct FailingDeletes<'a>(SqliteContactRepository<'a>);

    impl ContactRepository for FailingDeletes<'_> {
        fn create(&self, contact: &Contact) -> Result<Contact> {
            self.0.create(contact)
        }
        fn update(&self, contact: &Contact) -> Result<()> {
            self.0.update(contact)
        }
        fn delete(&self, _id: ContactId) -> Result<()> {
            Err(Error::Database("disk I/O error".to_string()))
        }
        fn get(&self, id: ContactId) -> Result<Option<Contact>> {
            self.0.get(id)
        }
        fn find_by_guid(&self, directory_id: DirectoryId, guid: &str) -> Result<Option<Contact>> {
            self.0.find_by_guid(directory_id, guid)
        }
        fn list_by_directory(&self, directory_id: DirectoryId) -> Result<Vec<Contact>> {
            self.0.list_by_directory(directory_id)
        }
        fn list_reconcilable(&self, directory_id: DirectoryId) -> Result<Vec<Contact>> {
            self.0.list_reconcilable(directory_id)
        }
    }

    #[test]
    fn persistence_error_aborts_pass() {
        let (db, directory) = setup();
        seed(&db, directory.id, &remote("{d}", "Dora", "dora@corp"));
        let repo = FailingDeletes(SqliteContactRepository::new(db.connection()));

        let result = reconcile(&repo, &directory, &[remote("{c}", "Cleo", "cleo@corp")]);

        assert!(matches!(result, Err(Error::Database(_))));
        assert!(repo.find_by_guid(directory.id, "{c}").unwrap().is_none());
    }

    #[test]
    fn watermark_guard() {
        let mark = watermark();
        assert!(passes_watermark(None, Some(mark)));
        assert!(passes_watermark(Some(mark), None));
        assert!(!passes_watermark(Some(mark), Some(mark)));
        assert!(passes_watermark(Some(mark + Duration::seconds(1)), Some(mark)));
    }
}
