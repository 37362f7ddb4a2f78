//! Shared database service wrapper used across binaries.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::{Connection, Transaction};
use tokio::sync::Mutex;

use crate::db::{
    ContactRepository, Database, DirectoryRepository, SqliteContactRepository,
    SqliteDirectoryRepository,
};
use crate::models::{Contact, ContactId, DirectoryConfig, DirectoryId};
use crate::Result;

/// Thread-safe service for DB and repository operations.
///
/// The inner lock is only held for synchronous work; callers must not keep a
/// connection or transaction across an `.await`.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        tracing::info!("Opening contact store at {}", db_path.display());
        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Filesystem path of the store, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run read-only or autocommit work against the connection.
    pub async fn with_connection<T>(
        &self,
        work: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let db = self.db.lock().await;
        work(db.connection())
    }

    /// Run work inside one transaction: committed on `Ok`, rolled back on `Err`.
    pub async fn with_transaction<T>(
        &self,
        work: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut db = self.db.lock().await;
        let tx = db.transaction()?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Register a new directory.
    pub async fn create_directory(&self, directory: &DirectoryConfig) -> Result<DirectoryConfig> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).create(directory))
            .await
    }

    /// Get a directory by ID.
    pub async fn get_directory(&self, id: DirectoryId) -> Result<Option<DirectoryConfig>> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).get(id))
            .await
    }

    /// List all directories.
    pub async fn list_directories(&self) -> Result<Vec<DirectoryConfig>> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).list())
            .await
    }

    /// Overwrite a stored directory.
    pub async fn update_directory(&self, directory: &DirectoryConfig) -> Result<()> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).update(directory))
            .await
    }

    /// Delete a directory together with its contacts.
    pub async fn delete_directory(&self, id: DirectoryId) -> Result<()> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).delete(id))
            .await
    }

    /// List directories flagged for scheduled sync.
    pub async fn list_active_directories(&self) -> Result<Vec<DirectoryConfig>> {
        self.with_connection(|conn| SqliteDirectoryRepository::new(conn).list_active())
            .await
    }

    /// List every contact of a directory.
    pub async fn list_contacts(&self, directory_id: DirectoryId) -> Result<Vec<Contact>> {
        self.with_connection(|conn| {
            SqliteContactRepository::new(conn).list_by_directory(directory_id)
        })
        .await
    }

    /// Insert a contact.
    pub async fn create_contact(&self, contact: &Contact) -> Result<Contact> {
        self.with_connection(|conn| SqliteContactRepository::new(conn).create(contact))
            .await
    }

    /// Get a contact by ID.
    pub async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        self.with_connection(|conn| SqliteContactRepository::new(conn).get(id))
            .await
    }

    /// Persist an edited contact.
    pub async fn update_contact(&self, contact: &Contact) -> Result<()> {
        self.with_connection(|conn| SqliteContactRepository::new(conn).update(contact))
            .await
    }

    /// Delete a contact.
    pub async fn delete_contact(&self, id: ContactId) -> Result<()> {
        self.with_connection(|conn| SqliteContactRepository::new(conn).delete(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let service = DatabaseService::open_in_memory().unwrap();
        let directory = service
            .create_directory(&DirectoryConfig::new("corp", "dc1", "dc=corp", "svc", "pw"))
            .await
            .unwrap();

        let result: Result<()> = service
            .with_transaction(|tx| {
                SqliteContactRepository::new(tx).create(&Contact::manual(directory.id, "Temp"))?;
                Err(Error::Database("boom".to_string()))
            })
            .await;
        assert!(result.is_err());

        assert!(service.list_contacts(directory.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_path_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("phonebook.db");

        let service = DatabaseService::open_path(&path).unwrap();
        assert_eq!(service.path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
