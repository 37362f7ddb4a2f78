//! Directory configuration repository

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{DirectoryConfig, DirectoryId, MailSettings};

const DIRECTORY_COLUMNS: &str = "id, name, host, port, base_dn, bind_login, bind_password, \
     use_ssl, search_filter, description, is_active, last_sync, notify_on_add, notify_on_update, \
     smtp_host, smtp_port, smtp_username, smtp_password, smtp_use_tls, smtp_use_ssl, smtp_from, \
     smtp_to, smtp_is_active";

/// Trait for directory configuration storage
pub trait DirectoryRepository {
    /// Register a new directory; the `id` of the input is ignored
    fn create(&self, directory: &DirectoryConfig) -> Result<DirectoryConfig>;

    /// Get a directory by ID
    fn get(&self, id: DirectoryId) -> Result<Option<DirectoryConfig>>;

    /// List all directories by name
    fn list(&self) -> Result<Vec<DirectoryConfig>>;

    /// List directories flagged for scheduled sync, by ID
    fn list_active(&self) -> Result<Vec<DirectoryConfig>>;

    /// Overwrite every stored field of an existing directory, `last_sync` included
    fn update(&self, directory: &DirectoryConfig) -> Result<()>;

    /// Remove a directory; its contacts go with it
    fn delete(&self, id: DirectoryId) -> Result<()>;

    /// Store a new sync watermark
    fn set_watermark(&self, id: DirectoryId, watermark: DateTime<Utc>) -> Result<()>;
}

/// `SQLite` implementation of `DirectoryRepository`
pub struct SqliteDirectoryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDirectoryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a directory from a database row
    fn parse_directory(row: &rusqlite::Row<'_>) -> rusqlite::Result<DirectoryConfig> {
        let smtp_host: Option<String> = row.get(14)?;
        let mail = smtp_host.map(|host| -> rusqlite::Result<MailSettings> {
            Ok(MailSettings {
                host,
                port: row.get(15)?,
                username: row.get(16)?,
                password: row.get(17)?,
                use_tls: row.get(18)?,
                use_ssl: row.get(19)?,
                from: row.get(20)?,
                to: row.get(21)?,
                is_active: row.get(22)?,
            })
        });

        let last_sync: Option<i64> = row.get(11)?;
        Ok(DirectoryConfig {
            id: row.get(0)?,
            name: row.get(1)?,
            host: row.get(2)?,
            port: row.get(3)?,
            base_dn: row.get(4)?,
            bind_login: row.get(5)?,
            bind_password: row.get(6)?,
            use_ssl: row.get(7)?,
            search_filter: row.get(8)?,
            description: row.get(9)?,
            is_active: row.get(10)?,
            last_sync: last_sync.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            notify_on_add: row.get(12)?,
            notify_on_update: row.get(13)?,
            mail: mail.transpose()?,
        })
    }

    fn validate(directory: &DirectoryConfig) -> Result<()> {
        if directory.name.trim().is_empty() {
            return Err(Error::InvalidInput("Directory name must not be empty".into()));
        }
        if directory.host.trim().is_empty() {
            return Err(Error::InvalidInput("Directory host must not be empty".into()));
        }
        Ok(())
    }
}

impl DirectoryRepository for SqliteDirectoryRepository<'_> {
    fn create(&self, directory: &DirectoryConfig) -> Result<DirectoryConfig> {
        Self::validate(directory)?;

        let mail = directory.mail.as_ref();
        self.conn.execute(
            "INSERT INTO directories (
                name, host, port, base_dn, bind_login, bind_password, use_ssl, search_filter,
                description, is_active, last_sync, notify_on_add, notify_on_update,
                smtp_host, smtp_port, smtp_username, smtp_password, smtp_use_tls, smtp_use_ssl,
                smtp_from, smtp_to, smtp_is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                directory.name.trim(),
                directory.host.trim(),
                directory.port,
                directory.base_dn,
                directory.bind_login,
                directory.bind_password,
                directory.use_ssl,
                directory.effective_search_filter(),
                directory.description,
                directory.is_active,
                directory.last_sync.map(|ts| ts.timestamp()),
                directory.notify_on_add,
                directory.notify_on_update,
                mail.map(|mail| mail.host.as_str()),
                mail.map_or(crate::models::DEFAULT_SMTP_PORT, |mail| mail.port),
                mail.and_then(|mail| mail.username.as_deref()),
                mail.and_then(|mail| mail.password.as_deref()),
                mail.is_none_or(|mail| mail.use_tls),
                mail.is_some_and(|mail| mail.use_ssl),
                mail.and_then(|mail| mail.from.as_deref()),
                mail.and_then(|mail| mail.to.as_deref()),
                mail.is_some_and(|mail| mail.is_active),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get(id)?.ok_or_else(|| Error::NotFound(format!("directory {id}")))
    }

    fn get(&self, id: DirectoryId) -> Result<Option<DirectoryConfig>> {
        let directory = self
            .conn
            .query_row(
                &format!("SELECT {DIRECTORY_COLUMNS} FROM directories WHERE id = ?"),
                params![id],
                Self::parse_directory,
            )
            .optional()?;
        Ok(directory)
    }

    fn list(&self) -> Result<Vec<DirectoryConfig>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DIRECTORY_COLUMNS} FROM directories ORDER BY name"))?;
        let directories = stmt
            .query_map([], Self::parse_directory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(directories)
    }

    fn list_active(&self) -> Result<Vec<DirectoryConfig>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DIRECTORY_COLUMNS} FROM directories WHERE is_active = 1 ORDER BY id"
        ))?;
        let directories = stmt
            .query_map([], Self::parse_directory)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(directories)
    }

    fn update(&self, directory: &DirectoryConfig) -> Result<()> {
        Self::validate(directory)?;

        let mail = directory.mail.as_ref();
        let rows = self.conn.execute(
            "UPDATE directories SET
                name = ?, host = ?, port = ?, base_dn = ?, bind_login = ?, bind_password = ?,
                use_ssl = ?, search_filter = ?, description = ?, is_active = ?, last_sync = ?,
                notify_on_add = ?, notify_on_update = ?, smtp_host = ?, smtp_port = ?,
                smtp_username = ?, smtp_password = ?, smtp_use_tls = ?, smtp_use_ssl = ?,
                smtp_from = ?, smtp_to = ?, smtp_is_active = ?
             WHERE id = ?",
            params![
                directory.name.trim(),
                directory.host.trim(),
                directory.port,
                directory.base_dn,
                directory.bind_login,
                directory.bind_password,
                directory.use_ssl,
                directory.effective_search_filter(),
                directory.description,
                directory.is_active,
                directory.last_sync.map(|ts| ts.timestamp()),
                directory.notify_on_add,
                directory.notify_on_update,
                mail.map(|mail| mail.host.as_str()),
                mail.map_or(crate::models::DEFAULT_SMTP_PORT, |mail| mail.port),
                mail.and_then(|mail| mail.username.as_deref()),
                mail.and_then(|mail| mail.password.as_deref()),
                mail.is_none_or(|mail| mail.use_tls),
                mail.is_some_and(|mail| mail.use_ssl),
                mail.and_then(|mail| mail.from.as_deref()),
                mail.and_then(|mail| mail.to.as_deref()),
                mail.is_some_and(|mail| mail.is_active),
                directory.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("directory {}", directory.id)));
        }
        Ok(())
    }

    fn delete(&self, id: DirectoryId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM directories WHERE id = ?", params![id])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("directory {id}")));
        }
        Ok(())
    }

    fn set_watermark(&self, id: DirectoryId, watermark: DateTime<Utc>) -> Result<()> {
        // The watermark never moves backwards
        let rows = self.conn.execute(
            "UPDATE directories SET last_sync = MAX(COALESCE(last_sync, 0), ?) WHERE id = ?",
            params![watermark.timestamp(), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("directory {id}")));
        }
        Ok(())
    }
}
