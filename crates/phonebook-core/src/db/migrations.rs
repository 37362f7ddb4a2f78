//! Database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 1;

/// Run all pending migrations
pub fn run(conn: &mut Connection) -> Result<()> {
    let version = get_version(conn)?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    debug_assert_eq!(get_version(conn)?, CURRENT_VERSION);
    Ok(())
}

/// Get the current schema version
fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Migration to version 1: Initial schema
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS directories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            host TEXT NOT NULL,
            port INTEGER NOT NULL DEFAULT 389,
            base_dn TEXT NOT NULL,
            bind_login TEXT NOT NULL,
            bind_password TEXT NOT NULL,
            use_ssl INTEGER NOT NULL DEFAULT 0,
            search_filter TEXT NOT NULL DEFAULT '(objectClass=person)',
            description TEXT,
            is_active INTEGER NOT NULL DEFAULT 0,
            last_sync INTEGER,
            notify_on_add INTEGER NOT NULL DEFAULT 0,
            notify_on_update INTEGER NOT NULL DEFAULT 0,
            smtp_host TEXT,
            smtp_port INTEGER NOT NULL DEFAULT 25,
            smtp_username TEXT,
            smtp_password TEXT,
            smtp_use_tls INTEGER NOT NULL DEFAULT 1,
            smtp_use_ssl INTEGER NOT NULL DEFAULT 0,
            smtp_from TEXT,
            smtp_to TEXT,
            smtp_is_active INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            guid TEXT,
            directory_id INTEGER NOT NULL REFERENCES directories(id) ON DELETE CASCADE,
            display_name TEXT NOT NULL,
            mail TEXT,
            telephone TEXT,
            mobile TEXT,
            title TEXT,
            department TEXT,
            photo TEXT,
            coordinates TEXT,
            is_on_map INTEGER NOT NULL DEFAULT 0
        );

        CREATE INDEX IF NOT EXISTS idx_contacts_directory ON contacts(directory_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_contacts_directory_guid
            ON contacts(directory_id, guid)
            WHERE guid IS NOT NULL AND guid != '';

        INSERT INTO schema_version (version) VALUES (1);",
    )?;

    tx.commit()?;
    tracing::info!("Migrated database to version 1");
    Ok(())
}
