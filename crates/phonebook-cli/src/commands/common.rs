use std::env;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use phonebook_core::config::SyncServiceConfig;
use phonebook_core::models::{Contact, ContactId, DirectoryConfig, DirectoryId};
use phonebook_core::services::DatabaseService;
use phonebook_core::util::normalize_text_option;
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct DirectoryListItem {
    pub id: DirectoryId,
    pub name: String,
    pub url: String,
    pub base_dn: String,
    pub search_filter: String,
    pub is_active: bool,
    pub notify_on_add: bool,
    pub notify_on_update: bool,
    pub mail_active: bool,
    pub last_sync: Option<String>,
}

/// Load the shared service config; `--db-path` overrides `PHONEBOOK_DB_PATH`.
pub fn load_config(cli_db_path: Option<PathBuf>) -> Result<SyncServiceConfig, CliError> {
    let db_path = cli_db_path.map(|path| path.to_string_lossy().into_owned());
    Ok(SyncServiceConfig::from_lookup(|name| {
        if name == "PHONEBOOK_DB_PATH" && db_path.is_some() {
            return db_path.clone();
        }
        env::var(name).ok()
    })?)
}

pub fn open_database(config: &SyncServiceConfig) -> Result<DatabaseService, CliError> {
    Ok(DatabaseService::open_path(&config.db_path)?)
}

pub async fn require_directory(
    db: &DatabaseService,
    id: DirectoryId,
) -> Result<DirectoryConfig, CliError> {
    db.get_directory(id)
        .await?
        .ok_or(CliError::DirectoryNotFound(id))
}

pub async fn require_contact(db: &DatabaseService, id: ContactId) -> Result<Contact, CliError> {
    db.get_contact(id).await?.ok_or(CliError::ContactNotFound(id))
}

/// Trimmed value of a required text argument
pub fn require_text(value: String, field: &'static str) -> Result<String, CliError> {
    normalize_text_option(Some(value)).ok_or(CliError::EmptyField(field))
}

pub fn directory_to_item(directory: &DirectoryConfig) -> DirectoryListItem {
    DirectoryListItem {
        id: directory.id,
        name: directory.name.clone(),
        url: directory.url(),
        base_dn: directory.base_dn.clone(),
        search_filter: directory.effective_search_filter().to_string(),
        is_active: directory.is_active,
        notify_on_add: directory.notify_on_add,
        notify_on_update: directory.notify_on_update,
        mail_active: directory.active_mail().is_some(),
        last_sync: directory.last_sync.map(|stamp| stamp.to_rfc3339()),
    }
}

pub fn format_directory_lines(directories: &[DirectoryConfig]) -> Vec<String> {
    directories
        .iter()
        .map(|directory| {
            let mut flags = Vec::new();
            if directory.is_active {
                flags.push("active");
            }
            if directory.notify_on_add {
                flags.push("notify-add");
            }
            if directory.notify_on_update {
                flags.push("notify-update");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            format!(
                "{}  {}  {}  last sync: {}{flags}",
                directory.id,
                directory.name,
                directory.url(),
                format_sync_timestamp(directory.last_sync),
            )
        })
        .collect()
}

pub fn format_contact_lines(contacts: &[Contact]) -> Vec<String> {
    contacts
        .iter()
        .map(|contact| {
            let source = if contact.is_reconcilable() {
                "synced"
            } else {
                "manual"
            };
            let details = [&contact.mail, &contact.telephone, &contact.title]
                .into_iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" | ");
            if details.is_empty() {
                format!("{}  {}  ({source})", contact.id, contact.display_name)
            } else {
                format!("{}  {}  {details}  ({source})", contact.id, contact.display_name)
            }
        })
        .collect()
}

pub fn format_sync_timestamp(stamp: Option<DateTime<Utc>>) -> String {
    stamp.map_or_else(
        || "never".to_string(),
        |stamp| stamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
