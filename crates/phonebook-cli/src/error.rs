use std::io;

use phonebook_core::config::ConfigError;
use phonebook_core::directory::DirectoryError;
use phonebook_core::models::{ContactId, DirectoryId};
use phonebook_core::notify::MailError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] phonebook_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Directory not found: {0}")]
    DirectoryNotFound(DirectoryId),
    #[error("Contact not found: {0}")]
    ContactNotFound(ContactId),
    #[error("Contact name cannot be empty")]
    EmptyContactName,
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
    #[error("Sync failed for {0} directory(ies)")]
    SyncFailed(usize),
}
