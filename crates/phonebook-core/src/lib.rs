//! phonebook-core - Core library for Phonebook
//!
//! This crate mirrors user entries from external directories (LDAP / Active
//! Directory) into a local contact store. It holds the models, the database
//! layer, the directory adapter, the reconciliation engine and the sync
//! orchestrator shared by the API server and the CLI.

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod notify;
pub mod quick_action;
pub mod reconcile;
pub mod services;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{Contact, ContactId, DirectoryConfig, DirectoryId, RemoteRecord};
