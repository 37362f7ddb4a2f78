//! Database layer for Phonebook

mod connection;
mod contact_repository;
mod directory_repository;
mod migrations;

pub use connection::Database;
pub use contact_repository::{ContactRepository, SqliteContactRepository};
pub use directory_repository::{DirectoryRepository, SqliteDirectoryRepository};
