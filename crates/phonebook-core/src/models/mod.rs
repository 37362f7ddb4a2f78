//! Data models for Phonebook

mod contact;
mod directory;

pub use contact::{Contact, ContactField, ContactId, FieldChange, RemoteRecord};
pub use directory::{
    DirectoryConfig, DirectoryId, MailSettings, DEFAULT_LDAP_PORT, DEFAULT_SEARCH_FILTER,
    DEFAULT_SMTP_PORT,
};
