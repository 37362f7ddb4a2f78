use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use phonebook_core::models::{ContactId, DirectoryId, DEFAULT_LDAP_PORT, DEFAULT_SMTP_PORT};

#[derive(Parser)]
#[command(name = "phonebook")]
#[command(about = "Mirror directory users into the local phonebook")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configured directories
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
    /// Browse and add local contacts
    Contact {
        #[command(subcommand)]
        command: ContactCommands,
    },
    /// Run a sync cycle now
    Sync {
        /// Sync only this directory, even if it is inactive
        #[arg(long, value_name = "ID")]
        directory: Option<DirectoryId>,
    },
    /// Create a contact deferred by the add gate
    QuickAdd {
        /// Directory ID
        directory_id: DirectoryId,
        /// Directory GUID of the entry
        guid: String,
    },
    /// Apply a change deferred by the update gate
    QuickUpdate {
        /// Directory ID
        directory_id: DirectoryId,
        /// Directory GUID of the entry
        guid: String,
    },
}

#[derive(Subcommand)]
pub enum DirectoryCommands {
    /// Register a directory
    Add(DirectoryAddArgs),
    /// List registered directories
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change settings of a registered directory
    Edit(DirectoryEditArgs),
    /// Remove a directory and all of its contacts
    Delete {
        /// Directory ID
        id: DirectoryId,
    },
    /// Bind to a directory and disconnect
    Test {
        /// Directory ID
        id: DirectoryId,
    },
    /// Send a test message through a directory's mail channel
    TestMail {
        /// Directory ID
        id: DirectoryId,
    },
}

#[derive(Args)]
pub struct DirectoryAddArgs {
    /// Unique directory name
    #[arg(long)]
    pub name: String,
    /// Directory host name
    #[arg(long)]
    pub host: String,
    #[arg(long, default_value_t = DEFAULT_LDAP_PORT)]
    pub port: u16,
    /// Base DN for user searches
    #[arg(long, value_name = "DN")]
    pub base_dn: String,
    #[arg(long, value_name = "LOGIN")]
    pub bind_login: String,
    #[arg(long, value_name = "PASSWORD")]
    pub bind_password: String,
    /// Connect with ldaps://
    #[arg(long)]
    pub ssl: bool,
    /// LDAP filter selecting user entries
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Include in scheduled sync cycles
    #[arg(long)]
    pub active: bool,
    /// Defer new contacts to a notification
    #[arg(long)]
    pub notify_on_add: bool,
    /// Defer changed contacts to a notification
    #[arg(long)]
    pub notify_on_update: bool,
    #[command(flatten)]
    pub smtp: SmtpArgs,
}

#[derive(Args)]
pub struct SmtpArgs {
    /// SMTP relay for notifications
    #[arg(long, value_name = "HOST", requires = "smtp_to")]
    pub smtp_host: Option<String>,
    #[arg(long, default_value_t = DEFAULT_SMTP_PORT)]
    pub smtp_port: u16,
    #[arg(long, value_name = "USER")]
    pub smtp_username: Option<String>,
    #[arg(long, value_name = "PASSWORD")]
    pub smtp_password: Option<String>,
    /// Connect with implicit TLS instead of STARTTLS
    #[arg(long)]
    pub smtp_ssl: bool,
    /// Send in plain text without STARTTLS
    #[arg(long, conflicts_with = "smtp_ssl")]
    pub smtp_no_tls: bool,
    /// Sender address (defaults to the SMTP username)
    #[arg(long, value_name = "ADDRESS")]
    pub smtp_from: Option<String>,
    /// Notification recipient
    #[arg(long, value_name = "ADDRESS", requires = "smtp_host")]
    pub smtp_to: Option<String>,
}

/// Directory changes; omitted flags keep the stored value
#[derive(Args)]
pub struct DirectoryEditArgs {
    /// Directory ID
    pub id: DirectoryId,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, value_name = "DN")]
    pub base_dn: Option<String>,
    #[arg(long, value_name = "LOGIN")]
    pub bind_login: Option<String>,
    /// New bind password; blank keeps the stored one
    #[arg(long, value_name = "PASSWORD")]
    pub bind_password: Option<String>,
    #[arg(long, value_name = "BOOL")]
    pub ssl: Option<bool>,
    /// LDAP filter; blank restores the default
    #[arg(long, value_name = "FILTER")]
    pub filter: Option<String>,
    /// Operator note; blank clears it
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long, value_name = "BOOL")]
    pub active: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub notify_on_add: Option<bool>,
    #[arg(long, value_name = "BOOL")]
    pub notify_on_update: Option<bool>,
    /// Forget the sync watermark so the next pass compares every entry
    #[arg(long)]
    pub reset_watermark: bool,
    #[command(flatten)]
    pub smtp: SmtpEditArgs,
}

#[derive(Args)]
pub struct SmtpEditArgs {
    #[arg(long, value_name = "HOST")]
    pub smtp_host: Option<String>,
    #[arg(long)]
    pub smtp_port: Option<u16>,
    /// SMTP login; blank clears it
    #[arg(long, value_name = "USER")]
    pub smtp_username: Option<String>,
    /// New SMTP password; blank keeps the stored one
    #[arg(long, value_name = "PASSWORD")]
    pub smtp_password: Option<String>,
    /// Implicit TLS; turning it on also turns STARTTLS off
    #[arg(long, value_name = "BOOL")]
    pub smtp_ssl: Option<bool>,
    /// STARTTLS upgrade
    #[arg(long, value_name = "BOOL")]
    pub smtp_tls: Option<bool>,
    #[arg(long, value_name = "ADDRESS")]
    pub smtp_from: Option<String>,
    #[arg(long, value_name = "ADDRESS")]
    pub smtp_to: Option<String>,
    /// Switch the mail channel on or off
    #[arg(long, value_name = "BOOL")]
    pub smtp_active: Option<bool>,
    /// Remove the mail channel entirely
    #[arg(
        long,
        conflicts_with_all = [
            "smtp_host", "smtp_port", "smtp_username", "smtp_password", "smtp_ssl",
            "smtp_tls", "smtp_from", "smtp_to", "smtp_active",
        ]
    )]
    pub clear_smtp: bool,
}

#[derive(Subcommand)]
pub enum ContactCommands {
    /// List contacts of one directory
    List {
        /// Directory ID
        directory_id: DirectoryId,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a manual contact that sync never touches
    Add(ContactAddArgs),
    /// Change fields of a stored contact
    Edit(ContactEditArgs),
    /// Remove a stored contact
    Delete {
        /// Contact ID
        id: ContactId,
    },
}

#[derive(Args)]
pub struct ContactAddArgs {
    /// Directory ID
    pub directory_id: DirectoryId,
    /// Display name
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub mail: Option<String>,
    #[arg(long)]
    pub telephone: Option<String>,
    #[arg(long)]
    pub mobile: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
}

/// Contact changes; omitted flags keep the stored value, blank ones clear it
#[derive(Args)]
pub struct ContactEditArgs {
    /// Contact ID
    pub id: ContactId,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub mail: Option<String>,
    #[arg(long)]
    pub telephone: Option<String>,
    #[arg(long)]
    pub mobile: Option<String>,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    /// Drop the stored photo
    #[arg(long)]
    pub clear_photo: bool,
}
