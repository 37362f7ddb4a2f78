//! Directory configuration model

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::util::normalize_text_option;

/// Local identity of a registered directory
pub type DirectoryId = i64;

/// Default LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// Default SMTP port
pub const DEFAULT_SMTP_PORT: u16 = 25;

/// Default search filter used when none is configured
pub const DEFAULT_SEARCH_FILTER: &str = "(objectClass=person)";

/// Connection and sync settings for one external directory.
///
/// The reconciliation engine treats everything except `last_sync` as read-only.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Local identifier (ignored on create)
    pub id: DirectoryId,
    /// Unique human-readable name
    pub name: String,
    /// Directory host name
    pub host: String,
    /// Directory port
    pub port: u16,
    /// Account used for the simple bind
    pub bind_login: String,
    /// Password used for the simple bind
    pub bind_password: String,
    /// Base DN for searches
    pub base_dn: String,
    /// Connect with `ldaps://` instead of `ldap://`
    pub use_ssl: bool,
    /// LDAP search filter selecting user entries
    pub search_filter: String,
    /// Free-form operator note
    pub description: Option<String>,
    /// Whether the scheduled cycle processes this directory
    pub is_active: bool,
    /// Sync watermark, whole seconds, UTC
    pub last_sync: Option<DateTime<Utc>>,
    /// Defer new contacts to manual confirmation
    pub notify_on_add: bool,
    /// Defer changed contacts to manual confirmation
    pub notify_on_update: bool,
    /// Mail channel used for deferred-change notifications
    pub mail: Option<MailSettings>,
}

impl DirectoryConfig {
    /// Create a directory config with defaults for everything but the connection basics.
    pub fn new(
        name: impl Into<String>,
        host: impl Into<String>,
        base_dn: impl Into<String>,
        bind_login: impl Into<String>,
        bind_password: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            host: host.into(),
            port: DEFAULT_LDAP_PORT,
            bind_login: bind_login.into(),
            bind_password: bind_password.into(),
            base_dn: base_dn.into(),
            use_ssl: false,
            search_filter: DEFAULT_SEARCH_FILTER.to_string(),
            description: None,
            is_active: false,
            last_sync: None,
            notify_on_add: false,
            notify_on_update: false,
            mail: None,
        }
    }

    /// Directory URL built from host, port and SSL flag
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "ldaps" } else { "ldap" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Search filter, falling back to the default when blank
    pub fn effective_search_filter(&self) -> &str {
        let filter = self.search_filter.trim();
        if filter.is_empty() {
            DEFAULT_SEARCH_FILTER
        } else {
            filter
        }
    }

    /// Mail channel settings when the channel is switched on and has a recipient.
    pub fn active_mail(&self) -> Option<&MailSettings> {
        self.mail
            .as_ref()
            .filter(|mail| mail.is_active && mail.recipient().is_some())
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DirectoryConfig")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url())
            .field("bind_login", &self.bind_login)
            .field("bind_password", &"[REDACTED]")
            .field("base_dn", &self.base_dn)
            .field("search_filter", &self.search_filter)
            .field("is_active", &self.is_active)
            .field("last_sync", &self.last_sync)
            .field("notify_on_add", &self.notify_on_add)
            .field("notify_on_update", &self.notify_on_update)
            .field("mail", &self.mail)
            .finish_non_exhaustive()
    }
}

/// SMTP settings and recipient for one directory's notifications
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Upgrade the connection with STARTTLS
    pub use_tls: bool,
    /// Connect with implicit TLS
    pub use_ssl: bool,
    pub from: Option<String>,
    pub to: Option<String>,
    pub is_active: bool,
}

impl MailSettings {
    /// Create active settings for the given SMTP host and recipient
    pub fn new(host: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SMTP_PORT,
            username: None,
            password: None,
            use_tls: true,
            use_ssl: false,
            from: None,
            to: Some(to.into()),
            is_active: true,
        }
    }

    /// Sender address; the SMTP username when no explicit sender is set.
    pub fn sender(&self) -> Option<String> {
        normalize_text_option(self.from.clone())
            .or_else(|| normalize_text_option(self.username.clone()))
    }

    /// Notification recipient, if configured
    pub fn recipient(&self) -> Option<String> {
        normalize_text_option(self.to.clone())
    }
}

impl fmt::Debug for MailSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("MailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("use_tls", &self.use_tls)
            .field("use_ssl", &self.use_ssl)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("is_active", &self.is_active)
            .finish()
    }
}
