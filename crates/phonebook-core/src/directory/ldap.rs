//! LDAP / Active Directory connector built on `ldap3`

use std::time::Duration;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};

use super::codec;
use super::{DirectoryConnector, DirectoryError, DirectorySession, USER_ATTRIBUTES};
use crate::models::{DirectoryConfig, RemoteRecord};
use crate::util::normalize_text_option;

/// Result code for `invalidCredentials`
const RC_INVALID_CREDENTIALS: u32 = 49;

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connects to directories over LDAP or LDAPS
#[derive(Debug, Clone)]
pub struct LdapConnector {
    timeout: Duration,
}

impl LdapConnector {
    /// Create a connector with the given connection timeout
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for LdapConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl DirectoryConnector for LdapConnector {
    async fn connect(
        &self,
        config: &DirectoryConfig,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError> {
        let url = config.url();
        tracing::debug!(directory_id = config.id, url = %url, "Connecting to directory");

        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &url)
            .await
            .map_err(|error| self.connect_error(error))?;

        tokio::spawn(async move {
            if let Err(error) = conn.drive().await {
                tracing::warn!(error = %error, "LDAP connection driver error");
            }
        });

        let result = ldap
            .simple_bind(&config.bind_login, &config.bind_password)
            .await
            .map_err(|error| self.connect_error(error))?;

        if result.rc != 0 {
            if let Err(error) = ldap.unbind().await {
                tracing::warn!(error = %error, "Error during LDAP unbind after failed bind");
            }
            let message = if result.rc == RC_INVALID_CREDENTIALS {
                format!("invalid credentials for {}", config.bind_login)
            } else {
                format!("code {}: {}", result.rc, result.text)
            };
            return Err(DirectoryError::Bind(message));
        }

        tracing::debug!(directory_id = config.id, "Directory bind succeeded");
        Ok(Box::new(LdapSession {
            ldap,
            base_dn: config.base_dn.clone(),
            open: true,
        }))
    }
}

impl LdapConnector {
    fn connect_error(&self, error: LdapError) -> DirectoryError {
        match error {
            LdapError::Timeout { .. } => DirectoryError::Timeout(self.timeout),
            other => DirectoryError::Network(other.to_string()),
        }
    }
}

struct LdapSession {
    ldap: Ldap,
    base_dn: String,
    open: bool,
}

impl LdapSession {
    async fn search(
        &mut self,
        filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<RemoteRecord>, DirectoryError> {
        let (entries, _) = self
            .ldap
            .search(&self.base_dn, Scope::Subtree, filter, attributes.to_vec())
            .await
            .map_err(search_error)?
            .success()
            .map_err(search_error)?;

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = SearchEntry::construct(entry);
            match record_from_entry(&entry) {
                Some(record) => records.push(record),
                None => tracing::debug!(dn = %entry.dn, "Skipping entry without a usable objectGUID"),
            }
        }
        Ok(records)
    }
}

fn search_error(error: LdapError) -> DirectoryError {
    match error {
        LdapError::Io { .. } => DirectoryError::Network(error.to_string()),
        other => DirectoryError::Search(other.to_string()),
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn fetch_all(
        &mut self,
        search_filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<RemoteRecord>, DirectoryError> {
        self.search(search_filter, attributes).await
    }

    async fn fetch_by_guid(
        &mut self,
        search_filter: &str,
        guid: &str,
    ) -> Result<Option<RemoteRecord>, DirectoryError> {
        let Some(value) = codec::guid_filter_value(guid) else {
            return Ok(None);
        };
        let records = self
            .search(&guid_filter(search_filter, &value), USER_ATTRIBUTES)
            .await?;
        Ok(records.into_iter().next())
    }

    async fn disconnect(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;
        if let Err(error) = self.ldap.unbind().await {
            tracing::warn!(error = %error, "Error during LDAP unbind");
        }
    }
}

/// AND the configured filter with an escaped `objectGUID` match.
///
/// Stored filters may omit their outer parentheses (`objectClass=person`),
/// which is only legal at the top level.
fn guid_filter(search_filter: &str, escaped_guid: &str) -> String {
    let search_filter = search_filter.trim();
    if search_filter.starts_with('(') {
        format!("(&{search_filter}(objectGUID={escaped_guid}))")
    } else {
        format!("(&({search_filter})(objectGUID={escaped_guid}))")
    }
}

fn text(entry: &SearchEntry, name: &str) -> Option<String> {
    let value = entry
        .attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .cloned();
    normalize_text_option(value)
}

fn binary<'a>(entry: &'a SearchEntry, name: &str) -> Option<&'a [u8]> {
    entry
        .bin_attrs
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(Vec::as_slice)
        .or_else(|| {
            // Binary values that happen to be valid UTF-8 land in `attrs`
            entry
                .attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .and_then(|(_, values)| values.first())
                .map(String::as_bytes)
        })
}

/// Normalize one search entry; `None` when it has no decodable GUID.
fn record_from_entry(entry: &SearchEntry) -> Option<RemoteRecord> {
    let guid = codec::guid_from_bytes(binary(entry, "objectGUID")?)?;
    Some(RemoteRecord {
        guid,
        display_name: text(entry, "cn"),
        mail: text(entry, "mail"),
        telephone: text(entry, "telephoneNumber"),
        mobile: text(entry, "mobile"),
        title: text(entry, "title"),
        department: text(entry, "department"),
        photo: binary(entry, "thumbnailPhoto").and_then(codec::encode_photo),
        created_at: text(entry, "whenCreated")
            .as_deref()
            .and_then(codec::parse_generalized_time),
        changed_at: text(entry, "whenChanged")
            .as_deref()
            .and_then(codec::parse_generalized_time),
    })
}
