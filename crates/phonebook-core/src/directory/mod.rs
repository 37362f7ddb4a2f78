//! Read-only access to external user directories.
//!
//! A [`DirectoryConnector`] opens a [`DirectorySession`] for one configured
//! directory; sessions hand back fully normalized [`RemoteRecord`]s. The
//! production implementation is [`LdapConnector`].

pub mod codec;
mod ldap;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DirectoryConfig, RemoteRecord};

pub use ldap::LdapConnector;

/// Attributes requested for every user entry.
pub const USER_ATTRIBUTES: &[&str] = &[
    "cn",
    "mail",
    "telephoneNumber",
    "mobile",
    "title",
    "department",
    "thumbnailPhoto",
    "objectGUID",
    "whenCreated",
    "whenChanged",
];

/// Failures talking to a directory server
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// Credentials or bind DN rejected
    #[error("Directory bind failed: {0}")]
    Bind(String),

    /// Server unreachable or connection dropped
    #[error("Directory unreachable: {0}")]
    Network(String),

    /// Connection attempt did not finish in time
    #[error("Directory connection timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The search request itself failed
    #[error("Directory search failed: {0}")]
    Search(String),
}

impl DirectoryError {
    /// Whether retrying on the next tick may succeed
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_))
    }
}

/// Opens bound sessions against a directory
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    /// Connect and bind with the directory's service account
    async fn connect(
        &self,
        config: &DirectoryConfig,
    ) -> Result<Box<dyn DirectorySession>, DirectoryError>;
}

/// A bound directory session
#[async_trait]
pub trait DirectorySession: Send {
    /// Fetch every entry matching `search_filter` under the base DN.
    ///
    /// Entries without a decodable GUID are skipped.
    async fn fetch_all(
        &mut self,
        search_filter: &str,
        attributes: &[&str],
    ) -> Result<Vec<RemoteRecord>, DirectoryError>;

    /// Fetch the single entry with the given GUID that also matches `search_filter`
    async fn fetch_by_guid(
        &mut self,
        search_filter: &str,
        guid: &str,
    ) -> Result<Option<RemoteRecord>, DirectoryError> {
        let wanted = codec::canonical_guid(guid);
        let records = self.fetch_all(search_filter, USER_ATTRIBUTES).await?;
        Ok(records
            .into_iter()
            .find(|record| wanted.as_deref() == Some(record.guid.as_str())))
    }

    /// Close the session; calling it twice is a no-op
    async fn disconnect(&mut self);
}

/// Fetch a full snapshot of a directory, always releasing the session.
pub async fn fetch_snapshot(
    connector: &dyn DirectoryConnector,
    config: &DirectoryConfig,
) -> Result<Vec<RemoteRecord>, DirectoryError> {
    let mut session = connector.connect(config).await?;
    let result = session
        .fetch_all(config.effective_search_filter(), USER_ATTRIBUTES)
        .await;
    session.disconnect().await;

    if let Ok(records) = &result {
        tracing::debug!(
            directory_id = config.id,
            records = records.len(),
            "Fetched directory snapshot"
        );
    }
    result
}

/// Fetch one live record by GUID, always releasing the session.
pub async fn fetch_record(
    connector: &dyn DirectoryConnector,
    config: &DirectoryConfig,
    guid: &str,
) -> Result<Option<RemoteRecord>, DirectoryError> {
    let mut session = connector.connect(config).await?;
    let result = session
        .fetch_by_guid(config.effective_search_filter(), guid)
        .await;
    session.disconnect().await;
    result
}

/// Check that a directory accepts a connection and bind.
pub async fn test_connection(
    connector: &dyn DirectoryConnector,
    config: &DirectoryConfig,
) -> Result<(), DirectoryError> {
    let mut session = connector.connect(config).await?;
    session.disconnect().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeDirectory;
    use pretty_assertions::assert_eq;

    fn config() -> DirectoryConfig {
        DirectoryConfig::new("corp", "dc1", "dc=corp", "svc", "pw")
    }

    #[tokio::test]
    async fn snapshot_disconnects_after_success() {
        let directory = FakeDirectory::new(vec![RemoteRecord::new("{a}")]);

        let records = fetch_snapshot(&directory, &config()).await.unwrap();

        assert_eq!(records, vec![RemoteRecord::new("{a}")]);
        assert_eq!(directory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn snapshot_disconnects_after_failed_fetch() {
        let directory = FakeDirectory::new(Vec::new());
        directory.fail_search("size limit exceeded");

        let result = fetch_snapshot(&directory, &config()).await;

        assert!(matches!(result, Err(DirectoryError::Search(_))));
        assert_eq!(directory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn connect_failure_surfaces() {
        let directory = FakeDirectory::new(Vec::new());
        directory.fail_connect(DirectoryError::Timeout(Duration::from_secs(10)));

        let result = fetch_snapshot(&directory, &config()).await;

        assert_eq!(result, Err(DirectoryError::Timeout(Duration::from_secs(10))));
        assert_eq!(directory.connects(), 0);
    }

    #[tokio::test]
    async fn fetch_record_matches_guid_case_insensitively() {
        let guid = "{d4c3b2a1-f6e5-1807-293a-4b5c6d7e8f90}";
        let directory = FakeDirectory::new(vec![RemoteRecord::new(guid)]);

        let found = fetch_record(&directory, &config(), &guid.to_uppercase())
            .await
            .unwrap();
        assert_eq!(found.map(|record| record.guid), Some(guid.to_string()));

        let missing = fetch_record(&directory, &config(), "{00000000-0000-0000-0000-000000000000}")
            .await
            .unwrap();
        assert_eq!(missing, None);
        assert_eq!(directory.open_sessions(), 0);
    }

    #[test]
    fn transient_errors() {
        assert!(DirectoryError::Network("reset".into()).is_transient());
        assert!(DirectoryError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(!DirectoryError::Bind("49".into()).is_transient());
        assert!(!DirectoryError::Search("bad filter".into()).is_transient());
    }
}
