//! Contact model and the remote directory record it mirrors

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::directory::DirectoryId;

/// Local identity of a contact row
pub type ContactId = i64;

/// Fields compared by the change fingerprint, in reporting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactField {
    DisplayName,
    Mail,
    Telephone,
    Mobile,
    Title,
    Department,
}

impl ContactField {
    /// Every mirrored field
    pub const ALL: [Self; 6] = [
        Self::DisplayName,
        Self::Mail,
        Self::Telephone,
        Self::Mobile,
        Self::Title,
        Self::Department,
    ];

    /// Stable field label used in notifications and outcomes
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DisplayName => "name",
            Self::Mail => "mail",
            Self::Telephone => "telephone",
            Self::Mobile => "mobile",
            Self::Title => "title",
            Self::Department => "department",
        }
    }
}

impl fmt::Display for ContactField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One differing field between a local contact and its remote record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: ContactField,
    pub old: Option<String>,
    pub new: Option<String>,
}

/// Snapshot-time view of one directory entry, already normalized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Canonical braced GUID
    pub guid: String,
    pub display_name: Option<String>,
    pub mail: Option<String>,
    pub telephone: Option<String>,
    pub mobile: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    /// Base64-encoded thumbnail photo
    pub photo: Option<String>,
    /// Directory `whenCreated`, UTC
    pub created_at: Option<DateTime<Utc>>,
    /// Directory `whenChanged`, UTC
    pub changed_at: Option<DateTime<Utc>>,
}

impl RemoteRecord {
    /// Create a record with only its identifier set
    pub fn new(guid: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            ..Self::default()
        }
    }

    /// Display name with a missing `cn` normalized to the empty string
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or("")
    }

    /// Value of a fingerprint field
    pub fn field(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::DisplayName => Some(self.name()),
            ContactField::Mail => self.mail.as_deref(),
            ContactField::Telephone => self.telephone.as_deref(),
            ContactField::Mobile => self.mobile.as_deref(),
            ContactField::Title => self.title.as_deref(),
            ContactField::Department => self.department.as_deref(),
        }
    }
}

/// A persisted contact.
///
/// Contacts with a `guid` mirror a directory entry and belong to the
/// reconciliation engine. Contacts without one were entered by hand and are
/// never touched by sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub guid: Option<String>,
    pub directory_id: DirectoryId,
    pub display_name: String,
    pub mail: Option<String>,
    pub telephone: Option<String>,
    pub mobile: Option<String>,
    pub title: Option<String>,
    pub department: Option<String>,
    pub photo: Option<String>,
    /// Map placement as `"x,y"`
    pub coordinates: Option<String>,
    pub is_on_map: bool,
}

impl Contact {
    /// Create a manual contact (no directory identity)
    pub fn manual(directory_id: DirectoryId, display_name: impl Into<String>) -> Self {
        Self {
            id: 0,
            guid: None,
            directory_id,
            display_name: display_name.into(),
            mail: None,
            telephone: None,
            mobile: None,
            title: None,
            department: None,
            photo: None,
            coordinates: None,
            is_on_map: false,
        }
    }

    /// Create an unsaved contact mirroring a remote record
    pub fn from_remote(directory_id: DirectoryId, remote: &RemoteRecord) -> Self {
        let mut contact = Self::manual(directory_id, remote.name());
        contact.guid = Some(remote.guid.clone());
        contact.apply_remote(remote);
        contact
    }

    /// Whether this row is owned by the reconciliation engine
    pub fn is_reconcilable(&self) -> bool {
        self.guid.as_deref().is_some_and(|guid| !guid.is_empty())
    }

    /// Value of a fingerprint field
    pub fn field(&self, field: ContactField) -> Option<&str> {
        match field {
            ContactField::DisplayName => Some(self.display_name.as_str()),
            ContactField::Mail => self.mail.as_deref(),
            ContactField::Telephone => self.telephone.as_deref(),
            ContactField::Mobile => self.mobile.as_deref(),
            ContactField::Title => self.title.as_deref(),
            ContactField::Department => self.department.as_deref(),
        }
    }

    /// Overwrite mirrored fields (and the photo) with the remote values.
    ///
    /// Map placement is local-only and left alone.
    pub fn apply_remote(&mut self, remote: &RemoteRecord) {
        self.display_name = remote.name().to_string();
        self.mail.clone_from(&remote.mail);
        self.telephone.clone_from(&remote.telephone);
        self.mobile.clone_from(&remote.mobile);
        self.title.clone_from(&remote.title);
        self.department.clone_from(&remote.department);
        self.photo.clone_from(&remote.photo);
    }

    /// Fingerprint comparison against a remote record.
    ///
    /// Returns one entry per differing field; empty means unchanged.
    pub fn diff(&self, remote: &RemoteRecord) -> Vec<FieldChange> {
        ContactField::ALL
            .into_iter()
            .filter_map(|field| {
                let old = self.field(field);
                let new = remote.field(field);
                (old != new).then(|| FieldChange {
                    field,
                    old: old.map(str::to_string),
                    new: new.map(str::to_string),
                })
            })
            .collect()
    }
}
