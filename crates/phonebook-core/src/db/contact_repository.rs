//! Contact repository implementation

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::models::{Contact, ContactId, DirectoryId};

const CONTACT_COLUMNS: &str = "id, guid, directory_id, display_name, mail, telephone, mobile, \
     title, department, photo, coordinates, is_on_map";

/// Trait for contact storage operations
pub trait ContactRepository {
    /// Insert a contact; the `id` of the input is ignored
    fn create(&self, contact: &Contact) -> Result<Contact>;

    /// Persist all fields of an existing contact
    fn update(&self, contact: &Contact) -> Result<()>;

    /// Hard delete a contact
    fn delete(&self, id: ContactId) -> Result<()>;

    /// Get a contact by ID
    fn get(&self, id: ContactId) -> Result<Option<Contact>>;

    /// Find a contact of a directory by its directory GUID
    fn find_by_guid(&self, directory_id: DirectoryId, guid: &str) -> Result<Option<Contact>>;

    /// List every contact of a directory, manual ones included, by name
    fn list_by_directory(&self, directory_id: DirectoryId) -> Result<Vec<Contact>>;

    /// List the contacts owned by sync: those with a non-empty GUID
    fn list_reconcilable(&self, directory_id: DirectoryId) -> Result<Vec<Contact>>;
}

/// `SQLite` implementation of `ContactRepository`
pub struct SqliteContactRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteContactRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a contact from a database row
    fn parse_contact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
        Ok(Contact {
            id: row.get(0)?,
            guid: row.get(1)?,
            directory_id: row.get(2)?,
            display_name: row.get(3)?,
            mail: row.get(4)?,
            telephone: row.get(5)?,
            mobile: row.get(6)?,
            title: row.get(7)?,
            department: row.get(8)?,
            photo: row.get(9)?,
            coordinates: row.get(10)?,
            is_on_map: row.get(11)?,
        })
    }

    fn query_contacts(&self, sql: &str, directory_id: DirectoryId) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(sql)?;
        let contacts = stmt
            .query_map(params![directory_id], Self::parse_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }
}

impl ContactRepository for SqliteContactRepository<'_> {
    fn create(&self, contact: &Contact) -> Result<Contact> {
        self.conn.execute(
            "INSERT INTO contacts (
                guid, directory_id, display_name, mail, telephone, mobile, title, department,
                photo, coordinates, is_on_map
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                contact.guid,
                contact.directory_id,
                contact.display_name,
                contact.mail,
                contact.telephone,
                contact.mobile,
                contact.title,
                contact.department,
                contact.photo,
                contact.coordinates,
                contact.is_on_map,
            ],
        )?;

        Ok(Contact {
            id: self.conn.last_insert_rowid(),
            ..contact.clone()
        })
    }

    fn update(&self, contact: &Contact) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE contacts SET
                guid = ?, display_name = ?, mail = ?, telephone = ?, mobile = ?, title = ?,
                department = ?, photo = ?, coordinates = ?, is_on_map = ?
             WHERE id = ?",
            params![
                contact.guid,
                contact.display_name,
                contact.mail,
                contact.telephone,
                contact.mobile,
                contact.title,
                contact.department,
                contact.photo,
                contact.coordinates,
                contact.is_on_map,
                contact.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("contact {}", contact.id)));
        }
        Ok(())
    }

    fn delete(&self, id: ContactId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM contacts WHERE id = ?", params![id])?;

        if rows == 0 {
            return Err(Error::NotFound(format!("contact {id}")));
        }
        Ok(())
    }

    fn get(&self, id: ContactId) -> Result<Option<Contact>> {
        let contact = self
            .conn
            .query_row(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?"),
                params![id],
                Self::parse_contact,
            )
            .optional()?;
        Ok(contact)
    }

    fn find_by_guid(&self, directory_id: DirectoryId, guid: &str) -> Result<Option<Contact>> {
        if guid.is_empty() {
            return Ok(None);
        }

        let contact = self
            .conn
            .query_row(
                &format!(
                    "SELECT {CONTACT_COLUMNS} FROM contacts WHERE directory_id = ? AND guid = ?"
                ),
                params![directory_id, guid],
                Self::parse_contact,
            )
            .optional()?;
        Ok(contact)
    }

    fn list_by_directory(&self, directory_id: DirectoryId) -> Result<Vec<Contact>> {
        self.query_contacts(
            &format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE directory_id = ?
                 ORDER BY display_name COLLATE NOCASE, id"
            ),
            directory_id,
        )
    }

    fn list_reconcilable(&self, directory_id: DirectoryId) -> Result<Vec<Contact>> {
        self.query_contacts(
            &format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts
                 WHERE directory_id = ? AND guid IS NOT NULL AND guid != ''
                 ORDER BY id"
            ),
            directory_id,
        )
    }
}
