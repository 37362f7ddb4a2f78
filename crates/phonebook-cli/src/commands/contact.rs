use phonebook_core::models::{Contact, ContactId, DirectoryId};
use phonebook_core::services::DatabaseService;
use phonebook_core::util::normalize_text_option;

use crate::cli::{ContactAddArgs, ContactEditArgs};
use crate::commands::common::{format_contact_lines, require_contact, require_directory};
use crate::error::CliError;

impl ContactAddArgs {
    /// Manual contact without a directory GUID
    pub fn into_contact(self) -> Result<Contact, CliError> {
        let name = normalize_text_option(Some(self.name)).ok_or(CliError::EmptyContactName)?;
        let mut contact = Contact::manual(self.directory_id, name);
        contact.mail = normalize_text_option(self.mail);
        contact.telephone = normalize_text_option(self.telephone);
        contact.mobile = normalize_text_option(self.mobile);
        contact.title = normalize_text_option(self.title);
        contact.department = normalize_text_option(self.department);
        Ok(contact)
    }
}

impl ContactEditArgs {
    /// Apply the given flags; a blank optional field clears it
    pub fn apply(self, contact: &mut Contact) -> Result<(), CliError> {
        if let Some(name) = self.name {
            contact.display_name =
                normalize_text_option(Some(name)).ok_or(CliError::EmptyContactName)?;
        }
        for (value, slot) in [
            (self.mail, &mut contact.mail),
            (self.telephone, &mut contact.telephone),
            (self.mobile, &mut contact.mobile),
            (self.title, &mut contact.title),
            (self.department, &mut contact.department),
        ] {
            if value.is_some() {
                *slot = normalize_text_option(value);
            }
        }
        if self.clear_photo {
            contact.photo = None;
        }
        Ok(())
    }
}

pub async fn run_contact_add(
    args: ContactAddArgs,
    db: &DatabaseService,
) -> Result<Contact, CliError> {
    require_directory(db, args.directory_id).await?;
    let contact = db.create_contact(&args.into_contact()?).await?;
    println!("{}", contact.id);
    Ok(contact)
}

pub async fn run_contact_list(
    directory_id: DirectoryId,
    as_json: bool,
    db: &DatabaseService,
) -> Result<(), CliError> {
    require_directory(db, directory_id).await?;
    let contacts = db.list_contacts(directory_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&contacts)?);
    } else {
        for line in format_contact_lines(&contacts) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_contact_edit(
    args: ContactEditArgs,
    db: &DatabaseService,
) -> Result<Contact, CliError> {
    let mut contact = require_contact(db, args.id).await?;
    args.apply(&mut contact)?;
    db.update_contact(&contact).await?;
    if contact.is_reconcilable() {
        tracing::warn!(
            contact_id = contact.id,
            "Contact is mirrored from a directory; the next sync may overwrite these edits"
        );
    }
    println!("Updated contact {}", contact.id);
    Ok(contact)
}

pub async fn run_contact_delete(id: ContactId, db: &DatabaseService) -> Result<(), CliError> {
    let contact = require_contact(db, id).await?;
    db.delete_contact(id).await?;
    println!("Deleted contact {} ({})", contact.id, contact.display_name);
    Ok(())
}
