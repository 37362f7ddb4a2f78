use phonebook_core::directory::{test_connection, DirectoryConnector};
use phonebook_core::models::{DirectoryConfig, DirectoryId, MailSettings, DEFAULT_SEARCH_FILTER};
use phonebook_core::notify::{send_test_message, MailMessage, Mailer};
use phonebook_core::services::DatabaseService;
use phonebook_core::util::normalize_text_option;

use crate::cli::{DirectoryAddArgs, DirectoryEditArgs, SmtpArgs, SmtpEditArgs};
use crate::commands::common::{
    directory_to_item, format_directory_lines, require_directory, require_text,
    DirectoryListItem,
};
use crate::error::CliError;

impl DirectoryAddArgs {
    pub fn into_config(self) -> Result<DirectoryConfig, CliError> {
        let mut config = DirectoryConfig::new(
            require_text(self.name, "Directory name")?,
            require_text(self.host, "Directory host")?,
            require_text(self.base_dn, "Base DN")?,
            require_text(self.bind_login, "Bind login")?,
            self.bind_password,
        );
        config.port = self.port;
        config.use_ssl = self.ssl;
        if let Some(filter) = normalize_text_option(self.filter) {
            config.search_filter = filter;
        }
        config.description = normalize_text_option(self.description);
        config.is_active = self.active;
        config.notify_on_add = self.notify_on_add;
        config.notify_on_update = self.notify_on_update;
        config.mail = self.smtp.into_settings();
        Ok(config)
    }
}

impl SmtpArgs {
    fn into_settings(self) -> Option<MailSettings> {
        let host = normalize_text_option(self.smtp_host)?;
        let to = normalize_text_option(self.smtp_to)?;
        let mut settings = MailSettings::new(host, to);
        settings.port = self.smtp_port;
        settings.username = normalize_text_option(self.smtp_username);
        settings.password = self.smtp_password.filter(|password| !password.is_empty());
        settings.use_ssl = self.smtp_ssl;
        settings.use_tls = !self.smtp_ssl && !self.smtp_no_tls;
        settings.from = normalize_text_option(self.smtp_from);
        Some(settings)
    }
}

impl DirectoryEditArgs {
    /// Apply the given flags to a stored directory
    pub fn apply(self, directory: &mut DirectoryConfig) -> Result<(), CliError> {
        if let Some(name) = self.name {
            directory.name = require_text(name, "Directory name")?;
        }
        if let Some(host) = self.host {
            directory.host = require_text(host, "Directory host")?;
        }
        if let Some(base_dn) = self.base_dn {
            directory.base_dn = require_text(base_dn, "Base DN")?;
        }
        if let Some(bind_login) = self.bind_login {
            directory.bind_login = require_text(bind_login, "Bind login")?;
        }
        if let Some(password) = self.bind_password.filter(|password| !password.is_empty()) {
            directory.bind_password = password;
        }
        if let Some(port) = self.port {
            directory.port = port;
        }
        if let Some(ssl) = self.ssl {
            directory.use_ssl = ssl;
        }
        if let Some(filter) = self.filter {
            directory.search_filter = normalize_text_option(Some(filter))
                .unwrap_or_else(|| DEFAULT_SEARCH_FILTER.to_string());
        }
        if self.description.is_some() {
            directory.description = normalize_text_option(self.description);
        }
        if let Some(active) = self.active {
            directory.is_active = active;
        }
        if let Some(notify) = self.notify_on_add {
            directory.notify_on_add = notify;
        }
        if let Some(notify) = self.notify_on_update {
            directory.notify_on_update = notify;
        }
        if self.reset_watermark {
            directory.last_sync = None;
        }
        directory.mail = self.smtp.apply(directory.mail.take())?;
        Ok(())
    }
}

impl SmtpEditArgs {
    fn is_empty(&self) -> bool {
        self.smtp_host.is_none()
            && self.smtp_port.is_none()
            && self.smtp_username.is_none()
            && self.smtp_password.is_none()
            && self.smtp_ssl.is_none()
            && self.smtp_tls.is_none()
            && self.smtp_from.is_none()
            && self.smtp_to.is_none()
            && self.smtp_active.is_none()
    }

    /// New mail settings; a channel can only be created by naming its host
    fn apply(self, current: Option<MailSettings>) -> Result<Option<MailSettings>, CliError> {
        if self.clear_smtp {
            return Ok(None);
        }
        if self.is_empty() {
            return Ok(current);
        }

        let mut settings = match current {
            Some(settings) => settings,
            None => {
                let host = self.smtp_host.clone().ok_or(CliError::EmptyField("SMTP host"))?;
                MailSettings {
                    to: None,
                    ..MailSettings::new(host, String::new())
                }
            }
        };
        if let Some(host) = self.smtp_host {
            settings.host = require_text(host, "SMTP host")?;
        }
        if let Some(port) = self.smtp_port {
            settings.port = port;
        }
        if self.smtp_username.is_some() {
            settings.username = normalize_text_option(self.smtp_username);
        }
        if let Some(password) = self.smtp_password.filter(|password| !password.is_empty()) {
            settings.password = Some(password);
        }
        if let Some(tls) = self.smtp_tls {
            settings.use_tls = tls;
        }
        if let Some(ssl) = self.smtp_ssl {
            settings.use_ssl = ssl;
            if ssl {
                settings.use_tls = false;
            }
        }
        if self.smtp_from.is_some() {
            settings.from = normalize_text_option(self.smtp_from);
        }
        if self.smtp_to.is_some() {
            settings.to = normalize_text_option(self.smtp_to);
        }
        if let Some(active) = self.smtp_active {
            settings.is_active = active;
        }
        Ok(Some(settings))
    }
}

pub async fn run_directory_add(
    args: DirectoryAddArgs,
    db: &DatabaseService,
) -> Result<DirectoryConfig, CliError> {
    let directory = db.create_directory(&args.into_config()?).await?;
    println!("{}", directory.id);
    Ok(directory)
}

pub async fn run_directory_list(as_json: bool, db: &DatabaseService) -> Result<(), CliError> {
    let directories = db.list_directories().await?;

    if as_json {
        let json_items = directories
            .iter()
            .map(directory_to_item)
            .collect::<Vec<DirectoryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if directories.is_empty() {
        println!("No directories configured.");
        return Ok(());
    }

    for line in format_directory_lines(&directories) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_directory_test(
    id: DirectoryId,
    db: &DatabaseService,
    connector: &dyn DirectoryConnector,
) -> Result<(), CliError> {
    let directory = require_directory(db, id).await?;
    test_connection(connector, &directory).await?;
    println!("Connected to {} ({})", directory.name, directory.url());
    Ok(())
}

pub async fn run_directory_edit(
    args: DirectoryEditArgs,
    db: &DatabaseService,
) -> Result<DirectoryConfig, CliError> {
    let mut directory = require_directory(db, args.id).await?;
    args.apply(&mut directory)?;
    db.update_directory(&directory).await?;
    println!("Updated directory {} ({})", directory.id, directory.name);
    Ok(directory)
}

pub async fn run_directory_delete(id: DirectoryId, db: &DatabaseService) -> Result<(), CliError> {
    let directory = require_directory(db, id).await?;
    let contacts = db.list_contacts(id).await?.len();
    db.delete_directory(id).await?;
    tracing::info!(directory_id = id, contacts, "Directory deleted");
    println!("Deleted directory {} and {contacts} contact(s)", directory.name);
    Ok(())
}

pub async fn run_directory_test_mail(
    id: DirectoryId,
    db: &DatabaseService,
    mailer: &dyn Mailer,
) -> Result<MailMessage, CliError> {
    let directory = require_directory(db, id).await?;
    let message = send_test_message(mailer, &directory).await?;
    println!("Test message sent to {}", message.to);
    Ok(message)
}
