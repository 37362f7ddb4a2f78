//! Batched notifications for changes deferred to manual confirmation.
//!
//! Formatting is pure: [`creation_message`] and [`update_message`] turn a
//! batch into one [`MailMessage`]. [`NotificationGate`] decides whether a
//! batch is sent and hands it to a [`Mailer`]; failures are logged only.

mod mailer;

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use mailer::{MailError, Mailer, SmtpMailer};

use crate::models::{DirectoryConfig, DirectoryId, MailSettings, RemoteRecord};
use crate::reconcile::{PendingUpdate, ReconcileReport};
use crate::util::escape_html;

/// Placeholder for missing values in notification bodies
const NONE: &str = "none";

/// A composed notification ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
}

/// Quick-action link kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickLink {
    Add,
    Update,
}

impl QuickLink {
    const fn segment(self) -> &'static str {
        match self {
            Self::Add => "quick-add",
            Self::Update => "quick-update",
        }
    }

    /// Absolute link applying one deferred change
    pub fn url(self, base_url: &str, directory_id: DirectoryId, guid: &str) -> String {
        format!(
            "{}/directories/{directory_id}/{}/{}",
            base_url.trim_end_matches('/'),
            self.segment(),
            urlencoding::encode(guid)
        )
    }
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}

fn display_name(name: &str) -> &str {
    if name.trim().is_empty() {
        "(no name)"
    } else {
        name
    }
}

fn html_document(title: &str, items: &str, total: &str, footer: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n\
         <h2>{title}</h2>\n<ul style=\"list-style: none; padding: 0;\">\n{items}</ul>\n\
         <p><strong>{total}</strong></p>\n\
         <p style=\"font-size: 12px; color: #666;\"><em>{footer}</em></p>\n</body>\n</html>\n"
    )
}

fn footer(detected_at: DateTime<Utc>) -> String {
    format!(
        "Automatic notification from Phonebook. Detected at {} UTC.",
        detected_at.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Compose the batched notification for deferred creates.
pub fn creation_message(
    directory: &DirectoryConfig,
    records: &[RemoteRecord],
    base_url: &str,
    detected_at: DateTime<Utc>,
) -> MailMessage {
    let mut text = format!("New contacts found in directory \"{}\":\n\n", directory.name);
    let mut items = String::new();

    for record in records {
        let link = QuickLink::Add.url(base_url, directory.id, &record.guid);
        let name = display_name(record.name());
        let _ = writeln!(
            text,
            "- {name} (mail: {}, telephone: {})\n  Add: {link}",
            or_none(record.mail.as_deref()),
            or_none(record.telephone.as_deref()),
        );
        let _ = writeln!(
            items,
            "<li>{} (mail: {}, telephone: {}) <a href=\"{}\">Add</a></li>",
            escape_html(name),
            escape_html(or_none(record.mail.as_deref())),
            escape_html(or_none(record.telephone.as_deref())),
            escape_html(&link),
        );
    }

    let footer = footer(detected_at);
    let total = format!("Total new contacts: {}", records.len());
    let _ = write!(text, "\n{total}\n\n---\n{footer}\n");
    let title = format!("New contacts in directory \"{}\"", escape_html(&directory.name));

    MailMessage {
        to: String::new(),
        from: String::new(),
        subject: format!("New contacts in directory: {}", directory.name),
        text_body: text,
        html_body: Some(html_document(&title, &items, &total, &footer)),
    }
}

/// Compose the batched notification for deferred updates.
pub fn update_message(
    directory: &DirectoryConfig,
    updates: &[PendingUpdate],
    base_url: &str,
    detected_at: DateTime<Utc>,
) -> MailMessage {
    let mut text = format!("Contacts changed in directory \"{}\":\n\n", directory.name);
    let mut items = String::new();

    for update in updates {
        let link = QuickLink::Update.url(base_url, directory.id, &update.guid);
        let name = display_name(&update.display_name);
        let _ = writeln!(text, "- {name} (GUID: {})", update.guid);
        let _ = writeln!(
            items,
            "<li style=\"margin-bottom: 15px;\"><strong>{}</strong> <small>(GUID: {})</small>\n<table>",
            escape_html(name),
            escape_html(&update.guid),
        );
        for change in &update.changes {
            let old = or_none(change.old.as_deref());
            let new = or_none(change.new.as_deref());
            let _ = writeln!(text, "  {}: {old} \u{2192} {new}", change.field);
            let _ = writeln!(
                items,
                "<tr><td><strong>{}:</strong></td><td>{}</td><td>\u{2192}</td><td>{}</td></tr>",
                change.field,
                escape_html(old),
                escape_html(new),
            );
        }
        let _ = writeln!(text, "  Update: {link}");
        let _ = writeln!(
            items,
            "</table>\n<a href=\"{}\">Update</a></li>",
            escape_html(&link)
        );
    }

    let footer = footer(detected_at);
    let total = format!("Total changed contacts: {}", updates.len());
    let _ = write!(text, "\n{total}\n\n---\n{footer}\n");
    let title = format!("Contacts changed in directory \"{}\"", escape_html(&directory.name));

    MailMessage {
        to: String::new(),
        from: String::new(),
        subject: format!("Contact changes in directory: {}", directory.name),
        text_body: text,
        html_body: Some(html_document(&title, &items, &total, &footer)),
    }
}

/// Compose the message confirming a directory's mail channel delivers.
pub fn test_message(
    directory: &DirectoryConfig,
    settings: &MailSettings,
    sent_at: DateTime<Utc>,
) -> MailMessage {
    let text = format!(
        "Test message from Phonebook for directory \"{}\".\n\n\
         SMTP server: {}\n\
         Port: {}\n\
         Username: {}\n\
         STARTTLS: {}\n\
         SSL: {}\n\n\
         Sent at {} UTC.\n",
        directory.name,
        settings.host,
        settings.port,
        or_none(settings.username.as_deref()),
        if settings.use_tls { "yes" } else { "no" },
        if settings.use_ssl { "yes" } else { "no" },
        sent_at.format("%Y-%m-%d %H:%M:%S"),
    );

    MailMessage {
        to: String::new(),
        from: String::new(),
        subject: format!("Phonebook test message: {}", directory.name),
        text_body: text,
        html_body: None,
    }
}

/// Send [`test_message`] through the directory's mail channel.
///
/// Unlike batch dispatch, errors are returned so the operator sees them.
pub async fn send_test_message(
    mailer: &dyn Mailer,
    directory: &DirectoryConfig,
) -> Result<MailMessage, MailError> {
    let settings = directory.active_mail().ok_or_else(|| {
        MailError::NotConfigured(format!(
            "directory {} has no active mail channel with a recipient",
            directory.name
        ))
    })?;
    let (Some(to), Some(from)) = (settings.recipient(), settings.sender()) else {
        return Err(MailError::NotConfigured(
            "no sender address: set a from address or SMTP username".to_string(),
        ));
    };

    let mut message = test_message(directory, settings, Utc::now());
    message.to = to;
    message.from = from;
    mailer.send(settings, &message).await?;
    tracing::info!(directory_id = directory.id, to = %message.to, "Test message sent");
    Ok(message)
}

/// Sends deferred-change batches for one directory pass
#[derive(Clone)]
pub struct NotificationGate {
    mailer: Arc<dyn Mailer>,
    base_url: String,
}

impl NotificationGate {
    pub fn new(mailer: Arc<dyn Mailer>, base_url: impl Into<String>) -> Self {
        Self {
            mailer,
            base_url: base_url.into(),
        }
    }

    /// Send the creation and update batches a pass produced.
    ///
    /// Returns how many messages were delivered. Failures never propagate.
    pub async fn dispatch(&self, directory: &DirectoryConfig, report: &ReconcileReport) -> usize {
        let mut messages = Vec::new();
        let now = Utc::now();
        if directory.notify_on_add && !report.pending_creates.is_empty() {
            messages.push(creation_message(directory, &report.pending_creates, &self.base_url, now));
        }
        if directory.notify_on_update && !report.pending_updates.is_empty() {
            messages.push(update_message(directory, &report.pending_updates, &self.base_url, now));
        }
        if messages.is_empty() {
            return 0;
        }

        let Some(settings) = directory.active_mail() else {
            tracing::warn!(
                directory_id = directory.id,
                batches = messages.len(),
                "Mail channel inactive; deferred changes not announced"
            );
            return 0;
        };
        let (Some(to), Some(from)) = (settings.recipient(), settings.sender()) else {
            tracing::warn!(directory_id = directory.id, "Mail channel has no sender address");
            return 0;
        };

        let mut sent = 0;
        for mut message in messages {
            message.to.clone_from(&to);
            message.from.clone_from(&from);
            match self.mailer.send(settings, &message).await {
                Ok(()) => sent += 1,
                Err(error) => tracing::error!(
                    directory_id = directory.id,
                    subject = %message.subject,
                    error = %error,
                    "Failed to send notification"
                ),
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{ContactField, FieldChange, MailSettings};
    use crate::testing::RecordingMailer;

    const BASE: &str = "https://phonebook.corp/";

    fn directory() -> DirectoryConfig {
        let mut directory = DirectoryConfig::new("R&D <lab>", "dc1", "dc=corp", "svc", "pw");
        directory.id = 7;
        directory.notify_on_add = true;
        directory.notify_on_update = true;
        let mut mail = MailSettings::new("smtp.corp", "ops@corp.local");
        mail.from = Some("phonebook@corp.local".to_string());
        directory.mail = Some(mail);
        directory
    }

    fn detected_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 20, 8, 30, 0).unwrap()
    }

    fn pending_update() -> PendingUpdate {
        PendingUpdate {
            guid: "{a}".to_string(),
            display_name: "Ada".to_string(),
            changes: vec![FieldChange {
                field: ContactField::Mail,
                old: None,
                new: Some("ada@new".to_string()),
            }],
        }
    }

    #[test]
    fn links_encode_guid() {
        assert_eq!(
            QuickLink::Add.url(BASE, 7, "{a b}"),
            "https://phonebook.corp/directories/7/quick-add/%7Ba%20b%7D"
        );
        assert_eq!(
            QuickLink::Update.url("http://localhost:5050", 1, "x"),
            "http://localhost:5050/directories/1/quick-update/x"
        );
    }

    #[test]
    fn creation_message_lists_every_record_with_link() {
        let records = vec![
            RemoteRecord {
                display_name: Some("Cleo".to_string()),
                mail: Some("cleo@corp".to_string()),
                ..RemoteRecord::new("{c}")
            },
            RemoteRecord::new("{e}"),
        ];
        let message = creation_message(&directory(), &records, BASE, detected_at());

        assert_eq!(message.subject, "New contacts in directory: R&D <lab>");
        assert!(message.text_body.contains("- Cleo (mail: cleo@corp, telephone: none)"));
        assert!(message.text_body.contains("- (no name) (mail: none, telephone: none)"));
        assert!(message.text_body.contains("/directories/7/quick-add/%7Bc%7D"));
        assert!(message.text_body.contains("Total new contacts: 2"));

        let html = message.html_body.unwrap();
        assert!(html.contains("R&amp;D &lt;lab&gt;"));
        assert!(!html.contains("R&D <lab>"));
        assert!(html.contains("/directories/7/quick-add/%7Be%7D"));
    }

    #[test]
    fn update_message_shows_old_and_new_values() {
        let message = update_message(&directory(), &[pending_update()], BASE, detected_at());

        assert!(message.text_body.contains("- Ada (GUID: {a})"));
        assert!(message.text_body.contains("  mail: none \u{2192} ada@new"));
        assert!(message.text_body.contains("/directories/7/quick-update/%7Ba%7D"));
        assert!(message.text_body.contains("2024-06-20 08:30:00"));
        assert!(message.html_body.unwrap().contains("<td>ada@new</td>"));
    }

    #[test]
    fn html_escapes_directory_values() {
        let mut update = pending_update();
        update.display_name = "<script>".to_string();
        let message = update_message(&directory(), &[update], BASE, detected_at());
        let html = message.html_body.unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn dispatch_sends_one_batch_per_kind() {
        let mailer = RecordingMailer::new();
        let gate = NotificationGate::new(Arc::new(mailer.clone()), BASE);
        let report = ReconcileReport {
            pending_creates: vec![RemoteRecord::new("{c}"), RemoteRecord::new("{e}")],
            pending_updates: vec![pending_update()],
            ..ReconcileReport::default()
        };

        let sent = gate.dispatch(&directory(), &report).await;

        assert_eq!(sent, 2);
        let messages = mailer.sent();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].to, "ops@corp.local");
        assert_eq!(messages[0].from, "phonebook@corp.local");
        assert!(messages[0].subject.starts_with("New contacts"));
        assert!(messages[1].subject.starts_with("Contact changes"));
    }

    #[tokio::test]
    async fn dispatch_skips_inactive_channel() {
        let mailer = RecordingMailer::new();
        let gate = NotificationGate::new(Arc::new(mailer.clone()), BASE);
        let mut directory = directory();
        if let Some(mail) = directory.mail.as_mut() {
            mail.is_active = false;
        }
        let report = ReconcileReport {
            pending_creates: vec![RemoteRecord::new("{c}")],
            ..ReconcileReport::default()
        };

        assert_eq!(gate.dispatch(&directory, &report).await, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_is_swallowed() {
        let mailer = RecordingMailer::new();
        mailer.fail_sends();
        let gate = NotificationGate::new(Arc::new(mailer.clone()), BASE);
        let report = ReconcileReport {
            pending_updates: vec![pending_update()],
            ..ReconcileReport::default()
        };

        assert_eq!(gate.dispatch(&directory(), &report).await, 0);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[test]
    fn test_message_lists_smtp_settings() {
        let mut directory = directory();
        if let Some(mail) = directory.mail.as_mut() {
            mail.port = 587;
            mail.username = Some("robot".to_string());
        }
        let settings = directory.mail.clone().unwrap();

        let message = test_message(&directory, &settings, detected_at());

        assert_eq!(message.subject, "Phonebook test message: R&D <lab>");
        assert!(message.text_body.contains("SMTP server: smtp.corp\n"));
        assert!(message.text_body.contains("Port: 587\n"));
        assert!(message.text_body.contains("Username: robot\n"));
        assert!(message.text_body.contains("STARTTLS: yes\nSSL: no\n"));
        assert!(message.text_body.contains("Sent at 2024-06-20 08:30:00 UTC."));
        assert!(message.html_body.is_none());
    }

    #[tokio::test]
    async fn send_test_message_fills_addresses() {
        let mailer = RecordingMailer::new();

        let message = send_test_message(&mailer, &directory()).await.unwrap();

        assert_eq!(message.to, "ops@corp.local");
        assert_eq!(message.from, "phonebook@corp.local");
        assert_eq!(mailer.sent(), vec![message]);
    }

    #[tokio::test]
    async fn send_test_message_requires_active_channel() {
        let mailer = RecordingMailer::new();
        let mut directory = directory();
        directory.mail = None;

        let result = send_test_message(&mailer, &directory).await;

        assert!(matches!(result, Err(MailError::NotConfigured(_))));
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn send_test_message_reports_transport_failure() {
        let mailer = RecordingMailer::new();
        mailer.fail_sends();

        let result = send_test_message(&mailer, &directory()).await;

        assert!(matches!(result, Err(MailError::Transport(_))));
    }
}
