// Outgoing email over SMTP. Report delivery and the settings page test
// message both go through the `Mailer` trait.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::MailConfig;
use crate::reports::{self, ReportFormat};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email is not configured (SMTP_USERNAME / SMTP_PASSWORD)")]
    NotConfigured,
    #[error("no recipients")]
    NoRecipients,
    #[error("invalid address '{0}'")]
    Address(String),
    #[error("invalid content type '{0}'")]
    ContentType(String),
    #[error("failed to build message: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone)]
pub struct MailAttachment {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<MailAttachment>,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError>;
}

/// Split a comma-separated recipient list
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn looks_like_email(addr: &str) -> bool {
    match addr.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

pub struct SmtpMailer {
    config: MailConfig,
}

impl SmtpMailer {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn from_config() -> Self {
        Self::new(crate::config::config().mail.clone())
    }

    fn build(&self, email: OutgoingEmail) -> Result<Message, MailError> {
        build_message(&self.config, email)
    }
}

pub(crate) fn build_message(config: &MailConfig, email: OutgoingEmail) -> Result<Message, MailError> {
    if email.to.is_empty() {
        return Err(MailError::NoRecipients);
    }
    let sender: Address = config
        .from_address()
        .parse()
        .map_err(|_| MailError::Address(config.from_address().to_string()))?;
    let from = Mailbox::new(Some(config.sender_name.clone()), sender);

    let mut builder = Message::builder().from(from).subject(email.subject);
    for to in &email.to {
        let mailbox: Mailbox = to.parse().map_err(|_| MailError::Address(to.clone()))?;
        builder = builder.to(mailbox);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(email.html));
    for attachment in email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|_| MailError::ContentType(attachment.content_type.clone()))?;
        body = body.singlepart(Attachment::new(attachment.filename).body(attachment.bytes, content_type));
    }

    Ok(builder.multipart(body)?)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<(), MailError> {
        if !self.config.is_configured() {
            tracing::warn!("Email not configured; skipping send of '{}'", email.subject);
            return Err(MailError::NotConfigured);
        }
        let recipients = email.to.join(", ");
        let message = self.build(email)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ))
            .build();

        transport.send(message).await?;
        tracing::info!("Email sent to {}", recipients);
        Ok(())
    }
}

pub fn report_subject(report_name: &str, at: NaiveDateTime) -> String {
    format!("Scheduled Report: {} - {}", report_name, at.format("%B %d, %Y"))
}

pub fn report_body(report_name: &str, format: ReportFormat, at: NaiveDateTime) -> String {
    format!(
        r#"<html>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
  <div style="max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2 style="color: #2c3e50; border-bottom: 3px solid #3498db; padding-bottom: 10px;">Scheduled Report: {name}</h2>
    <p>Hello,</p>
    <p>Your scheduled report <strong>{name}</strong> has been generated and is attached to this email.</p>
    <div style="background-color: #f8f9fa; border-left: 4px solid #3498db; padding: 15px; margin: 20px 0;">
      <p style="margin: 5px 0;"><strong>Report:</strong> {name}</p>
      <p style="margin: 5px 0;"><strong>Generated:</strong> {generated}</p>
      <p style="margin: 5px 0;"><strong>Format:</strong> {format}</p>
    </div>
    <p>Please find the report attached to this email.</p>
    <hr style="border: none; border-top: 1px solid #ddd; margin: 30px 0;">
    <p style="font-size: 12px; color: #7f8c8d;">This is an automated email from your Fleet Management System.
    To stop receiving these reports, update the notification preferences in the system settings.</p>
  </div>
</body>
</html>"#,
        name = html_escape(report_name),
        generated = at.format("%B %d, %Y at %I:%M %p"),
        format = format.as_str().to_uppercase(),
    )
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

pub fn report_email(
    recipients: Vec<String>,
    report_name: &str,
    format: ReportFormat,
    bytes: Vec<u8>,
    at: NaiveDateTime,
) -> OutgoingEmail {
    OutgoingEmail {
        to: recipients,
        subject: report_subject(report_name, at),
        html: report_body(report_name, format, at),
        attachments: vec![MailAttachment {
            filename: reports::file_name(report_name, format, at),
            content_type: format.mime_type().to_string(),
            bytes,
        }],
    }
}

pub fn test_email(to: &str) -> OutgoingEmail {
    OutgoingEmail {
        to: vec![to.to_string()],
        subject: "Test Email - Fleet Management System".to_string(),
        html: r#"<html>
<body style="font-family: Arial, sans-serif; padding: 20px;">
  <h2 style="color: #2c3e50;">Test Email</h2>
  <p>If you're reading this, your email configuration is working correctly!</p>
  <p style="color: #27ae60;"><strong>Email system is functional</strong></p>
  <hr>
  <p style="font-size: 12px; color: #7f8c8d;">Fleet Management System - Automated Email Service</p>
</body>
</html>"#
            .to_string(),
        attachments: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1).unwrap().and_hms_opt(8, 0, 0).unwrap()
    }

    fn mail_config(username: &str) -> MailConfig {
        MailConfig {
            smtp_server: "smtp.example.com".into(),
            smtp_port: 587,
            smtp_username: username.into(),
            smtp_password: if username.is_empty() { String::new() } else { "secret".into() },
            sender_email: "fleet@example.com".into(),
            sender_name: "Fleet Management System".into(),
        }
    }

    #[test]
    fn recipients_are_trimmed() {
        assert_eq!(
            parse_recipients(" ops@acme.test, ,cfo@acme.test "),
            vec!["ops@acme.test".to_string(), "cfo@acme.test".to_string()]
        );
        assert!(looks_like_email("ops@acme.test"));
        assert!(!looks_like_email("ops@localhost"));
        assert!(!looks_like_email("@acme.test"));
    }

    #[test]
    fn report_email_carries_dated_subject_and_attachment() {
        let email = report_email(vec!["ops@acme.test".into()], "Fleet Fuel", ReportFormat::Pdf, vec![1, 2], at());
        assert_eq!(email.subject, "Scheduled Report: Fleet Fuel - July 01, 2024");
        assert_eq!(email.attachments[0].filename, "Fleet_Fuel_20240701_080000.pdf");
        assert_eq!(email.attachments[0].content_type, "application/pdf");
        assert!(email.html.contains("PDF"));
    }

    #[test]
    fn message_builds_with_attachment() {
        let email = report_email(vec!["ops@acme.test".into()], "Weekly", ReportFormat::Excel, vec![0; 8], at());
        assert!(build_message(&mail_config("user"), email).is_ok());
        assert!(matches!(
            build_message(&mail_config("user"), OutgoingEmail { to: vec![], ..test_email("x@y.z") }),
            Err(MailError::NoRecipients)
        ));
    }

    #[tokio::test]
    async fn unconfigured_mailer_refuses() {
        let mailer = SmtpMailer::new(mail_config(""));
        assert!(matches!(
            mailer.send(test_email("ops@acme.test")).await,
            Err(MailError::NotConfigured)
        ));
    }
}
