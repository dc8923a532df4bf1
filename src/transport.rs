//! Delivery of composed messages over SMTP via lettre.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, Mailboxes, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as _};
use secrecy::{ExposeSecret, SecretString};

use crate::compose::ComposedMessage;
use crate::config::MailConfig;
use crate::error::{ConfigError, Error, TransportError};

/// Delivers a composed message. Failures are returned as-is; callers do
/// not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, message: ComposedMessage) -> Result<(), TransportError>;
}

/// SMTP connection settings.
#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// Implicit TLS when set, STARTTLS otherwise.
    pub ssl: bool,
    pub username: String,
    pub password: SecretString,
}

impl SmtpSettings {
    /// Derive settings from the mail config.
    ///
    /// With `safer` set the stored password is encrypted, so the clear
    /// password must come from `MD_MAILER_PASSWORD`.
    pub fn from_config(config: &MailConfig) -> Result<Self, Error> {
        let host = config
            .smtp_server
            .clone()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "mail.smtp_server".into(),
                hint: "Set the SMTP host to deliver through".into(),
            })?;

        let username = config
            .username
            .clone()
            .or_else(|| config.account.clone())
            .unwrap_or_default();

        let password = if config.safer {
            std::env::var("MD_MAILER_PASSWORD")
                .map(SecretString::from)
                .map_err(|_| {
                    TransportError::Credentials(
                        "mail.safer is set; export MD_MAILER_PASSWORD with the clear password"
                            .into(),
                    )
                })?
        } else {
            config
                .password
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new()))
        };

        Ok(Self {
            host,
            port: config.port(),
            ssl: config.ssl,
            username,
            password,
        })
    }

    fn transport(&self) -> Result<SmtpTransport, TransportError> {
        let builder = if self.ssl {
            SmtpTransport::relay(&self.host)
        } else {
            SmtpTransport::starttls_relay(&self.host)
        }
        .map_err(|e| TransportError::Smtp(format!("SMTP relay error: {e}")))?;

        let creds = Credentials::new(
            self.username.clone(),
            self.password.expose_secret().to_string(),
        );
        Ok(builder.port(self.port).credentials(creds).build())
    }
}

/// SMTP delivery using lettre's blocking transport on the blocking pool.
pub struct SmtpDelivery {
    settings: SmtpSettings,
}

impl SmtpDelivery {
    pub fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Transport for SmtpDelivery {
    async fn deliver(&self, message: ComposedMessage) -> Result<(), TransportError> {
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            let email = build_message(&message)?;
            let transport = settings.transport()?;
            transport
                .send(&email)
                .map_err(|e| TransportError::Smtp(format!("SMTP send failed: {e}")))?;
            tracing::info!(
                host = %settings.host,
                recipients = message.to.len(),
                "Email sent"
            );
            Ok(())
        })
        .await
        .map_err(|e| TransportError::Smtp(format!("Delivery task failed: {e}")))?
    }
}

/// Build the MIME message: a UTF-8 `text/html` part, wrapped with its
/// inline images in `multipart/related` when there are any.
///
/// Attachment files are read here, so a missing image fails delivery.
pub fn build_message(message: &ComposedMessage) -> Result<Message, TransportError> {
    let from = message
        .from
        .parse::<Mailbox>()
        .map_err(|e| TransportError::InvalidAddress {
            field: "from".into(),
            value: message.from.clone(),
            reason: format!("{e}"),
        })?;

    let mut builder = Message::builder().from(from).subject(message.subject.clone());
    for to in &message.to {
        let mailboxes = to.parse::<Mailboxes>().map_err(|e| TransportError::InvalidAddress {
            field: "to".into(),
            value: to.clone(),
            reason: format!("{e}"),
        })?;
        for mailbox in mailboxes {
            builder = builder.to(mailbox);
        }
    }

    let html = SinglePart::html(message.html_body.clone());
    if !message.has_attachments() {
        return builder
            .singlepart(html)
            .map_err(|e| TransportError::Build(e.to_string()));
    }

    let mut related = MultiPart::related().singlepart(html);
    for attachment in &message.attachments {
        let path = &attachment.canonical_path;
        let content = std::fs::read(path).map_err(|e| TransportError::Attachment {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        let content_type = ContentType::parse(mime.essence_str())
            .map_err(|e| TransportError::Build(format!("{e:?}")))?;
        related = related.singlepart(
            Attachment::new_inline(attachment.content_id.clone()).body(content, content_type),
        );
    }

    builder
        .multipart(related)
        .map_err(|e| TransportError::Build(e.to_string()))
}
