//! Outbound delivery: result email assembly and SMTP transport.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};

use crate::error::DeliveryError;

/// Transfer encoding accepted for attachment content.
pub const BASE64_ENCODING: &str = "base64";

/// One attachment on an outbound message, content pre-encoded for transport.
#[derive(Debug, Clone)]
pub struct OutboundAttachment {
    pub filename: String,
    /// Encoded file content.
    pub content: String,
    /// Content transfer encoding; only `base64` is supported.
    pub encoding: String,
}

/// A composed result email, ready to hand to a [`Mailer`].
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub attachments: Vec<OutboundAttachment>,
}

// ── Seam ────────────────────────────────────────────────────────────

/// Mail transport used by the converter stage.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}

// ── Message assembly ────────────────────────────────────────────────

/// Assemble a transport-ready message from a composed email.
///
/// Pure; no relay involved, so composition is testable on its own.
pub fn build_message(email: &OutboundEmail) -> Result<Message, DeliveryError> {
    let from: Mailbox = email.from.parse().map_err(|e| DeliveryError::Address {
        kind: "from".into(),
        address: email.from.clone(),
        reason: format!("{e}"),
    })?;
    let to: Mailbox = email.to.parse().map_err(|e| DeliveryError::Address {
        kind: "to".into(),
        address: email.to.clone(),
        reason: format!("{e}"),
    })?;

    let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(email.text.clone()));

    for attachment in &email.attachments {
        if attachment.encoding != BASE64_ENCODING {
            return Err(DeliveryError::Encoding(attachment.encoding.clone()));
        }
        let bytes = STANDARD
            .decode(&attachment.content)
            .map_err(|e| DeliveryError::Decode {
                filename: attachment.filename.clone(),
                reason: e.to_string(),
            })?;

        let content_type = ContentType::parse(&content_type_for(&attachment.filename))
            .map_err(|e| DeliveryError::Compose(e.to_string()))?;

        parts = parts.singlepart(
            Attachment::new(attachment.filename.clone()).body(Body::new(bytes), content_type),
        );
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(email.subject.clone())
        .multipart(parts)
        .map_err(|e| DeliveryError::Compose(e.to_string()))
}

/// Content type for the attachment part, derived from the filename extension.
fn content_type_for(filename: &str) -> String {
    let ext = std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}

// ── SMTP transport ──────────────────────────────────────────────────

/// SMTP relay mailer. The transport is built once at construction and
/// reused; lettre's blocking send runs on the blocking pool.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(
        host: &str,
        port: u16,
        username: String,
        password: &SecretString,
    ) -> Result<Self, DeliveryError> {
        let transport = SmtpTransport::relay(host)
            .map_err(|e| DeliveryError::Transport(format!("SMTP relay error: {e}")))?
            .port(port)
            .credentials(Credentials::new(
                username,
                password.expose_secret().to_string(),
            ))
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let message = build_message(email)?;
        let transport = self.transport.clone();
        let to = email.to.clone();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| DeliveryError::Transport(format!("send task panicked: {e}")))?
            .map_err(|e| DeliveryError::Transport(format!("SMTP send failed: {e}")))?;

        tracing::info!("Result email sent to {to}");
        Ok(())
    }
}
