//! Image conversion stage: image object in, OCR-result email out.

use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::{debug, info};

use crate::error::Error;
use crate::event::{self, ObjectRef};
use crate::keys;
use crate::mail::{Mailer, OutboundAttachment, OutboundEmail};
use crate::mail::outbound::BASE64_ENCODING;
use crate::ocr::{self, TextRecognizer};
use crate::storage::ObjectStorage;

/// Outcome summary of one converted image.
#[derive(Debug, Clone)]
pub struct ConvertOutcome {
    pub recipient: String,
    pub filename: String,
    /// Line count of the recovered text.
    pub lines: usize,
}

/// Second pipeline stage: recognizes text in a stored image and mails
/// the result back to the address embedded in the object key.
pub struct ImageConverter {
    storage: Arc<dyn ObjectStorage>,
    recognizer: Arc<dyn TextRecognizer>,
    mailer: Arc<dyn Mailer>,
    from_address: String,
}

impl ImageConverter {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        recognizer: Arc<dyn TextRecognizer>,
        mailer: Arc<dyn Mailer>,
        from_address: String,
    ) -> Self {
        Self {
            storage,
            recognizer,
            mailer,
            from_address,
        }
    }

    /// Entry point for one trigger payload, direct or redriven.
    pub async fn handle(&self, payload: serde_json::Value) -> Result<Vec<ConvertOutcome>, Error> {
        debug!(payload = %payload, "Image trigger received");

        let mut outcomes = Vec::new();
        for object in event::normalize(payload)? {
            outcomes.push(self.process(&object).await?);
        }
        Ok(outcomes)
    }

    /// Convert a single image object.
    ///
    /// Recipient recovery runs first so an unattributable key fails
    /// before any recognition or delivery work happens.
    pub async fn process(&self, object: &ObjectRef) -> Result<ConvertOutcome, Error> {
        let identity = keys::recover_identity(&object.key)?;
        info!(
            bucket = %object.bucket,
            key = %object.key,
            recipient = %identity.address,
            "Converting image"
        );

        let blocks = self.recognizer.analyze(&object.bucket, &object.key).await?;
        let text = ocr::line_text(&blocks);
        let lines = text.lines().count();
        debug!(lines, "Recognized text assembled");

        let image = self.storage.get(&object.bucket, &object.key).await?;
        let content = STANDARD.encode(&image);

        let email = OutboundEmail {
            from: self.from_address.clone(),
            to: identity.address.clone(),
            subject: format!("Results from the image {}", identity.filename),
            text,
            attachments: vec![OutboundAttachment {
                filename: identity.filename.clone(),
                content,
                encoding: BASE64_ENCODING.to_string(),
            }],
        };
        self.mailer.send(&email).await?;

        info!(recipient = %identity.address, filename = %identity.filename, "Result delivered");
        Ok(ConvertOutcome {
            recipient: identity.address,
            filename: identity.filename,
            lines,
        })
    }
}
