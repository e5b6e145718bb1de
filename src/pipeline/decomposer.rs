//! Email decomposition stage: raw email object in, attachment objects out.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, StorageError};
use crate::event::{self, ObjectRef};
use crate::keys;
use crate::mail::parse::parse_email;
use crate::storage::ObjectStorage;

/// Outcome summary of one decomposed raw email.
#[derive(Debug, Clone)]
pub struct DecomposeOutcome {
    pub sender: String,
    /// Keys written, in attachment order.
    pub written: Vec<String>,
}

/// First pipeline stage: unwraps raw emails into per-attachment image
/// objects namespaced by sender address.
pub struct EmailDecomposer {
    storage: Arc<dyn ObjectStorage>,
}

impl EmailDecomposer {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Entry point for one trigger payload, direct or redriven.
    pub async fn handle(&self, payload: serde_json::Value) -> Result<Vec<DecomposeOutcome>, Error> {
        debug!(payload = %payload, "Raw-email trigger received");

        let mut outcomes = Vec::new();
        for object in event::normalize(payload)? {
            outcomes.push(self.process(&object).await?);
        }
        Ok(outcomes)
    }

    /// Decompose a single raw email object.
    ///
    /// Every attachment write is attempted even if an earlier one fails;
    /// any failure then surfaces as one aggregated error so partial
    /// success is never reported as success.
    pub async fn process(&self, object: &ObjectRef) -> Result<DecomposeOutcome, Error> {
        info!(bucket = %object.bucket, key = %object.key, "Decomposing raw email");

        let raw = self.storage.get(&object.bucket, &object.key).await?;
        let email = parse_email(&raw)?;

        if email.attachments.is_empty() {
            info!(sender = %email.sender, "No attachments to extract");
            return Ok(DecomposeOutcome {
                sender: email.sender,
                written: Vec::new(),
            });
        }

        let total = email.attachments.len();
        let mut written = Vec::with_capacity(total);
        let mut failures: Vec<StorageError> = Vec::new();

        for attachment in &email.attachments {
            let key = keys::image_key(&email.sender, &attachment.filename);
            match self
                .storage
                .put(
                    &object.bucket,
                    &key,
                    attachment.content.clone(),
                    &attachment.content_type,
                )
                .await
            {
                Ok(()) => {
                    info!(key = %key, content_type = %attachment.content_type, "Attachment stored");
                    written.push(key);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "Attachment write failed");
                    failures.push(e);
                }
            }
        }

        if !failures.is_empty() {
            let failed = failures.len();
            let first = failures.remove(0);
            return Err(StorageError::AttachmentWrites {
                failed,
                total,
                first: Box::new(first),
            }
            .into());
        }

        Ok(DecomposeOutcome {
            sender: email.sender,
            written,
        })
    }
}
