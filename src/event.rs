//! Trigger notification shapes and normalization.
//!
//! Each stage is invoked with one of two payloads: a direct object-created
//! notification, or a queue envelope of redriven records whose bodies wrap
//! the original notification plus retry metadata. `normalize` flattens
//! either shape into ordered object references so the stages never inspect
//! envelopes themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::NotificationError;

// ── Wire shapes ─────────────────────────────────────────────────────

/// Direct object-created notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectCreated {
    pub detail: Detail,
}

/// Which bucket, which object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detail {
    pub bucket: BucketRef,
    pub object: ObjectInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
}

/// Queue envelope delivered on redrive.
#[derive(Debug, Clone, Deserialize)]
pub struct QueueEnvelope {
    #[serde(rename = "Records")]
    pub records: Vec<QueueRecord>,
}

/// One queued record; the body is a JSON-encoded [`RedriveRecord`].
#[derive(Debug, Clone, Deserialize)]
pub struct QueueRecord {
    pub body: String,
}

/// Failed-invocation record: the original notification plus retry metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RedriveRecord {
    #[serde(rename = "requestPayload")]
    pub request_payload: ObjectCreated,
    #[serde(rename = "requestContext")]
    pub request_context: Option<RequestContext>,
    #[serde(rename = "responsePayload")]
    pub response_payload: Option<ResponsePayload>,
}

/// Why the invocation was redriven.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestContext {
    pub condition: Option<String>,
    #[serde(rename = "approximateInvokeCount")]
    pub approximate_invoke_count: Option<u32>,
}

/// What the failed invocation reported.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponsePayload {
    #[serde(rename = "errorType")]
    pub error_type: Option<String>,
    #[serde(rename = "errorMessage")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub trace: Vec<String>,
}

// ── Normalization ───────────────────────────────────────────────────

/// A storage object to process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl From<ObjectCreated> for ObjectRef {
    fn from(event: ObjectCreated) -> Self {
        Self {
            bucket: event.detail.bucket.name,
            key: event.detail.object.key,
        }
    }
}

/// The two trigger shapes, discriminated once at the entry point.
#[derive(Debug)]
pub enum TriggerEvent {
    Direct(ObjectCreated),
    Redrive(QueueEnvelope),
}

impl TriggerEvent {
    /// Classify a raw payload by the presence of a `Records` collection.
    pub fn from_value(payload: Value) -> Result<Self, NotificationError> {
        if payload.get("Records").is_some() {
            serde_json::from_value(payload)
                .map(TriggerEvent::Redrive)
                .map_err(NotificationError::Payload)
        } else {
            serde_json::from_value(payload)
                .map(TriggerEvent::Direct)
                .map_err(NotificationError::Payload)
        }
    }
}

/// Flatten a trigger payload into ordered object references.
///
/// A redrive batch yields one reference per record, in record order. Any
/// malformed record body fails the whole invocation; the external redrive
/// mechanism owns retry from there.
pub fn normalize(payload: Value) -> Result<Vec<ObjectRef>, NotificationError> {
    match TriggerEvent::from_value(payload)? {
        TriggerEvent::Direct(event) => Ok(vec![event.into()]),
        TriggerEvent::Redrive(envelope) => {
            let mut refs = Vec::with_capacity(envelope.records.len());
            for (index, record) in envelope.records.into_iter().enumerate() {
                let redrive: RedriveRecord = serde_json::from_str(&record.body)
                    .map_err(|source| NotificationError::RecordBody { index, source })?;
                log_retry_metadata(&redrive);
                refs.push(redrive.request_payload.into());
            }
            Ok(refs)
        }
    }
}

/// Surface why this record came back around.
fn log_retry_metadata(record: &RedriveRecord) {
    let key = &record.request_payload.detail.object.key;
    if let Some(ctx) = &record.request_context {
        warn!(
            key = %key,
            condition = ctx.condition.as_deref().unwrap_or("unknown"),
            attempts = ctx.approximate_invoke_count.unwrap_or(0),
            "Processing redriven notification"
        );
    }
    if let Some(resp) = &record.response_payload {
        warn!(
            key = %key,
            error_type = resp.error_type.as_deref().unwrap_or("unknown"),
            error = resp.error_message.as_deref().unwrap_or(""),
            "Previous attempt failed"
        );
    }
}
