//! Error types for the attachment OCR pipeline.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Mail parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Recognition error: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Trigger payload errors: the notification could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Unrecognized trigger payload: {0}")]
    Payload(#[source] serde_json::Error),

    #[error("Record {index} body is not a valid redrive envelope: {source}")]
    RecordBody {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Object storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Read failed for {bucket}/{key}: {source}")]
    Read {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Write failed for {bucket}/{key}: {source}")]
    Write {
        bucket: String,
        key: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Backend init failed for bucket {bucket}: {source}")]
    Backend {
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    #[error("{failed} of {total} attachment writes failed; first: {first}")]
    AttachmentWrites {
        failed: usize,
        total: usize,
        #[source]
        first: Box<StorageError>,
    },
}

/// Inbound email parse errors.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Undecodable MIME message ({size} bytes)")]
    Message { size: usize },

    #[error("Message has no sender address")]
    MissingSender,
}

/// Text-extraction service errors.
#[derive(Debug, thiserror::Error)]
pub enum RecognitionError {
    #[error("OCR request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OCR service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid OCR response: {0}")]
    InvalidResponse(String),
}

/// Destination-identity recovery errors.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("No address-like segment in key: {key}")]
    NoAddress { key: String },

    #[error("Multiple address-like segments in key: {key}")]
    Ambiguous { key: String },
}

/// Outbound mail transport errors.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid {kind} address {address}: {reason}")]
    Address {
        kind: String,
        address: String,
        reason: String,
    },

    #[error("Unsupported attachment encoding: {0}")]
    Encoding(String),

    #[error("Attachment {filename} is not valid base64: {reason}")]
    Decode { filename: String, reason: String },

    #[error("Failed to build message: {0}")]
    Compose(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
