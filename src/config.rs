//! Environment-driven runtime configuration.

use secrecy::SecretString;

use crate::error::ConfigError;

/// Which object storage backend to build at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// S3-compatible store configured from the environment.
    S3,
    /// In-process store for local runs.
    Memory,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub storage_backend: StorageBackend,
    /// Region override for the S3 backend.
    pub storage_region: Option<String>,
    /// Endpoint override for the S3 backend (MinIO, localstack).
    pub storage_endpoint: Option<String>,
    /// Text recognition service endpoint.
    pub ocr_endpoint: String,
    /// Bearer token for the recognition service, if it requires one.
    pub ocr_api_key: Option<SecretString>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Sender address on result emails.
    pub from_address: String,
    pub listen_addr: String,
}

impl PipelineConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_backend = parse_backend(std::env::var("STORAGE_BACKEND").ok().as_deref())?;
        let smtp_port = parse_port(std::env::var("SMTP_PORT").ok().as_deref())?;

        Ok(Self {
            storage_backend,
            storage_region: std::env::var("STORAGE_REGION").ok(),
            storage_endpoint: std::env::var("STORAGE_ENDPOINT").ok(),
            ocr_endpoint: require("OCR_ENDPOINT")?,
            ocr_api_key: std::env::var("OCR_API_KEY").ok().map(SecretString::from),
            smtp_host: require("SMTP_HOST")?,
            smtp_port,
            smtp_username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default()),
            from_address: require("MAIL_FROM_ADDRESS")?,
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn parse_backend(value: Option<&str>) -> Result<StorageBackend, ConfigError> {
    match value {
        None | Some("s3") => Ok(StorageBackend::S3),
        Some("memory") => Ok(StorageBackend::Memory),
        Some(other) => Err(ConfigError::InvalidValue {
            key: "STORAGE_BACKEND".to_string(),
            message: format!("unknown backend {other:?}"),
        }),
    }
}

fn parse_port(value: Option<&str>) -> Result<u16, ConfigError> {
    match value {
        None => Ok(587),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: "SMTP_PORT".to_string(),
            message: format!("not a port number: {raw:?}"),
        }),
    }
}
