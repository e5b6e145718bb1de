//! Text extraction: layout-aware line detection over HTTP.
//!
//! Images are analyzed by storage reference (bucket + key), never by
//! re-uploaded bytes. Only `LINE` blocks contribute to the result text.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::RecognitionError;

/// Feature requested from the extraction service.
pub const LAYOUT_FEATURE: &str = "LAYOUT";

/// Block type carrying one recognized line of text.
pub const LINE_BLOCK: &str = "LINE";

/// One block of an extraction response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
}

/// Join every `LINE` block, in service order, into one text body.
pub fn line_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .filter(|b| b.kind == LINE_BLOCK)
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Seam ────────────────────────────────────────────────────────────

/// OCR over an object already in storage.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Vec<TextBlock>, RecognitionError>;
}

// ── HTTP client ─────────────────────────────────────────────────────

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    bucket: &'a str,
    key: &'a str,
    #[serde(rename = "featureTypes")]
    feature_types: [&'a str; 1],
}

#[derive(Deserialize)]
struct AnalyzeResponse {
    blocks: Vec<TextBlock>,
}

/// Client for the extraction service's analyze endpoint.
pub struct HttpRecognizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
}

impl HttpRecognizer {
    pub fn new(endpoint: String, api_key: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl TextRecognizer for HttpRecognizer {
    async fn analyze(&self, bucket: &str, key: &str) -> Result<Vec<TextBlock>, RecognitionError> {
        let request = AnalyzeRequest {
            bucket,
            key,
            feature_types: [LAYOUT_FEATURE],
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RecognitionError::Status { status, body });
        }

        let decoded: AnalyzeResponse = response
            .json()
            .await
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

        tracing::debug!(
            bucket = %bucket,
            key = %key,
            blocks = decoded.blocks.len(),
            "Analyze complete"
        );
        Ok(decoded.blocks)
    }
}
