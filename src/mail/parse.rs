//! Inbound MIME decoding: sender identity plus attachment extraction.

use bytes::Bytes;
use mail_parser::{MessageParser, MimeHeaders};

use crate::error::ParseError;

/// Fallback content type when an attachment declares none.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// One extracted attachment.
#[derive(Debug, Clone)]
pub struct ExtractedAttachment {
    pub filename: String,
    pub content: Bytes,
    pub content_type: String,
}

/// Decoded inbound email: who sent it and what it carried.
#[derive(Debug, Clone)]
pub struct ParsedEmail {
    pub sender: String,
    pub attachments: Vec<ExtractedAttachment>,
}

/// Decode raw email bytes.
///
/// Zero attachments is fine. A missing sender address is not; the
/// attachment namespace is keyed by it.
pub fn parse_email(raw: &[u8]) -> Result<ParsedEmail, ParseError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or(ParseError::Message { size: raw.len() })?;

    let sender = parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
        .ok_or(ParseError::MissingSender)?;

    let attachments = parsed
        .attachments()
        .enumerate()
        .map(|(i, part)| {
            let filename = MimeHeaders::attachment_name(part)
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("attachment-{}", i + 1));

            let content_type = MimeHeaders::content_type(part)
                .map(content_type_string)
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

            ExtractedAttachment {
                filename,
                content: Bytes::copy_from_slice(part.contents()),
                content_type,
            }
        })
        .collect();

    Ok(ParsedEmail {
        sender,
        attachments,
    })
}

/// Render a parsed content type back to `type/subtype` form.
fn content_type_string(ct: &mail_parser::ContentType) -> String {
    match ct.subtype() {
        Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
        None => ct.ctype().to_string(),
    }
}
