//! Storage key conventions: image-key construction and identity recovery.
//!
//! Image keys follow `images/<sender-address>/<filename>`. The address
//! segment is the only one allowed to contain whitespace or `@`, which is
//! the property `recover_identity` keys on.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::IdentityError;

/// Prefix for extracted attachment objects.
pub const IMAGE_PREFIX: &str = "images";

/// Matches segments that can only be an email address under the key
/// convention: anything containing whitespace or an at-sign.
fn address_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[\s@]").unwrap())
}

/// Destination identity recovered from an image key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredIdentity {
    /// Email address to deliver the OCR result to.
    pub address: String,
    /// Attachment filename (final key segment).
    pub filename: String,
}

/// Build the storage key for an extracted attachment.
pub fn image_key(sender: &str, filename: &str) -> String {
    format!("{IMAGE_PREFIX}/{sender}/{}", sanitize_filename(filename))
}

/// Replace characters that would break the key convention.
///
/// Path separators would add segments; whitespace or `@` in a filename
/// would collide with the address-segment pattern.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '@' || c.is_whitespace() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Recover the destination address and filename from an image key.
///
/// The address is the unique segment containing whitespace or `@`. Zero or
/// multiple matching segments means the key does not follow the convention
/// and there is no safe destination to deliver to.
pub fn recover_identity(key: &str) -> Result<RecoveredIdentity, IdentityError> {
    let segments: Vec<&str> = key.split('/').collect();

    let mut matching = segments.iter().filter(|s| address_pattern().is_match(s));
    let address = match (matching.next(), matching.next()) {
        (Some(addr), None) => (*addr).to_string(),
        (None, _) => {
            return Err(IdentityError::NoAddress {
                key: key.to_string(),
            });
        }
        (Some(_), Some(_)) => {
            return Err(IdentityError::Ambiguous {
                key: key.to_string(),
            });
        }
    };

    let filename = segments.last().copied().unwrap_or_default().to_string();

    Ok(RecoveredIdentity { address, filename })
}
