//! Mail boundary: inbound MIME decoding and outbound SMTP delivery.

pub mod outbound;
pub mod parse;

pub use outbound::{Mailer, OutboundAttachment, OutboundEmail, SmtpMailer};
pub use parse::{ExtractedAttachment, ParsedEmail, parse_email};
