//! Two-stage ingestion pipeline.
//!
//! Inbound mail flows through:
//! 1. `EmailDecomposer` — raw email objects become per-attachment
//!    image objects namespaced by sender address
//! 2. `ImageConverter` — image objects become OCR-result emails sent
//!    back to the recovered sender
//!
//! Each stage is triggered independently by object-created events, so
//! a stage can be redriven without replaying the other.

pub mod converter;
pub mod decomposer;

pub use converter::{ConvertOutcome, ImageConverter};
pub use decomposer::{DecomposeOutcome, EmailDecomposer};
