//! Mailscan — email attachment OCR pipeline.

pub mod config;
pub mod error;
pub mod event;
pub mod keys;
pub mod mail;
pub mod ocr;
pub mod pipeline;
pub mod server;
pub mod storage;
