//! Core data model types for fetched messages, part trees, and attachments.

pub mod attachment;
pub mod message;
