//! `mailgrab` downloads the attachments of recent Gmail messages.
//!
//! The library searches a mailbox with a list of fallback queries, keeps the
//! newest matching messages, walks their MIME part trees and writes every
//! attachment into a local directory.

pub mod auth;
pub mod config;
pub mod diagnose;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod search;
pub mod store;
