//! API client module for the dropp backend.
//!
//! Provides the HTTP client with bearer auth injection, the file operations
//! (list, quota, upload, delete, download) and the wire types they decode.

pub mod client;
pub mod files;
pub mod types;

pub use client::{ApiClient, DEFAULT_BASE_URL};
pub use types::{DeleteOutcome, FileRecord, StorageQuota};
