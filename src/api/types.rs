//! Request and response types for the dropp backend API.
//!
//! Wire structs mirror the backend's snake_case JSON (`_id`, `download_url`);
//! they are converted into the client-side [`FileRecord`] and [`StorageQuota`].

use serde::{Deserialize, Serialize};

use crate::error::{DroppError, Result};

/// One entry of the `files` array returned by `GET /list`.
#[derive(Debug, Clone, Deserialize)]
pub struct FileEntry {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub size: u64,
    pub download_url: String,
}

/// `storage` object returned by `GET /list`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StorageInfo {
    pub cap: u64,
    pub used: u64,
}

/// Body of `GET /list`.
///
/// Older backends answer with a bare array of entries and no storage block,
/// so both shapes are accepted.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    Listing {
        files: Vec<FileEntry>,
        storage: Option<StorageInfo>,
    },
    Bare(Vec<FileEntry>),
}

impl ListResponse {
    pub fn into_parts(self) -> (Vec<FileRecord>, Option<StorageQuota>) {
        match self {
            ListResponse::Listing { files, storage } => (
                files.into_iter().map(FileRecord::from).collect(),
                storage.map(StorageQuota::from),
            ),
            ListResponse::Bare(files) => (files.into_iter().map(FileRecord::from).collect(), None),
        }
    }
}

/// Metadata for one stored file. Immutable; a refresh replaces the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub download_url: String,
}

impl From<FileEntry> for FileRecord {
    fn from(entry: FileEntry) -> Self {
        Self {
            id: entry.id,
            name: entry.name,
            size: entry.size,
            download_url: entry.download_url,
        }
    }
}

/// Account storage usage, fetched fresh before every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageQuota {
    pub capacity_bytes: u64,
    pub used_bytes: u64,
}

impl From<StorageInfo> for StorageQuota {
    fn from(info: StorageInfo) -> Self {
        Self {
            capacity_bytes: info.cap,
            used_bytes: info.used,
        }
    }
}

impl StorageQuota {
    /// Free bytes, zero if the account is already over its cap.
    pub fn available(&self) -> u64 {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }

    /// Reject an upload of `size` bytes that would push usage past capacity.
    ///
    /// Filling the quota exactly is allowed.
    pub fn ensure_room_for(&self, size: u64) -> Result<()> {
        let fits = self
            .used_bytes
            .checked_add(size)
            .is_some_and(|total| total <= self.capacity_bytes);
        if fits {
            Ok(())
        } else {
            Err(DroppError::CapacityExceeded {
                available: self.available(),
                required: size,
            })
        }
    }
}

/// Result of `DELETE /files/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// The server reported 404: the file was already gone.
    AlreadyAbsent,
}
