//! Stages a transfer task moves through while it is in flight.
//!
//! A task ends in exactly one [`super::Outcome`]; these are the intermediate
//! states reported before that.

/// All in-flight states of a dispatched action.
///
/// [`super::FileBrowser`] logs each transition using `Stage::label()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Refresh: waiting for `GET /list`.
    Fetching,
    /// Upload: reading current storage usage before sending anything.
    CheckingQuota,
    /// Upload: quota allows it, the multipart request is in flight.
    Uploading,
    /// Download: fetching the signed blob and writing it to disk.
    Downloading,
    /// Delete: waiting for `DELETE /files/{id}`.
    Deleting,
}

impl Stage {
    /// Human-readable status text.
    pub fn label(&self) -> &str {
        match self {
            Stage::Fetching => "Refreshing...",
            Stage::CheckingQuota => "Checking storage...",
            Stage::Uploading => "Uploading...",
            Stage::Downloading => "Downloading...",
            Stage::Deleting => "Deleting...",
        }
    }

    /// Returns `true` for the stage that drives the list's busy indicator.
    pub fn is_refresh(&self) -> bool {
        matches!(self, Stage::Fetching)
    }
}
