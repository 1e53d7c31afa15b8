//! The four user-triggered flows: refresh, upload, download and delete.
//!
//! Each flow runs to completion on a worker task, reports its stages through
//! a [`Reporter`] and returns a single [`Outcome`]. Nothing here touches the
//! file collection; that belongs to the consumer of the completion queue.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use super::status::Stage;
use super::storage;
use super::{Action, EventKind, Outcome, TaskId, TransferEvent};
use crate::api::{files, ApiClient, DeleteOutcome, FileRecord};
use crate::error::{DroppError, Result};
use crate::session::SessionManager;

const DEFAULT_MIME: &str = "application/octet-stream";

/// A file to upload, already read into memory.
#[derive(Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    /// Build a request, guessing the MIME type from the file name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_raw()
            .unwrap_or(DEFAULT_MIME)
            .to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Read a local file. The upload name is the path's last component.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| DroppError::read_file(path, "path has no file name"))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DroppError::read_file(path, e))?;
        Ok(Self::new(file_name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl fmt::Debug for UploadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadRequest")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// Sends stage transitions for one task onto the completion queue.
#[derive(Clone)]
pub struct Reporter {
    task: TaskId,
    tx: mpsc::UnboundedSender<TransferEvent>,
}

impl Reporter {
    pub fn new(task: TaskId, tx: mpsc::UnboundedSender<TransferEvent>) -> Self {
        Self { task, tx }
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    pub fn stage(&self, stage: Stage) {
        self.send(EventKind::Stage(stage));
    }

    pub fn finish(&self, outcome: Outcome) {
        self.send(EventKind::Finished(outcome));
    }

    fn send(&self, kind: EventKind) {
        // The receiver only disappears when the shell is shutting down.
        if self
            .tx
            .send(TransferEvent {
                task: self.task,
                kind,
            })
            .is_err()
        {
            log::debug!("Completion queue closed, dropping event for {}", self.task);
        }
    }
}

/// Everything a flow needs, cloned into the worker task.
#[derive(Clone)]
pub struct FlowContext {
    pub api: Arc<ApiClient>,
    pub session: SessionManager,
    pub download_dir: PathBuf,
}

/// Run one action to completion.
pub async fn run(ctx: &FlowContext, action: Action, reporter: &Reporter) -> Outcome {
    match action {
        Action::Refresh => Outcome::Refreshed(refresh(ctx, reporter).await),
        Action::Upload(request) => {
            let file_name = request.file_name.clone();
            Outcome::Uploaded {
                file_name,
                result: upload(ctx, request, reporter).await,
            }
        }
        Action::UploadFile(path) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            let result = match UploadRequest::from_path(&path).await {
                Ok(request) => upload(ctx, request, reporter).await,
                Err(e) => Err(e),
            };
            Outcome::Uploaded { file_name, result }
        }
        Action::Download(record) => {
            let file_name = record.name.clone();
            Outcome::Downloaded {
                file_name,
                result: download(ctx, &record, reporter).await,
            }
        }
        Action::Delete(file_id) => {
            let result = delete(ctx, &file_id, reporter).await;
            Outcome::Deleted { file_id, result }
        }
    }
}

/// idle -> fetching -> {populated | failed}
pub async fn refresh(ctx: &FlowContext, reporter: &Reporter) -> Result<Vec<FileRecord>> {
    let token = ctx.session.require_token()?;
    reporter.stage(Stage::Fetching);
    files::list_files(&ctx.api, &token).await
}

/// idle -> checking-quota -> {uploading -> {done | failed} | blocked}
///
/// The quota check is advisory: another device can fill the account between
/// the check and the upload, and the server has the final word.
pub async fn upload(ctx: &FlowContext, request: UploadRequest, reporter: &Reporter) -> Result<()> {
    let token = ctx.session.require_token()?;

    reporter.stage(Stage::CheckingQuota);
    let quota = files::fetch_quota(&ctx.api, &token).await?;
    if let Err(e) = quota.ensure_room_for(request.size()) {
        log::warn!(
            "Upload of {} blocked: {} bytes requested, {} available",
            request.file_name,
            request.size(),
            quota.available()
        );
        return Err(e);
    }

    reporter.stage(Stage::Uploading);
    files::upload_file(
        &ctx.api,
        &token,
        request.bytes,
        &request.file_name,
        &request.mime_type,
    )
    .await
}

/// idle -> downloading -> {saved | failed}
pub async fn download(ctx: &FlowContext, record: &FileRecord, reporter: &Reporter) -> Result<PathBuf> {
    reporter.stage(Stage::Downloading);
    let bytes = files::download_blob(&ctx.api, &record.download_url).await?;
    if bytes.len() as u64 != record.size {
        log::warn!(
            "Downloaded {} bytes for {} but the listing reported {}",
            bytes.len(),
            record.name,
            record.size
        );
    }
    storage::save_download(&ctx.download_dir, &record.name, &bytes).await
}

/// idle -> deleting -> {done | failed}
pub async fn delete(ctx: &FlowContext, file_id: &str, reporter: &Reporter) -> Result<DeleteOutcome> {
    let token = ctx.session.require_token()?;
    reporter.stage(Stage::Deleting);
    files::delete_file(&ctx.api, &token, file_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_request_guesses_mime() {
        assert_eq!(UploadRequest::new("a.png", vec![]).mime_type, "image/png");
        assert_eq!(UploadRequest::new("notes.txt", vec![]).mime_type, "text/plain");
        assert_eq!(
            UploadRequest::new("blob", vec![]).mime_type,
            "application/octet-stream"
        );
        assert_eq!(
            UploadRequest::new("a.png", vec![])
                .with_mime_type("application/x-custom")
                .mime_type,
            "application/x-custom"
        );
    }

    #[tokio::test]
    async fn test_upload_request_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let request = UploadRequest::from_path(&path).await.unwrap();
        assert_eq!(request.file_name, "report.pdf");
        assert_eq!(request.mime_type, "application/pdf");
        assert_eq!(request.size(), 8);
    }

    #[tokio::test]
    async fn test_upload_request_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = UploadRequest::from_path(&dir.path().join("nope.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, DroppError::ReadFile { .. }));
    }

    #[test]
    fn test_upload_request_debug_omits_bytes() {
        let request = UploadRequest::new("a.bin", vec![0xAB; 64]);
        let printed = format!("{:?}", request);
        assert!(printed.contains("size: 64"));
        assert!(!printed.contains("171"));
    }
}
