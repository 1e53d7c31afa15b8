//! Transfer workflow: list refresh, quota-checked upload, download to disk
//! and delete.
//!
//! Actions are dispatched onto the tokio worker pool and run to completion;
//! there is no cancellation once a task is issued. Every stage change and the
//! final outcome are pushed onto one unbounded completion queue, which a
//! single consumer (normally a [`FileBrowser`]) drains on its own task. Only
//! that consumer mutates the file collection.
//!
//! Overlapping requests are allowed. Completions are applied in arrival
//! order, so a slow earlier refresh can overwrite a newer one.

pub mod browser;
pub mod flows;
pub mod status;
pub mod storage;

pub use browser::{FileBrowser, Notification, NotificationLevel};
pub use flows::UploadRequest;
pub use status::Stage;

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::api::{ApiClient, DeleteOutcome, FileRecord};
use crate::error::{DroppError, Result};
use crate::session::SessionManager;
use flows::{FlowContext, Reporter};

/// Identifier of one dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

/// A user-triggered action.
#[derive(Debug, Clone)]
pub enum Action {
    Refresh,
    Upload(UploadRequest),
    /// Read the file from disk on the worker, then upload it.
    UploadFile(PathBuf),
    Download(FileRecord),
    /// Delete by file id.
    Delete(String),
}

impl Action {
    /// The stage a task enters as soon as it is dispatched.
    pub fn initial_stage(&self) -> Stage {
        match self {
            Action::Refresh => Stage::Fetching,
            Action::Upload(_) | Action::UploadFile(_) => Stage::CheckingQuota,
            Action::Download(_) => Stage::Downloading,
            Action::Delete(_) => Stage::Deleting,
        }
    }
}

/// Terminal result of a task.
#[derive(Debug)]
pub enum Outcome {
    Refreshed(Result<Vec<FileRecord>>),
    Uploaded {
        file_name: String,
        result: Result<()>,
    },
    Downloaded {
        file_name: String,
        result: Result<PathBuf>,
    },
    Deleted {
        file_id: String,
        result: Result<DeleteOutcome>,
    },
}

#[derive(Debug)]
pub enum EventKind {
    Stage(Stage),
    Finished(Outcome),
}

/// One entry on the completion queue.
#[derive(Debug)]
pub struct TransferEvent {
    pub task: TaskId,
    pub kind: EventKind,
}

/// Receiving half of the completion queue.
pub type Completions = mpsc::UnboundedReceiver<TransferEvent>;

/// Dispatches actions onto worker tasks.
///
/// Owns nothing global: the API client and session manager are handed in by
/// the composition root.
pub struct TransferWorkflow {
    ctx: FlowContext,
    next_task: AtomicU64,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl TransferWorkflow {
    /// Create a workflow and the receiving end of its completion queue.
    pub fn new(
        api: Arc<ApiClient>,
        session: SessionManager,
        download_dir: PathBuf,
    ) -> (Self, Completions) {
        let (tx, rx) = mpsc::unbounded_channel();
        let workflow = Self {
            ctx: FlowContext {
                api,
                session,
                download_dir,
            },
            next_task: AtomicU64::new(1),
            events: tx,
        };
        (workflow, rx)
    }

    pub fn session(&self) -> &SessionManager {
        &self.ctx.session
    }

    /// Spawn `action` on the runtime. Must be called from within a tokio runtime.
    ///
    /// Exactly one [`EventKind::Finished`] is sent for the returned id.
    pub fn dispatch(&self, action: Action) -> TaskId {
        let task = TaskId(self.next_task.fetch_add(1, Ordering::Relaxed));
        let ctx = self.ctx.clone();
        let reporter = Reporter::new(task, self.events.clone());
        let flow_reporter = reporter.clone();
        let subject = Subject::of(&action);
        log::debug!("Dispatching {} ({:?})", task, action.initial_stage());

        spawn_reported(reporter, subject, async move {
            flows::run(&ctx, action, &flow_reporter).await
        });
        task
    }
}

/// What a task was acting on, kept outside the flow so a failed task can
/// still be reported against the right file.
#[derive(Debug)]
enum Subject {
    Listing,
    Upload(String),
    Download(String),
    Delete(String),
}

impl Subject {
    fn of(action: &Action) -> Self {
        match action {
            Action::Refresh => Subject::Listing,
            Action::Upload(request) => Subject::Upload(request.file_name.clone()),
            Action::UploadFile(path) => Subject::Upload(
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string()),
            ),
            Action::Download(record) => Subject::Download(record.name.clone()),
            Action::Delete(file_id) => Subject::Delete(file_id.clone()),
        }
    }

    fn failed(self, error: DroppError) -> Outcome {
        match self {
            Subject::Listing => Outcome::Refreshed(Err(error)),
            Subject::Upload(file_name) => Outcome::Uploaded {
                file_name,
                result: Err(error),
            },
            Subject::Download(file_name) => Outcome::Downloaded {
                file_name,
                result: Err(error),
            },
            Subject::Delete(file_id) => Outcome::Deleted {
                file_id,
                result: Err(error),
            },
        }
    }
}

/// Run `flow` on its own task and always send exactly one `Finished` event,
/// even if the flow panics.
fn spawn_reported<F>(reporter: Reporter, subject: Subject, flow: F)
where
    F: Future<Output = Outcome> + Send + 'static,
{
    tokio::spawn(async move {
        let outcome = match tokio::spawn(flow).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("{} aborted: {}", reporter.task(), e);
                subject.failed(DroppError::TaskFailed(e.to_string()))
            }
        };
        reporter.finish(outcome);
    });
}

/// Drain the completion queue into `browser` until no task is in flight.
///
/// Follow-up actions returned by the browser (refresh after delete/upload)
/// are dispatched as they appear.
pub async fn run_until_idle(
    workflow: &TransferWorkflow,
    completions: &mut Completions,
    browser: &mut FileBrowser,
) {
    while browser.has_pending() {
        let Some(event) = completions.recv().await else {
            log::warn!("Completion queue closed with tasks still pending");
            break;
        };
        for follow_up in browser.apply(event) {
            browser.dispatch(workflow, follow_up);
        }
    }
}
