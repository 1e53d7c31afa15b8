//! Single-threaded consumer of the completion queue.
//!
//! Stands in for the list screen: it owns the file collection, knows which
//! tasks are in flight (for the busy indicator) and turns every outcome into
//! a short notification. It is the only place the collection changes.

use std::collections::HashMap;

use super::{Action, EventKind, Outcome, Stage, TaskId, TransferEvent, TransferWorkflow};
use crate::api::{DeleteOutcome, FileRecord};
use crate::error::DroppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// A transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    fn info(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

#[derive(Default)]
pub struct FileBrowser {
    files: Vec<FileRecord>,
    in_flight: HashMap<TaskId, Stage>,
    notifications: Vec<Notification>,
    refreshes_applied: usize,
}

impl FileBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Files from the last successful refresh, in server order.
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn find(&self, id_or_name: &str) -> Option<&FileRecord> {
        self.files
            .iter()
            .find(|f| f.id == id_or_name)
            .or_else(|| self.files.iter().find(|f| f.name == id_or_name))
    }

    /// True while a refresh is in flight.
    pub fn is_busy(&self) -> bool {
        self.in_flight.values().any(|s| s.is_refresh())
    }

    pub fn has_pending(&self) -> bool {
        !self.in_flight.is_empty()
    }

    pub fn stage_of(&self, task: TaskId) -> Option<Stage> {
        self.in_flight.get(&task).copied()
    }

    /// Number of successful refreshes applied so far.
    pub fn refreshes_applied(&self) -> usize {
        self.refreshes_applied
    }

    /// Drain pending notifications, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Dispatch through `workflow` and track the task as in flight.
    pub fn dispatch(&mut self, workflow: &TransferWorkflow, action: Action) -> TaskId {
        let stage = action.initial_stage();
        let task = workflow.dispatch(action);
        self.track(task, stage);
        task
    }

    /// Mark `task` as in flight at `stage`.
    pub(crate) fn track(&mut self, task: TaskId, stage: Stage) {
        log::info!("{}: {}", task, stage.label());
        self.in_flight.insert(task, stage);
    }

    /// Apply one completion event. Returns follow-up actions to dispatch.
    pub fn apply(&mut self, event: TransferEvent) -> Vec<Action> {
        match event.kind {
            EventKind::Stage(stage) => {
                // A stage arriving after its task finished is stale.
                if let Some(current) = self.in_flight.get_mut(&event.task) {
                    if *current != stage {
                        log::info!("{}: {}", event.task, stage.label());
                    }
                    *current = stage;
                }
                Vec::new()
            }
            EventKind::Finished(outcome) => {
                self.in_flight.remove(&event.task);
                self.finish(outcome)
            }
        }
    }

    fn finish(&mut self, outcome: Outcome) -> Vec<Action> {
        match outcome {
            Outcome::Refreshed(Ok(files)) => {
                log::debug!("Refresh populated {} files", files.len());
                self.files = files;
                self.refreshes_applied += 1;
                Vec::new()
            }
            Outcome::Refreshed(Err(e)) => {
                log::warn!("Refresh failed: {}", e);
                self.notify_error(format!("Failed to fetch files: {}", e));
                Vec::new()
            }
            Outcome::Uploaded {
                file_name,
                result: Ok(()),
            } => {
                self.notifications
                    .push(Notification::info(format!("Uploaded {}", file_name)));
                vec![Action::Refresh]
            }
            Outcome::Uploaded {
                file_name,
                result: Err(e),
            } => {
                log::warn!("Upload of {} failed: {}", file_name, e);
                match e {
                    DroppError::CapacityExceeded { .. } => self.notify_error(e.to_string()),
                    other => self.notify_error(format!("Upload failed: {}", other)),
                }
                Vec::new()
            }
            Outcome::Downloaded {
                file_name,
                result: Ok(path),
            } => {
                self.notifications.push(Notification::info(format!(
                    "Downloaded {} to {}",
                    file_name,
                    path.display()
                )));
                Vec::new()
            }
            Outcome::Downloaded {
                file_name,
                result: Err(e),
            } => {
                log::warn!("Download of {} failed: {}", file_name, e);
                self.notify_error(format!("Download failed: {}", e));
                Vec::new()
            }
            Outcome::Deleted {
                file_id,
                result: Ok(outcome),
            } => {
                let message = match outcome {
                    DeleteOutcome::Deleted => "File deleted".to_string(),
                    DeleteOutcome::AlreadyAbsent => format!("File {} was already deleted", file_id),
                };
                self.notifications.push(Notification::info(message));
                vec![Action::Refresh]
            }
            Outcome::Deleted {
                file_id,
                result: Err(e),
            } => {
                log::warn!("Delete of {} failed: {}", file_id, e);
                self.notify_error(format!("Failed to delete file: {}", e));
                Vec::new()
            }
        }
    }

    fn notify_error(&mut self, message: String) {
        self.notifications.push(Notification::error(message));
    }
}
