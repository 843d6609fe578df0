//! # Porch Wire Types
//!
//! Types exchanged with a porch server. A porch pipeline is a pub/sub queue
//! where tasks are added by one process and later claimed and processed by
//! another. The identity of a task is the pipeline it belongs to plus its
//! serialized input; porch uses this to ensure each task is created and
//! processed once.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a porch task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Running,
    Done,
    Cancelled,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Claimed => "CLAIMED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Done => "DONE",
            TaskStatus::Cancelled => "CANCELLED",
            TaskStatus::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// Identity of a pipeline registered with porch
///
/// A pipeline is identified by its name, URI and version. Bumping the
/// version starts a fresh task set, so bug-fix releases that should keep
/// feeding the same set must pin the version in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    pub name: String,
    pub uri: String,
    pub version: String,
}

impl fmt::Display for PipelineSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.uri, self.version)
    }
}

/// Request body for task submission and status updates
#[derive(Debug, Serialize)]
pub struct TaskEnvelope<'a, T: Serialize> {
    pub pipeline: &'a PipelineSpec,
    pub task_input: &'a T,
    pub status: TaskStatus,
}

/// A task as returned by porch
///
/// Responses also carry the pipeline document; only the input and status
/// are of interest to callers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskView<T> {
    pub task_input: T,
    pub status: TaskStatus,
}

/// Outcome tally for a batch of task operations
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchCounts {
    /// Items inspected
    pub processed: usize,
    /// Items that completed the operation
    pub succeeded: usize,
    /// Items that failed and were logged
    pub errors: usize,
}

impl BatchCounts {
    /// True when no item in the batch failed
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors == 0
    }
}
