// src/task/state.rs

//! Task lifecycle states.

use std::fmt;

/// Lifecycle of a single task.
///
/// ```text
/// Unsubmitted ──submit──▶ Running ──marker──▶ FinishedSuccess
///      │                     └──marker/vanished──▶ FinishedFailure
///      └──hash gate skip──▶ FinishedSuccess
/// ```
///
/// A task that never gets submitted (its upstream failed, or its script
/// could not be rendered/submitted) goes straight to `FinishedFailure`.
/// Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Unsubmitted,
    Running,
    FinishedSuccess,
    FinishedFailure,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::FinishedSuccess | TaskState::FinishedFailure)
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, next),
            (Unsubmitted, Running)
                | (Unsubmitted, FinishedSuccess)
                | (Unsubmitted, FinishedFailure)
                | (Running, FinishedSuccess)
                | (Running, FinishedFailure)
        )
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Unsubmitted => "unsubmitted",
            TaskState::Running => "running",
            TaskState::FinishedSuccess => "finished (success)",
            TaskState::FinishedFailure => "finished (failure)",
        };
        f.write_str(s)
    }
}

/// Why a task ended in [`TaskState::FinishedFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The job wrote a failure marker; carries the marker contents.
    Marker(String),
    /// The scheduler no longer knows the job and no marker was written.
    JobVanished,
    /// An upstream task failed, so this one was never submitted.
    Blocked { upstream: String },
    /// Rendering or submitting the job failed.
    Submit(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Marker(contents) => {
                write!(f, "job reported failure: {}", contents.trim())
            }
            FailureReason::JobVanished => {
                f.write_str("job left the scheduler queue without writing a done file")
            }
            FailureReason::Blocked { upstream } => write!(f, "blocked by failed task '{upstream}'"),
            FailureReason::Submit(msg) => write!(f, "could not submit: {msg}"),
        }
    }
}
