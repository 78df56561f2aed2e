// src/task/mod.rs

//! The unit of orchestrated work.
//!
//! - [`state`]: lifecycle states and failure reasons.
//! - [`output`]: write-once outputs read by downstream tasks.
//! - [`gate`]: fingerprinting and the hash-gated skip/resume/run decision.
//! - [`render`]: turns a task into the batch script it submits.

pub mod gate;
pub mod output;
pub mod render;
pub mod state;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use tracing::warn;

use crate::classifier::ClassifierKind;
use crate::errors::{PipdagError, Result};
use crate::types::Mode;

pub use gate::{GateDecision, HashGate, PollOutcome};
pub use output::{OutputValue, TaskOutput};
pub use state::{FailureReason, TaskState};

/// Handle to a task inside a [`crate::graph::TaskGraph`].
///
/// Ids are handed out in construction order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub(crate) NodeIndex);

impl TaskId {
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index())
    }
}

/// Coarse task type used for dependency lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskRole {
    DataPrep,
    Simulation,
    LightCurveFit,
    Classifier,
}

impl TaskRole {
    /// Roles that provide photometry (one folder per replicate).
    pub const SIM_LIKE: &'static [TaskRole] = &[TaskRole::DataPrep, TaskRole::Simulation];
}

#[derive(Debug, Clone)]
pub struct DataPrepTask {
    pub cmd: String,
    pub raw_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SimulationTask {
    pub cmd: String,
    pub replicates: usize,
}

#[derive(Debug, Clone)]
pub struct LcfitTask {
    pub cmd: String,
    /// Name of the `[[lcfit]]` entry this task was expanded from.
    pub fit_name: String,
    /// Upstream data-prep / simulation task.
    pub sim: TaskId,
}

#[derive(Debug, Clone)]
pub struct ClassifierTask {
    pub kind: ClassifierKind,
    pub mode: Mode,
    pub options: BTreeMap<String, toml::Value>,
    /// Replicate index, `0..R`.
    pub index: usize,
    /// Classifier name joined with its fit (or sim) dependency name.
    pub unique_name: String,
    pub prob_column: String,
    /// Trainer task when MODEL names another classification.
    pub model_task: Option<TaskId>,
    /// Resolved model file when MODEL is a path.
    pub model_path: Option<PathBuf>,
}

impl ClassifierTask {
    pub fn option_str(&self, key: &str) -> Option<String> {
        self.options.get(key).map(|v| match v {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum TaskKind {
    DataPrep(DataPrepTask),
    Simulation(SimulationTask),
    LightCurveFit(LcfitTask),
    Classifier(ClassifierTask),
}

impl TaskKind {
    pub fn role(&self) -> TaskRole {
        match self {
            TaskKind::DataPrep(_) => TaskRole::DataPrep,
            TaskKind::Simulation(_) => TaskRole::Simulation,
            TaskKind::LightCurveFit(_) => TaskRole::LightCurveFit,
            TaskKind::Classifier(_) => TaskRole::Classifier,
        }
    }
}

/// One unit of external work: a batch job plus its state and outputs.
#[derive(Debug, Clone)]
pub struct Task {
    name: String,
    kind: TaskKind,
    output_dir: PathBuf,
    dependencies: Vec<TaskId>,
    num_jobs: usize,
    job_name: String,
    output: TaskOutput,
    state: TaskState,
    failure: Option<FailureReason>,
    fingerprint: Option<String>,
    gate: HashGate,
}

impl Task {
    pub fn new(
        name: impl Into<String>,
        kind: TaskKind,
        output_dir: PathBuf,
        dependencies: Vec<TaskId>,
        num_jobs: usize,
        job_name: String,
    ) -> Self {
        let name = name.into();
        let mut output = TaskOutput::new();
        output.try_insert(output::keys::NAME, OutputValue::Text(name.clone()));
        output.try_insert(output::keys::OUTPUT_DIR, OutputValue::Path(output_dir.clone()));

        Self {
            gate: HashGate::new(output_dir.clone()),
            name,
            kind,
            output_dir,
            dependencies,
            num_jobs,
            job_name,
            output,
            state: TaskState::Unsubmitted,
            failure: None,
            fingerprint: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn role(&self) -> TaskRole {
        self.kind.role()
    }

    pub fn as_classifier(&self) -> Option<&ClassifierTask> {
        match &self.kind {
            TaskKind::Classifier(c) => Some(c),
            _ => None,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }

    pub fn num_jobs(&self) -> usize {
        self.num_jobs
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn output(&self) -> &TaskOutput {
        &self.output
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn failure(&self) -> Option<&FailureReason> {
        self.failure.as_ref()
    }

    /// Fingerprint this task was gated with in the current run.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn gate(&self) -> &HashGate {
        &self.gate
    }

    /// Set an output value. Each key can be written exactly once.
    pub fn set_output(&mut self, key: &str, value: OutputValue) -> Result<()> {
        if self.output.try_insert(key, value) {
            Ok(())
        } else {
            Err(PipdagError::OutputConflict {
                task: self.name.clone(),
                key: key.to_string(),
            })
        }
    }

    fn transition(&mut self, next: TaskState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(
                task = %self.name,
                from = %self.state,
                to = %next,
                "ignoring invalid state transition"
            );
            return false;
        }
        self.state = next;
        true
    }

    pub(crate) fn mark_running(&mut self, fingerprint: String) -> bool {
        let moved = self.transition(TaskState::Running);
        if moved {
            self.fingerprint = Some(fingerprint);
        }
        moved
    }

    /// Terminal success. `fingerprint` is only needed when the task skips
    /// straight from `Unsubmitted`.
    pub(crate) fn mark_succeeded(&mut self, fingerprint: Option<String>) -> bool {
        if !self.transition(TaskState::FinishedSuccess) {
            return false;
        }
        if let Some(fp) = fingerprint {
            self.fingerprint = Some(fp);
        }
        if let Some(fp) = self.fingerprint.clone() {
            self.output
                .try_insert(output::keys::FINGERPRINT, OutputValue::Text(fp));
        }
        true
    }

    pub(crate) fn mark_failed(&mut self, reason: FailureReason) -> bool {
        if !self.transition(TaskState::FinishedFailure) {
            return false;
        }
        self.failure = Some(reason);
        true
    }
}
