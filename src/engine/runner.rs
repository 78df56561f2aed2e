// src/engine/runner.rs

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::batch::{BatchBackend, JobSubmission};
use crate::context::PipelineContext;
use crate::graph::TaskGraph;
use crate::task::gate::{compute_fingerprint, job_is_active};
use crate::task::render::render_submission;
use crate::task::{FailureReason, GateDecision, PollOutcome, TaskId, TaskState};

/// Final (or interrupted) state of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, FailureReason)>,
    /// Tasks still unsubmitted or running when the loop stopped.
    pub pending: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.pending.is_empty()
    }
}

/// Drives every task of a [`TaskGraph`] through gate, submission and
/// polling.
///
/// Each [`Runner::tick`] walks the tasks in construction order, which is a
/// topological order, so a task that is skipped by its hash gate unblocks
/// its dependents within the same tick.
pub struct Runner<B: BatchBackend> {
    ctx: PipelineContext,
    graph: TaskGraph,
    backend: B,
}

impl<B: BatchBackend> fmt::Debug for Runner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("tasks", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl<B: BatchBackend> Runner<B> {
    pub fn new(ctx: PipelineContext, graph: TaskGraph, backend: B) -> Self {
        Self {
            ctx,
            graph,
            backend,
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Poll until every task is terminal, `once` is set, or Ctrl-C.
    ///
    /// Interrupting leaves submitted jobs in the scheduler queue; the next
    /// run resumes them through the hash gate.
    pub async fn run(&mut self, interval: Duration, once: bool) -> Result<RunSummary> {
        info!(tasks = self.graph.len(), ?interval, once, "pipeline runner started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await?;
                    if self.graph.all_terminal() {
                        info!("all tasks finished");
                        break;
                    }
                    if once {
                        info!("single pass requested; stopping runner");
                        break;
                    }
                }
                _ = &mut ctrl_c => {
                    warn!("interrupted; submitted jobs are left in the scheduler queue");
                    break;
                }
            }
        }

        let summary = self.summary();
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            pending = summary.pending.len(),
            "pipeline runner stopped"
        );
        Ok(summary)
    }

    /// One polling pass over all tasks.
    ///
    /// Errors are infrastructure problems (unreadable hash files, an output
    /// directory that cannot be wiped). Failed jobs are not errors; they are
    /// recorded on the task and its dependents.
    pub async fn tick(&mut self) -> Result<()> {
        let active = self.backend.active_jobs().await;
        if active.is_none() {
            debug!("scheduler queue unavailable this tick");
        }

        let ids: Vec<TaskId> = self.graph.ids().collect();
        for id in ids {
            match self.graph.task(id).state() {
                TaskState::Unsubmitted => {
                    if let Some(upstream) = self.failed_dependency(id) {
                        self.fail(id, FailureReason::Blocked { upstream });
                        continue;
                    }
                    if self.dependencies_succeeded(id) {
                        self.start(id, active.as_deref()).await?;
                    }
                }
                TaskState::Running => self.poll(id, active.as_deref())?,
                TaskState::FinishedSuccess | TaskState::FinishedFailure => {}
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for (_, task) in self.graph.tasks() {
            let label = task_label(task.output_dir(), task.name());
            match task.state() {
                TaskState::FinishedSuccess => summary.succeeded.push(label),
                TaskState::FinishedFailure => {
                    let reason = task
                        .failure()
                        .cloned()
                        .unwrap_or(FailureReason::Submit("unknown".to_string()));
                    summary.failed.push((label, reason));
                }
                TaskState::Unsubmitted | TaskState::Running => summary.pending.push(label),
            }
        }
        summary
    }

    fn failed_dependency(&self, id: TaskId) -> Option<String> {
        self.graph
            .dependencies(id)
            .iter()
            .map(|d| self.graph.task(*d))
            .find(|t| t.state() == TaskState::FinishedFailure)
            .map(|t| t.name().to_string())
    }

    fn dependencies_succeeded(&self, id: TaskId) -> bool {
        self.graph
            .dependencies(id)
            .iter()
            .all(|d| self.graph.task(*d).state() == TaskState::FinishedSuccess)
    }

    /// Gate an unsubmitted task and submit it if needed.
    async fn start(&mut self, id: TaskId, active: Option<&[String]>) -> Result<()> {
        let submission = match render_submission(&self.ctx, &self.graph, id) {
            Ok(s) => s,
            Err(e) => {
                error!(task = %self.graph.task(id).name(), error = %format!("{e:#}"), "could not render job");
                self.fail(id, FailureReason::Submit(format!("{e:#}")));
                return Ok(());
            }
        };

        let task = self.graph.task(id);
        let dep_fingerprints: Vec<String> = task
            .dependencies()
            .iter()
            .filter_map(|d| self.graph.task(*d).fingerprint().map(str::to_string))
            .collect();
        let fingerprint = compute_fingerprint(&submission.script, &dep_fingerprints);

        let fs = self.ctx.fs.clone();
        let gate = task.gate().clone();
        let job_active = job_is_active(&submission.job_name, active);
        let decision = gate.decide(fs.as_ref(), &fingerprint, self.ctx.force_refresh, job_active)?;

        match decision {
            GateDecision::Skip => {
                info!(task = %task.name(), dir = ?task.output_dir(), "hash check passed, not rerunning");
                self.graph.task_mut(id).mark_succeeded(Some(fingerprint));
            }
            GateDecision::Resume => {
                info!(task = %task.name(), job = %submission.job_name, "hash unchanged and job may still be queued; resuming");
                self.graph.task_mut(id).mark_running(fingerprint);
            }
            GateDecision::Run => {
                let name = task.name().to_string();
                let fresh = gate.prepare_output_dir(fs.as_ref())?;
                let script_path = fresh.write_script(&submission.script)?;
                let job = JobSubmission {
                    job_name: submission.job_name.clone(),
                    script_path,
                    working_dir: gate.output_dir().to_path_buf(),
                    done_file: gate.done_file(),
                };

                match self.backend.submit(&job).await {
                    Ok(()) => {
                        fresh.commit(&fingerprint)?;
                        info!(task = %name, job = %job.job_name, "submitted batch job");
                        self.graph.task_mut(id).mark_running(fingerprint);
                    }
                    Err(e) => {
                        error!(task = %name, job = %job.job_name, error = %format!("{e:#}"), "submission failed");
                        self.fail(id, FailureReason::Submit(format!("{e:#}")));
                    }
                }
            }
        }
        Ok(())
    }

    fn poll(&mut self, id: TaskId, active: Option<&[String]>) -> Result<()> {
        let task = self.graph.task(id);
        let outcome = task.gate().poll(self.ctx.fs.as_ref(), task.job_name(), active)?;

        match outcome {
            PollOutcome::Pending => {
                debug!(task = %task.name(), job = %task.job_name(), "job still pending");
            }
            PollOutcome::Success => {
                info!(task = %task.name(), dir = ?task.output_dir(), "task finished successfully");
                self.graph.task_mut(id).mark_succeeded(None);
            }
            PollOutcome::Failure(contents) => {
                self.fail(id, FailureReason::Marker(contents));
            }
            PollOutcome::Vanished => {
                self.fail(id, FailureReason::JobVanished);
            }
        }
        Ok(())
    }

    /// Record a failure and block everything downstream of it.
    fn fail(&mut self, id: TaskId, reason: FailureReason) {
        let task = self.graph.task_mut(id);
        warn!(task = %task.name(), dir = ?task.output_dir(), reason = %reason, "task failed");
        if !task.mark_failed(reason) {
            return;
        }
        let blocked = self.graph.mark_dependents_failed(id);
        if !blocked.is_empty() {
            warn!(
                task = %self.graph.task(id).name(),
                blocked = blocked.len(),
                "dependents will not be submitted"
            );
        }
    }
}

/// Output directory leaf, which is unique per task; falls back to the name.
fn task_label(output_dir: &std::path::Path, name: &str) -> String {
    output_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}
