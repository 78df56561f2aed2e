// src/graph/index.rs

//! Append-only task graph and the role/name queries over it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use petgraph::Direction;
use petgraph::graph::DiGraph;
use tracing::debug;

use crate::errors::{PipdagError, Result};
use crate::task::{FailureReason, Task, TaskId, TaskRole};

/// All tasks of a pipeline, with an edge `dependency -> dependent` for every
/// declared dependency.
///
/// Tasks can only be appended, and only after every task they depend on, so
/// the graph is acyclic by construction and [`TaskGraph::ids`] is a valid
/// topological order.
///
/// Every task owns its output directory and its scheduler job name; a second
/// task claiming either is rejected.
#[derive(Debug, Default)]
pub struct TaskGraph {
    graph: DiGraph<Task, ()>,
    output_dirs: HashSet<PathBuf>,
    job_names: HashSet<String>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a task. Fails if it names a dependency that is not in the
    /// graph, or if its output directory or job name is already taken.
    pub fn add_task(&mut self, task: Task) -> Result<TaskId> {
        self.check_unclaimed(&task)?;
        for dep in task.dependencies() {
            if self.graph.node_weight(dep.0).is_none() {
                return Err(PipdagError::UnknownTask(format!(
                    "{} (dependency of '{}')",
                    dep,
                    task.name()
                )));
            }
        }

        let deps = task.dependencies().to_vec();
        let name = task.name().to_string();
        self.output_dirs.insert(task.output_dir().to_path_buf());
        self.job_names.insert(task.job_name().to_string());
        let idx = self.graph.add_node(task);
        for dep in deps {
            self.graph.add_edge(dep.0, idx, ());
        }
        debug!(task = %name, id = idx.index(), "added task to graph");
        Ok(TaskId(idx))
    }

    /// Whether `dir` is already the output directory of some task.
    pub fn owns_output_dir(&self, dir: &Path) -> bool {
        self.output_dirs.contains(dir)
    }

    /// Fails with a configuration error naming `task` if another task in the
    /// graph already uses its output directory or job name.
    pub fn check_unclaimed(&self, task: &Task) -> Result<()> {
        if self.owns_output_dir(task.output_dir()) {
            return Err(PipdagError::config(
                task.name(),
                format!(
                    "output directory {:?} is already used by another task; rename one of the entries",
                    task.output_dir()
                ),
            ));
        }
        if self.job_names.contains(task.job_name()) {
            return Err(PipdagError::config(
                task.name(),
                format!(
                    "job name '{}' is already used by another task; rename one of the entries",
                    task.job_name()
                ),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn task(&self, id: TaskId) -> &Task {
        &self.graph[id.0]
    }

    pub fn task_mut(&mut self, id: TaskId) -> &mut Task {
        &mut self.graph[id.0]
    }

    /// Ids in construction order.
    pub fn ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.graph.node_indices().map(TaskId)
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> + '_ {
        self.ids().map(move |id| (id, self.task(id)))
    }

    /// Tasks satisfying `pred`, in construction order.
    pub fn find<P>(&self, mut pred: P) -> Vec<TaskId>
    where
        P: FnMut(&Task) -> bool,
    {
        self.tasks()
            .filter(|(_, t)| pred(t))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn of_roles(&self, roles: &[TaskRole]) -> Vec<TaskId> {
        self.find(|t| roles.contains(&t.role()))
    }

    pub fn by_name(&self, name: &str) -> Option<TaskId> {
        self.find(|t| t.name() == name).into_iter().next()
    }

    /// Direct dependencies, in the order the task declared them.
    pub fn dependencies(&self, id: TaskId) -> &[TaskId] {
        self.task(id).dependencies()
    }

    /// Direct dependents, in construction order.
    pub fn dependents(&self, id: TaskId) -> Vec<TaskId> {
        let mut out: Vec<TaskId> = self
            .graph
            .neighbors_directed(id.0, Direction::Outgoing)
            .map(TaskId)
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Fail every non-terminal direct and transitive dependent of `failed`
    /// with [`FailureReason::Blocked`].
    ///
    /// Returns the newly failed tasks.
    pub fn mark_dependents_failed(&mut self, failed: TaskId) -> Vec<TaskId> {
        let upstream = self.task(failed).name().to_string();
        let mut stack = self.dependents(failed);
        let mut visited: HashSet<TaskId> = HashSet::new();
        let mut newly_failed = Vec::new();

        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let task = self.task_mut(id);
            if task.state().is_terminal() {
                continue;
            }
            if task.mark_failed(FailureReason::Blocked {
                upstream: upstream.clone(),
            }) {
                debug!(
                    task = %task.name(),
                    upstream = %upstream,
                    "marking dependent as failed due to upstream failure"
                );
                newly_failed.push(id);
                stack.extend(self.dependents(id));
            }
        }

        newly_failed.sort();
        newly_failed
    }

    pub fn all_terminal(&self) -> bool {
        self.graph.node_weights().all(|t| t.state().is_terminal())
    }
}
