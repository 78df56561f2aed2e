// src/classifier/expand.rs

//! Fan a classification entry out into concrete tasks.
//!
//! For one [`ClassifierSpec`] the expander:
//!
//! 1. builds `(sim, fit)` candidates from the implementation's requirements,
//! 2. drops candidates rejected by the mask filters,
//! 3. resolves `MODEL` (none, a file on disk, or an earlier classification),
//! 4. emits one task per replicate of every surviving candidate.
//!
//! Producing no task at all is a configuration error.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::classifier::registry::Requirements;
use crate::classifier::spec::{ClassifierSpec, MaskSet, ModelRef};
use crate::context::PipelineContext;
use crate::errors::{PipdagError, Result};
use crate::graph::TaskGraph;
use crate::task::output::keys;
use crate::task::{ClassifierTask, OutputValue, Task, TaskId, TaskKind, TaskRole};
use crate::types::{MaskMatching, Mode};

pub const PREDICTIONS_FILE: &str = "predictions.csv";
pub const MODEL_FILE: &str = "model.pkl";

/// One upstream combination a classifier may run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Simulation or data-prep task. For fit-only implementations this is
    /// the fit's own upstream and only feeds naming and replicate counting.
    pub sim: Option<TaskId>,
    pub fit: Option<TaskId>,
    /// Tasks the generated classifier tasks depend on.
    pub deps: Vec<TaskId>,
}

/// Candidate list for an implementation's requirements, in graph order.
pub fn candidates(requirements: Requirements, graph: &TaskGraph) -> Vec<Candidate> {
    let fits = || {
        graph
            .of_roles(&[TaskRole::LightCurveFit])
            .into_iter()
            .filter_map(|fit| fit_upstream(graph, fit).map(|sim| (sim, fit)))
    };

    match (requirements.needs_sim, requirements.needs_fit) {
        (true, true) => fits()
            .map(|(sim, fit)| Candidate {
                sim: Some(sim),
                fit: Some(fit),
                deps: vec![sim, fit],
            })
            .collect(),
        (true, false) => graph
            .of_roles(TaskRole::SIM_LIKE)
            .into_iter()
            .map(|sim| Candidate {
                sim: Some(sim),
                fit: None,
                deps: vec![sim],
            })
            .collect(),
        (false, true) => fits()
            .map(|(sim, fit)| Candidate {
                sim: Some(sim),
                fit: Some(fit),
                deps: vec![fit],
            })
            .collect(),
        (false, false) => Vec::new(),
    }
}

fn fit_upstream(graph: &TaskGraph, fit: TaskId) -> Option<TaskId> {
    match graph.task(fit).kind() {
        TaskKind::LightCurveFit(l) => Some(l.sim),
        _ => None,
    }
}

/// Whether a candidate survives the mask filters.
///
/// `mask` and `mask_sim` are always matched against the simulation name;
/// `mask` gates both the sim and the fit side. How `mask_fit` is applied
/// depends on `matching`, see [`MaskMatching`].
pub fn mask_matches(
    masks: &MaskSet,
    matching: MaskMatching,
    sim_name: Option<&str>,
    fit_name: Option<&str>,
) -> bool {
    let sim_contains = |needle: &str| sim_name.is_some_and(|s| s.contains(needle));

    let mut matched_sim = true;
    let mut matched_fit = true;

    if !masks.mask.is_empty() {
        matched_sim &= sim_contains(&masks.mask);
        matched_fit &= sim_contains(&masks.mask);
    }
    if !masks.mask_sim.is_empty() {
        matched_sim &= sim_contains(&masks.mask_sim);
    }
    if !masks.mask_fit.is_empty() {
        matched_fit &= match matching {
            MaskMatching::FitName => fit_name.is_none_or(|f| f.contains(&masks.mask_fit)),
            MaskMatching::Legacy => masks.mask_sim.is_empty() || sim_contains(&masks.mask_sim),
        };
    }

    matched_sim && matched_fit
}

/// Number of replicates `R`: the sim's folders, or the fit's FITRES
/// directories when no sim is attached.
pub fn replicate_count(graph: &TaskGraph, candidate: &Candidate) -> Option<usize> {
    if let Some(sim) = candidate.sim {
        return Some(folder_count(graph, sim, keys::SIM_FOLDERS));
    }
    candidate
        .fit
        .map(|fit| folder_count(graph, fit, keys::FITRES_DIRS))
}

fn folder_count(graph: &TaskGraph, id: TaskId, key: &str) -> usize {
    graph
        .task(id)
        .output()
        .paths(key)
        .map(|p| p.len())
        .unwrap_or(0)
}

/// Resolved `MODEL` option.
#[derive(Debug, Clone)]
enum ResolvedModel {
    None,
    /// Existing model file and the name of the folder holding it.
    Path { path: PathBuf, folder: String },
    /// Earlier classification tasks carrying the referenced name.
    Tasks(Vec<TaskId>),
}

/// Expands classification entries into tasks appended to a [`TaskGraph`].
pub struct ClassifierExpander<'a> {
    ctx: &'a PipelineContext,
}

impl<'a> ClassifierExpander<'a> {
    pub fn new(ctx: &'a PipelineContext) -> Self {
        Self { ctx }
    }

    /// Expand every entry in configuration order. Later entries can see the
    /// tasks of earlier ones.
    pub fn expand_all(&self, specs: &[ClassifierSpec], graph: &mut TaskGraph) -> Result<Vec<TaskId>> {
        let mut all = Vec::new();
        for spec in specs {
            all.extend(self.expand(spec, graph)?);
        }
        Ok(all)
    }

    /// Expand one entry. On error nothing has been appended to `graph`.
    pub fn expand(&self, spec: &ClassifierSpec, graph: &mut TaskGraph) -> Result<Vec<TaskId>> {
        let requirements = spec.kind.requirements();
        if !requirements.needs_sim && !requirements.needs_fit {
            warn!(
                classifier = %spec.kind,
                task = %spec.name,
                "classifier needs neither simulations nor fits, skipping"
            );
            return Ok(Vec::new());
        }

        let matching = self.ctx.global.mask_matching;
        let surviving: Vec<Candidate> = candidates(requirements, graph)
            .into_iter()
            .filter(|c| {
                let sim_name = c.sim.map(|id| graph.task(id).name());
                let fit_name = c.fit.map(|id| graph.task(id).name());
                let keep = mask_matches(&spec.masks, matching, sim_name, fit_name);
                if !keep {
                    debug!(task = %spec.name, sim = ?sim_name, fit = ?fit_name, "candidate masked out");
                }
                keep
            })
            .collect();

        if surviving.is_empty() {
            return Err(no_match_error(spec));
        }

        let mut planned = Vec::new();
        for candidate in &surviving {
            let replicates = replicate_count(graph, candidate).ok_or_else(|| {
                PipdagError::config(&spec.name, "classifier dependency has no simulation or fit")
            })?;
            if spec.mode == Mode::Train {
                self.check_single_replicate(spec, graph, candidate)?;
            }
            planned.push((candidate, replicates));
        }

        let model = self.resolve_model(spec, graph)?;

        let mut tasks = Vec::new();
        for (candidate, replicates) in planned {
            for index in 0..replicates {
                match &model {
                    ResolvedModel::None => {
                        tasks.push(self.build_task(spec, graph, candidate, index, replicates, None)?);
                    }
                    ResolvedModel::Path { path, folder } => {
                        let source = ModelSource::Path {
                            path: path.as_path(),
                            folder: folder.as_str(),
                        };
                        tasks.push(self.build_task(spec, graph, candidate, index, replicates, Some(source))?);
                    }
                    ResolvedModel::Tasks(refs) => {
                        for trainer in refs {
                            let source = ModelSource::Task(*trainer);
                            tasks.push(self.build_task(spec, graph, candidate, index, replicates, Some(source))?);
                        }
                    }
                }
            }
        }

        if tasks.is_empty() {
            return Err(no_match_error(spec));
        }

        let mut dirs = HashSet::new();
        for task in &tasks {
            graph.check_unclaimed(task)?;
            if !dirs.insert(task.output_dir()) {
                return Err(PipdagError::config(
                    &spec.name,
                    format!("two tasks of this entry share output directory {:?}", task.output_dir()),
                ));
            }
        }

        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            ids.push(graph.add_task(task)?);
        }
        Ok(ids)
    }

    fn check_single_replicate(
        &self,
        spec: &ClassifierSpec,
        graph: &TaskGraph,
        candidate: &Candidate,
    ) -> Result<()> {
        if let Some(sim) = candidate.sim {
            let n = folder_count(graph, sim, keys::SIM_FOLDERS);
            if n != 1 {
                return Err(PipdagError::config(
                    &spec.name,
                    format!(
                        "training requires one version of the sim, you have {n} for sim task {}; make sure the training sim has a single replicate",
                        graph.task(sim).name()
                    ),
                ));
            }
        }
        if let Some(fit) = candidate.fit {
            let n = folder_count(graph, fit, keys::FITRES_DIRS);
            if n != 1 {
                return Err(PipdagError::config(
                    &spec.name,
                    format!(
                        "training requires one version of the lcfits, you have {n} for lcfit task {}",
                        graph.task(fit).name()
                    ),
                ));
            }
        }
        Ok(())
    }

    fn resolve_model(&self, spec: &ClassifierSpec, graph: &TaskGraph) -> Result<ResolvedModel> {
        match &spec.model {
            None => Ok(ResolvedModel::None),
            Some(ModelRef::Path(raw)) => {
                let path = self.ctx.resolve_model_path(raw);
                if !self.ctx.fs.exists(&path) {
                    return Err(PipdagError::config(
                        &spec.name,
                        format!("model {raw} looks like a path, but no model was found at {path:?}"),
                    ));
                }
                let folder = containing_folder_name(&path);
                debug!(task = %spec.name, model = ?path, "resolved model path");
                Ok(ResolvedModel::Path { path, folder })
            }
            Some(ModelRef::Task(name)) => {
                let refs = graph.find(|t| t.role() == TaskRole::Classifier && t.name() == name);
                if refs.is_empty() {
                    return Err(PipdagError::config(
                        &spec.name,
                        format!("MODEL '{name}' does not match any earlier classification task"),
                    ));
                }
                for id in &refs {
                    let other = graph
                        .task(*id)
                        .as_classifier()
                        .map(|c| c.kind)
                        .ok_or_else(|| PipdagError::UnknownTask(name.clone()))?;
                    if other != spec.kind {
                        return Err(PipdagError::config(
                            &spec.name,
                            format!(
                                "classifier {} has model {name} with classifier {other}, they should match",
                                spec.kind
                            ),
                        ));
                    }
                }
                Ok(ResolvedModel::Tasks(refs))
            }
        }
    }

    fn build_task(
        &self,
        spec: &ClassifierSpec,
        graph: &TaskGraph,
        candidate: &Candidate,
        index: usize,
        replicates: usize,
        model: Option<ModelSource<'_>>,
    ) -> Result<Task> {
        let sim_name = candidate.sim.map(|id| graph.task(id).name().to_string());
        let fit_name = candidate.fit.map(|id| graph.task(id).name().to_string());

        let upstream_name = if spec.kind.requirements().needs_fit {
            fit_name.as_deref()
        } else {
            sim_name.as_deref()
        };
        let unique_name = match upstream_name {
            Some(up) => format!("{}_{}", spec.name, up),
            None => spec.name.clone(),
        };

        let (extra, model_task, model_path, prob_column) = match model {
            None => (None, None, None, format!("PROB_{unique_name}")),
            Some(ModelSource::Path { path, folder }) => (
                Some(folder.to_string()),
                None,
                Some(path.to_path_buf()),
                format!("PROB_{folder}"),
            ),
            Some(ModelSource::Task(trainer)) => {
                let t = graph.task(trainer);
                let c = t
                    .as_classifier()
                    .ok_or_else(|| PipdagError::UnknownTask(t.name().to_string()))?;
                (
                    Some(c.unique_name.clone()),
                    Some(trainer),
                    None,
                    c.prob_column.clone(),
                )
            }
        };

        let suffix = (replicates > 1).then_some(index + 1);
        let output_dir = self.ctx.layout.classifier_dir(
            sim_name.as_deref(),
            fit_name.as_deref(),
            &spec.name,
            suffix,
            extra.as_deref(),
        );

        let mut deps = candidate.deps.clone();
        if let Some(trainer) = model_task {
            deps.push(trainer);
        }

        let kind = TaskKind::Classifier(ClassifierTask {
            kind: spec.kind,
            mode: spec.mode,
            options: spec.options.clone(),
            index,
            unique_name,
            prob_column: prob_column.clone(),
            model_task,
            model_path,
        });

        let mut task = Task::new(
            &spec.name,
            kind,
            output_dir.clone(),
            deps,
            1,
            self.ctx.layout.job_name(&output_dir),
        );
        task.set_output(keys::PROB_COLUMN_NAME, OutputValue::Text(prob_column))?;
        task.set_output(keys::INDEX, OutputValue::Index(index))?;
        task.set_output(
            keys::PREDICTIONS_FILENAME,
            OutputValue::Path(output_dir.join(PREDICTIONS_FILE)),
        )?;
        if spec.mode == Mode::Train {
            task.set_output(keys::MODEL_FILENAME, OutputValue::Path(output_dir.join(MODEL_FILE)))?;
        }
        task.set_output(keys::CLASSIFIER, OutputValue::Text(spec.kind.identifier().to_string()))?;
        task.set_output(keys::MODE, OutputValue::Text(spec.mode.to_string()))?;

        info!(
            classifier = %spec.kind,
            task = %spec.name,
            fit = ?fit_name,
            sim = ?sim_name,
            index,
            jobs = task.num_jobs(),
            "creating classification task"
        );
        Ok(task)
    }
}

#[derive(Debug, Clone, Copy)]
enum ModelSource<'m> {
    Path { path: &'m Path, folder: &'m str },
    Task(TaskId),
}

fn containing_folder_name(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn no_match_error(spec: &ClassifierSpec) -> PipdagError {
    PipdagError::config(
        &spec.name,
        format!(
            "classifier {} with masks |{}|{}|{}| matched no combination of sims and fits",
            spec.name, spec.masks.mask, spec.masks.mask_sim, spec.masks.mask_fit
        ),
    )
}
