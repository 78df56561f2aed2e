// src/classifier/command.rs

//! Command lines for classifier jobs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};

use crate::classifier::registry::ClassifierKind;
use crate::graph::TaskGraph;
use crate::task::output::keys;
use crate::task::{ClassifierTask, Task, TaskId, TaskKind, TaskRole};
use crate::types::Mode;

pub const DEFAULT_FEATURES: &str = "zHD x1 c cERR x1ERR COV_x1_c COV_x1_x0 COV_c_x0 PKMJDERR";
pub const DEFAULT_FITOPT: &str = "DEFAULT";

/// A program plus its arguments, rendered space-separated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierInvocation {
    pub program: String,
    pub args: Vec<String>,
}

impl ClassifierInvocation {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn flag(mut self, flag: &str) -> Self {
        self.args.push(flag.to_string());
        self
    }

    fn arg(mut self, flag: &str, value: impl fmt::Display) -> Self {
        self.args.push(flag.to_string());
        self.args.push(value.to_string());
        self
    }

    fn positional(mut self, value: impl fmt::Display) -> Self {
        self.args.push(value.to_string());
        self
    }
}

impl fmt::Display for ClassifierInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Build the invocation for classifier task `id`.
///
/// Reads the outputs of its upstream tasks, so every dependency must already
/// be in the graph.
pub fn classifier_invocation(
    graph: &TaskGraph,
    id: TaskId,
    done_file: &Path,
) -> Result<ClassifierInvocation> {
    let task = graph.task(id);
    let clas = task
        .as_classifier()
        .ok_or_else(|| anyhow!("task '{}' is not a classifier", task.name()))?;

    match clas.kind {
        ClassifierKind::NearestNeighborPy => nearest_neighbour_python(graph, task, clas, done_file),
        _ => generic(graph, task, clas, done_file),
    }
}

/// `nearest_neighbour_python.py [-p] --features .. --done_file .. --model ..
/// --types .. --name .. --output .. <fitres file>`
fn nearest_neighbour_python(
    graph: &TaskGraph,
    task: &Task,
    clas: &ClassifierTask,
    done_file: &Path,
) -> Result<ClassifierInvocation> {
    let features = clas
        .option_str("FEATURES")
        .unwrap_or_else(|| DEFAULT_FEATURES.to_string());
    let fitres = fitres_file(graph, task, clas)?;
    let types = types_ia(graph, task)?;

    let (invocation, model, types) = match clas.mode {
        Mode::Train => {
            if types.is_empty() {
                bail!("No Ia types for a training sim in task '{}'", task.name());
            }
            (
                ClassifierInvocation::new(clas.kind.program()),
                own_model_file(task)?,
                types,
            )
        }
        Mode::Predict => {
            let types = if types.is_empty() { "1".to_string() } else { types };
            let model = input_model(graph, task, clas)?
                .ok_or_else(|| anyhow!("task '{}' is in predict mode but has no model", task.name()))?;
            (ClassifierInvocation::new(clas.kind.program()).flag("-p"), model, types)
        }
    };

    Ok(invocation
        .arg("--features", features)
        .arg("--done_file", done_file.display())
        .arg("--model", model.display())
        .arg("--types", types)
        .arg("--name", &clas.prob_column)
        .arg("--output", predictions_file(task)?.display())
        .positional(fitres.display()))
}

/// `<program> --<mode> --done_file .. --name .. --output .. [--model ..]
/// [--features ..] <input>`
fn generic(
    graph: &TaskGraph,
    task: &Task,
    clas: &ClassifierTask,
    done_file: &Path,
) -> Result<ClassifierInvocation> {
    let mut invocation = ClassifierInvocation::new(clas.kind.program())
        .flag(&format!("--{}", clas.mode))
        .arg("--done_file", done_file.display())
        .arg("--name", &clas.prob_column)
        .arg("--output", predictions_file(task)?.display());

    let model = match clas.mode {
        Mode::Train => Some(own_model_file(task)?),
        Mode::Predict => input_model(graph, task, clas)?,
    };
    if let Some(model) = model {
        invocation = invocation.arg("--model", model.display());
    }

    let requirements = clas.kind.requirements();
    let input = if requirements.needs_fit {
        let features = clas
            .option_str("FEATURES")
            .unwrap_or_else(|| DEFAULT_FEATURES.to_string());
        invocation = invocation.arg("--features", features);
        fitres_file(graph, task, clas)?
    } else {
        sim_folder(graph, task, clas)?
    };

    Ok(invocation.positional(input.display()))
}

fn predictions_file(task: &Task) -> Result<PathBuf> {
    task.output()
        .path(keys::PREDICTIONS_FILENAME)
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("task '{}' has no predictions file", task.name()))
}

fn own_model_file(task: &Task) -> Result<PathBuf> {
    task.output()
        .path(keys::MODEL_FILENAME)
        .map(Path::to_path_buf)
        .ok_or_else(|| anyhow!("training task '{}' has no model file", task.name()))
}

/// Model consumed in predict mode: the trainer's model file or the resolved
/// MODEL path.
fn input_model(graph: &TaskGraph, task: &Task, clas: &ClassifierTask) -> Result<Option<PathBuf>> {
    if let Some(trainer) = clas.model_task {
        let trainer = graph.task(trainer);
        let path = trainer
            .output()
            .path(keys::MODEL_FILENAME)
            .ok_or_else(|| {
                anyhow!(
                    "model task '{}' of '{}' does not produce a model file",
                    trainer.name(),
                    task.name()
                )
            })?;
        return Ok(Some(path.to_path_buf()));
    }
    Ok(clas.model_path.clone())
}

fn fit_dependency<'g>(graph: &'g TaskGraph, task: &Task) -> Option<&'g Task> {
    task.dependencies()
        .iter()
        .map(|id| graph.task(*id))
        .find(|t| t.role() == TaskRole::LightCurveFit)
}

/// Direct sim dependency, or the upstream of the fit dependency.
fn sim_dependency<'g>(graph: &'g TaskGraph, task: &Task) -> Option<&'g Task> {
    let direct = task
        .dependencies()
        .iter()
        .map(|id| graph.task(*id))
        .find(|t| TaskRole::SIM_LIKE.contains(&t.role()));
    direct.or_else(|| match fit_dependency(graph, task)?.kind() {
        TaskKind::LightCurveFit(l) => Some(graph.task(l.sim)),
        _ => None,
    })
}

/// `<fitres_dirs[index]>/<fitopt file>`
fn fitres_file(graph: &TaskGraph, task: &Task, clas: &ClassifierTask) -> Result<PathBuf> {
    let fit = fit_dependency(graph, task)
        .ok_or_else(|| anyhow!("task '{}' has no light curve fit dependency", task.name()))?;
    let fitopt = clas
        .option_str("FITOPT")
        .unwrap_or_else(|| DEFAULT_FITOPT.to_string());
    let file = fit
        .output()
        .map(keys::FITOPT_MAP)
        .and_then(|m| m.get(&fitopt))
        .ok_or_else(|| anyhow!("fit '{}' has no FITOPT '{}'", fit.name(), fitopt))?;
    let dir = fit
        .output()
        .paths(keys::FITRES_DIRS)
        .and_then(|dirs| dirs.get(clas.index))
        .with_context(|| format!("fit '{}' has no replicate {}", fit.name(), clas.index))?;
    Ok(dir.join(file))
}

fn sim_folder(graph: &TaskGraph, task: &Task, clas: &ClassifierTask) -> Result<PathBuf> {
    let sim = sim_dependency(graph, task)
        .ok_or_else(|| anyhow!("task '{}' has no simulation dependency", task.name()))?;
    sim.output()
        .paths(keys::SIM_FOLDERS)
        .and_then(|folders| folders.get(clas.index))
        .cloned()
        .with_context(|| format!("sim '{}' has no replicate {}", sim.name(), clas.index))
}

/// Space-separated Ia type codes of the sim dependency.
fn types_ia(graph: &TaskGraph, task: &Task) -> Result<String> {
    let sim = sim_dependency(graph, task)
        .ok_or_else(|| anyhow!("task '{}' has no simulation dependency", task.name()))?;
    let types = sim.output().ints(keys::TYPES_IA).unwrap_or_default();
    Ok(types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" "))
}
