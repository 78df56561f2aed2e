// src/graph/upstream.rs

//! Data-prep, simulation and light-curve-fit tasks.
//!
//! These stages have no combinatorics beyond "one fit per matching
//! upstream", so they are built directly from configuration.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{ConfigFile, DataPrepConfig, LcfitConfig, SimulationConfig};
use crate::context::PipelineContext;
use crate::errors::{PipdagError, Result};
use crate::graph::TaskGraph;
use crate::task::output::keys;
use crate::task::{
    DataPrepTask, LcfitTask, OutputValue, SimulationTask, Task, TaskId, TaskKind, TaskRole,
};

/// Append every upstream task in stage order: data prep, simulations, fits.
pub fn add_upstream_tasks(
    cfg: &ConfigFile,
    ctx: &PipelineContext,
    graph: &mut TaskGraph,
) -> Result<()> {
    for entry in &cfg.data_prep {
        add_data_prep(entry, ctx, graph)?;
    }
    for entry in &cfg.simulation {
        add_simulation(entry, ctx, graph)?;
    }
    for entry in &cfg.lcfit {
        add_lcfit(entry, ctx, graph)?;
    }
    Ok(())
}

pub fn add_data_prep(
    entry: &DataPrepConfig,
    ctx: &PipelineContext,
    graph: &mut TaskGraph,
) -> Result<TaskId> {
    let output_dir = ctx.layout.data_prep_dir(&entry.name);
    let kind = TaskKind::DataPrep(DataPrepTask {
        cmd: entry.cmd.clone(),
        raw_dir: entry.raw_dir.clone(),
    });
    let mut task = Task::new(
        &entry.name,
        kind,
        output_dir.clone(),
        Vec::new(),
        1,
        ctx.layout.job_name(&output_dir),
    );
    task.set_output(keys::SIM_FOLDERS, OutputValue::Paths(vec![entry.raw_dir.clone()]))?;
    task.set_output(keys::TYPES_IA, OutputValue::Ints(entry.types_ia.clone()))?;

    debug!(task = %entry.name, "built data prep task");
    graph.add_task(task)
}

pub fn add_simulation(
    entry: &SimulationConfig,
    ctx: &PipelineContext,
    graph: &mut TaskGraph,
) -> Result<TaskId> {
    let output_dir = ctx.layout.simulation_dir(&entry.name);
    let sim_folders = replicate_folders(&output_dir, &entry.name, entry.replicates);
    let kind = TaskKind::Simulation(SimulationTask {
        cmd: entry.cmd.clone(),
        replicates: entry.replicates,
    });
    let mut task = Task::new(
        &entry.name,
        kind,
        output_dir.clone(),
        Vec::new(),
        entry.replicates,
        ctx.layout.job_name(&output_dir),
    );
    task.set_output(keys::SIM_FOLDERS, OutputValue::Paths(sim_folders))?;
    task.set_output(keys::TYPES_IA, OutputValue::Ints(entry.types_ia.clone()))?;

    debug!(task = %entry.name, replicates = entry.replicates, "built simulation task");
    graph.add_task(task)
}

/// One fit task per data-prep / simulation task whose name contains `mask`.
pub fn add_lcfit(
    entry: &LcfitConfig,
    ctx: &PipelineContext,
    graph: &mut TaskGraph,
) -> Result<Vec<TaskId>> {
    let upstream: Vec<TaskId> = graph
        .of_roles(TaskRole::SIM_LIKE)
        .into_iter()
        .filter(|id| graph.task(*id).name().contains(&entry.mask))
        .collect();

    if upstream.is_empty() {
        return Err(PipdagError::config(
            &entry.name,
            format!("mask '{}' matched no data prep or simulation", entry.mask),
        ));
    }

    let fitopts = entry.effective_fitopts();
    let mut built = Vec::with_capacity(upstream.len());

    for sim_id in upstream {
        let sim = graph.task(sim_id);
        let sim_name = sim.name().to_string();
        let sim_folders = sim.output().paths(keys::SIM_FOLDERS).unwrap_or_default();

        let name = format!("{}_{}", entry.name, sim_name);
        let output_dir = ctx.layout.lcfit_dir(&name);
        let fitres_dirs: Vec<PathBuf> = sim_folders
            .iter()
            .map(|folder| {
                let leaf = folder.file_name().unwrap_or(folder.as_os_str());
                output_dir.join("output").join(leaf)
            })
            .collect();

        let kind = TaskKind::LightCurveFit(LcfitTask {
            cmd: entry.cmd.clone(),
            fit_name: entry.name.clone(),
            sim: sim_id,
        });
        let mut task = Task::new(
            &name,
            kind,
            output_dir.clone(),
            vec![sim_id],
            fitres_dirs.len(),
            ctx.layout.job_name(&output_dir),
        );
        task.set_output(keys::FITRES_DIRS, OutputValue::Paths(fitres_dirs))?;
        task.set_output(keys::FITOPT_MAP, OutputValue::Map(fitopts.clone()))?;
        task.set_output(keys::SIM_NAME, OutputValue::Text(sim_name.clone()))?;

        info!(task = %name, sim = %sim_name, "built light curve fit task");
        built.push(graph.add_task(task)?);
    }

    Ok(built)
}

/// `<output_dir>/<name>-0001`, `<name>-0002`, ...
fn replicate_folders(output_dir: &Path, name: &str, replicates: usize) -> Vec<PathBuf> {
    (1..=replicates)
        .map(|i| output_dir.join(format!("{name}-{i:04}")))
        .collect()
}
