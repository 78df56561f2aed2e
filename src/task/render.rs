// src/task/render.rs

//! Turn a task into the batch script it is submitted with.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::batch::{BatchScript, Header, Submission};
use crate::classifier::classifier_invocation;
use crate::context::PipelineContext;
use crate::graph::TaskGraph;
use crate::task::output::keys;
use crate::task::{ClassifierTask, Task, TaskId, TaskKind};

/// Render the script for task `id`.
///
/// The result only depends on the task's own configuration and its
/// upstream outputs, so identical inputs always give identical text.
pub fn render_submission(ctx: &PipelineContext, graph: &TaskGraph, id: TaskId) -> Result<Submission> {
    let task = graph.task(id);
    let done_file = task.gate().done_file();

    let (command, annotations, template, replacements) = match task.kind() {
        TaskKind::DataPrep(d) => (
            substitute(&d.cmd, task, &own_sim_folders(task), &done_file),
            vec![format!("TASK: {}", task.name())],
            None,
            Vec::new(),
        ),
        TaskKind::Simulation(s) => (
            substitute(&s.cmd, task, &own_sim_folders(task), &done_file),
            vec![
                format!("TASK: {}", task.name()),
                format!("REPLICATES: {}", s.replicates),
            ],
            None,
            Vec::new(),
        ),
        TaskKind::LightCurveFit(l) => {
            let folders = own_sim_folders(graph.task(l.sim));
            let fitopts = task
                .output()
                .map(keys::FITOPT_MAP)
                .map(format_pairs)
                .unwrap_or_default();
            (
                substitute(&l.cmd, task, &folders, &done_file),
                vec![format!("TASK: {}", task.name()), format!("FITOPTS: {fitopts}")],
                None,
                Vec::new(),
            )
        }
        TaskKind::Classifier(c) => {
            let invocation = classifier_invocation(graph, id, &done_file)?;
            (
                invocation.to_string(),
                vec![
                    format!("TASK: {} ({} {})", c.unique_name, c.kind, c.mode),
                    format!("INDEX: {}", c.index),
                    format!("OPTS: {}", format_options(&c.options)),
                ],
                c.option_str("BATCH_FILE").map(PathBuf::from),
                batch_replace(c)?,
            )
        }
    };

    let template_path = template.or_else(|| ctx.batch.header_file.clone());
    let template = match template_path {
        Some(path) => Some(Header::load_template(ctx.fs.as_ref(), &path)?),
        None => None,
    };

    let header = Header::new(&ctx.batch, task.job_name(), template).with_replacements(replacements);
    let script = annotations
        .into_iter()
        .fold(
            BatchScript::new(header, task.output_dir(), command, &done_file),
            |script, line| script.annotate(line),
        )
        .render();

    Ok(Submission {
        job_name: task.job_name().to_string(),
        script,
    })
}

fn own_sim_folders(task: &Task) -> Vec<PathBuf> {
    task.output()
        .paths(keys::SIM_FOLDERS)
        .map(<[PathBuf]>::to_vec)
        .unwrap_or_default()
}

/// Fill `{output_dir}`, `{done_file}`, `{name}` and `{sim_folders}`.
fn substitute(cmd: &str, task: &Task, sim_folders: &[PathBuf], done_file: &Path) -> String {
    let folders = sim_folders
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" ");
    cmd.replace("{output_dir}", &task.output_dir().display().to_string())
        .replace("{done_file}", &done_file.display().to_string())
        .replace("{name}", task.name())
        .replace("{sim_folders}", &folders)
}

/// `k=v` pairs in key order. Every option takes part, so any change to an
/// option changes the script and its fingerprint.
fn format_options(options: &BTreeMap<String, toml::Value>) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_pairs(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// `BATCH_REPLACE` table as `REPLACE_*` overrides.
fn batch_replace(clas: &ClassifierTask) -> Result<Vec<(String, String)>> {
    match clas.options.get("BATCH_REPLACE") {
        None => Ok(Vec::new()),
        Some(toml::Value::Table(table)) => Ok(table
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()),
        Some(other) => Err(anyhow!("BATCH_REPLACE must be a table, got {other}")),
    }
}
