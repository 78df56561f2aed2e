// src/graph/naming.rs

use std::path::{Path, PathBuf};

use crate::types::Stage;

/// Deterministic output-directory naming for every stage.
///
/// Name parts are joined with `_`, so differently split names can produce
/// the same directory (`SNN` on `TEST_A` and `SNN_TEST` on `A`).
/// [`TaskGraph::add_task`](crate::graph::TaskGraph::add_task) rejects such
/// collisions.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.base_dir.join(stage.dir_label())
    }

    pub fn data_prep_dir(&self, name: &str) -> PathBuf {
        self.stage_dir(Stage::DataPrep).join(name)
    }

    pub fn simulation_dir(&self, name: &str) -> PathBuf {
        self.stage_dir(Stage::Simulation).join(name)
    }

    pub fn lcfit_dir(&self, fit_task_name: &str) -> PathBuf {
        self.stage_dir(Stage::LightCurveFit).join(fit_task_name)
    }

    /// `<base>/3_CLAS/<clas>[_<index>][_<sim>][_<fit>][_<extra>]`
    ///
    /// The sim name is only used when there is no fit: fit task names already
    /// embed the name of the simulation they were run on.
    pub fn classifier_dir(
        &self,
        sim_name: Option<&str>,
        fit_name: Option<&str>,
        clas_name: &str,
        index: Option<usize>,
        extra: Option<&str>,
    ) -> PathBuf {
        let mut leaf = clas_name.to_string();
        if let Some(i) = index {
            leaf.push_str(&format!("_{i}"));
        }
        if let (Some(sim), None) = (sim_name, fit_name) {
            leaf.push('_');
            leaf.push_str(sim);
        }
        if let Some(fit) = fit_name {
            leaf.push('_');
            leaf.push_str(fit);
        }
        if let Some(extra) = extra {
            leaf.push('_');
            leaf.push_str(extra);
        }
        self.stage_dir(Stage::Classification).join(leaf)
    }

    /// Name under which a task's job is submitted and later looked up in the
    /// scheduler queue: `<base dir name>__<output dir name>`.
    pub fn job_name(&self, output_dir: &Path) -> String {
        let base = self
            .base_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "pipdag".to_string());
        let leaf = output_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{base}__{leaf}")
    }
}
