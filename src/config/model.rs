// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::classifier::ClassifierSpec;
use crate::types::MaskMatching;

/// Configuration exactly as read from TOML.
///
/// ```toml
/// [global]
/// output_dir = "/scratch/pipeline"
///
/// [[simulation]]
/// name = "TEST_A"
/// cmd = "sim_script {output_dir}"
/// replicates = 3
///
/// [[lcfit]]
/// name = "FIT"
/// cmd = "fit_script {sim_folders}"
///
/// [[classification]]
/// name = "NN"
/// classifier = "NearestNeighborPyClassifier"
/// mode = "train"
/// mask_sim = "TEST"
///
/// [classification.opts]
/// FEATURES = "x1 c zHD"
/// ```
///
/// Stage entries are arrays of tables so their order in the file is kept;
/// classification entries may only refer back to earlier ones.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub global: GlobalSection,

    #[serde(default)]
    pub batch: BatchSection,

    #[serde(default)]
    pub data_prep: Vec<DataPrepConfig>,

    #[serde(default)]
    pub simulation: Vec<SimulationConfig>,

    #[serde(default)]
    pub lcfit: Vec<LcfitConfig>,

    #[serde(default)]
    pub classification: Vec<ClassificationConfig>,
}

/// Validated configuration. Only obtainable through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub global: GlobalSection,
    pub batch: BatchSection,
    pub data_prep: Vec<DataPrepConfig>,
    pub simulation: Vec<SimulationConfig>,
    pub lcfit: Vec<LcfitConfig>,
    /// Typed classifier entries, in configuration order.
    pub classification: Vec<ClassifierSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile, classification: Vec<ClassifierSpec>) -> Self {
        Self {
            global: raw.global,
            batch: raw.batch,
            data_prep: raw.data_prep,
            simulation: raw.simulation,
            lcfit: raw.lcfit,
            classification,
        }
    }
}

/// `[global]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct GlobalSection {
    /// Root under which every stage directory (`1_SIM`, `3_CLAS`, ...) lives.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub mask_matching: MaskMatching,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Base for relative MODEL paths; falls back to `output_dir`.
    #[serde(default)]
    pub model_root: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("pipdag_output")
}

fn default_poll_interval_secs() -> u64 {
    30
}

impl Default for GlobalSection {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            mask_matching: MaskMatching::default(),
            poll_interval_secs: default_poll_interval_secs(),
            model_root: None,
        }
    }
}

/// `[batch]` section: defaults for the rendered scheduler header.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSection {
    /// Optional header template replacing the built-in SLURM header.
    #[serde(default)]
    pub header_file: Option<PathBuf>,

    #[serde(default = "default_walltime")]
    pub walltime: String,

    #[serde(default = "default_mem")]
    pub mem: String,

    #[serde(default = "default_cpus_per_task")]
    pub cpus_per_task: u32,

    /// Extra header lines appended verbatim.
    #[serde(default)]
    pub extra_directives: Vec<String>,
}

fn default_walltime() -> String {
    "00:55:00".to_string()
}

fn default_mem() -> String {
    "8GB".to_string()
}

fn default_cpus_per_task() -> u32 {
    4
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            header_file: None,
            walltime: default_walltime(),
            mem: default_mem(),
            cpus_per_task: default_cpus_per_task(),
            extra_directives: Vec::new(),
        }
    }
}

/// `[[data_prep]]`: an existing (real) dataset. Always one replicate.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPrepConfig {
    pub name: String,
    pub cmd: String,
    pub raw_dir: PathBuf,
    #[serde(default)]
    pub types_ia: Vec<i64>,
}

/// `[[simulation]]`.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    pub name: String,
    pub cmd: String,
    /// Number of random-seed replicates (RANSEED_CHANGE).
    #[serde(default = "default_replicates")]
    pub replicates: usize,
    #[serde(default)]
    pub types_ia: Vec<i64>,
}

fn default_replicates() -> usize {
    1
}

/// `[[lcfit]]`: fans out into one fit task per matching upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct LcfitConfig {
    pub name: String,
    pub cmd: String,
    /// Substring filter over data-prep / simulation names.
    #[serde(default)]
    pub mask: String,
    /// Fit option label -> FITRES file name inside each output folder.
    #[serde(default)]
    pub fitopts: BTreeMap<String, String>,
}

impl LcfitConfig {
    /// `fitopts` with the `DEFAULT` label always present.
    pub fn effective_fitopts(&self) -> BTreeMap<String, String> {
        let mut map = self.fitopts.clone();
        map.entry("DEFAULT".to_string())
            .or_insert_with(|| "FITOPT000.FITRES.gz".to_string());
        map
    }
}

/// `[[classification]]` as written in the file.
///
/// `mode` stays optional here so that a missing value is reported as a
/// configuration error naming the entry, not a bare TOML error.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassificationConfig {
    pub name: String,
    pub classifier: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub mask: String,
    #[serde(default)]
    pub mask_sim: String,
    #[serde(default)]
    pub mask_fit: String,
    #[serde(default)]
    pub opts: BTreeMap<String, toml::Value>,
}
