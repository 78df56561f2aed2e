// src/task/output.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Standard output keys read by downstream stages.
pub mod keys {
    pub const NAME: &str = "name";
    pub const OUTPUT_DIR: &str = "output_dir";
    pub const SIM_FOLDERS: &str = "sim_folders";
    pub const TYPES_IA: &str = "types_ia";
    pub const FITRES_DIRS: &str = "fitres_dirs";
    pub const FITOPT_MAP: &str = "fitopt_map";
    pub const SIM_NAME: &str = "sim_name";
    pub const PROB_COLUMN_NAME: &str = "prob_column_name";
    pub const PREDICTIONS_FILENAME: &str = "predictions_filename";
    pub const MODEL_FILENAME: &str = "model_filename";
    pub const INDEX: &str = "index";
    pub const CLASSIFIER: &str = "classifier";
    pub const MODE: &str = "mode";
    pub const FINGERPRINT: &str = "fingerprint";
}

/// A produced artifact or value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputValue {
    Text(String),
    Path(PathBuf),
    Index(usize),
    Paths(Vec<PathBuf>),
    Ints(Vec<i64>),
    Map(BTreeMap<String, String>),
}

/// Write-once key/value outputs of a task.
#[derive(Debug, Clone, Default)]
pub struct TaskOutput {
    values: BTreeMap<String, OutputValue>,
}

impl TaskOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value. Returns `false` (and leaves the existing value alone)
    /// if the key was already set.
    pub fn try_insert(&mut self, key: &str, value: OutputValue) -> bool {
        if self.values.contains_key(key) {
            return false;
        }
        self.values.insert(key.to_string(), value);
        true
    }

    pub fn get(&self, key: &str) -> Option<&OutputValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            OutputValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn path(&self, key: &str) -> Option<&Path> {
        match self.values.get(key)? {
            OutputValue::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn index(&self, key: &str) -> Option<usize> {
        match self.values.get(key)? {
            OutputValue::Index(i) => Some(*i),
            _ => None,
        }
    }

    pub fn paths(&self, key: &str) -> Option<&[PathBuf]> {
        match self.values.get(key)? {
            OutputValue::Paths(p) => Some(p),
            _ => None,
        }
    }

    pub fn ints(&self, key: &str) -> Option<&[i64]> {
        match self.values.get(key)? {
            OutputValue::Ints(v) => Some(v),
            _ => None,
        }
    }

    pub fn map(&self, key: &str) -> Option<&BTreeMap<String, String>> {
        match self.values.get(key)? {
            OutputValue::Map(m) => Some(m),
            _ => None,
        }
    }
}
