// src/context.rs

//! Explicit pipeline context passed to every component.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::{Captures, Regex};

use crate::config::{BatchSection, ConfigFile, GlobalSection};
use crate::fs::FileSystem;
use crate::graph::OutputLayout;

/// Shared, read-only handles for one orchestrator run.
///
/// Built once in [`crate::run`] (or by tests) and borrowed by the expander,
/// the hash gate, the batch renderer and the runner.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub global: GlobalSection,
    pub batch: BatchSection,
    pub fs: Arc<dyn FileSystem>,
    pub layout: OutputLayout,
    /// Regenerate every task regardless of recorded hashes.
    pub force_refresh: bool,
}

impl PipelineContext {
    pub fn new(cfg: &ConfigFile, fs: Arc<dyn FileSystem>, force_refresh: bool) -> Self {
        Self {
            global: cfg.global.clone(),
            batch: cfg.batch.clone(),
            fs,
            layout: OutputLayout::new(cfg.global.output_dir.clone()),
            force_refresh,
        }
    }

    /// Resolve a MODEL path: `$VAR` / `${VAR}` are expanded from the
    /// environment, relative paths are taken from `model_root` (or the output
    /// directory).
    pub fn resolve_model_path(&self, raw: &str) -> PathBuf {
        let expanded = expand_env_vars(raw);
        let path = Path::new(&expanded);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.global
                .model_root
                .as_deref()
                .unwrap_or(&self.global.output_dir)
                .join(path)
        }
    }
}

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid env var pattern")
});

/// Unset variables expand to the empty string.
fn expand_env_vars(raw: &str) -> String {
    ENV_VAR.replace_all(raw, |caps: &Captures| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        std::env::var(name).unwrap_or_default()
    })
    .into_owned()
}
