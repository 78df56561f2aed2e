// src/batch/render.rs

//! Batch script text.
//!
//! A script is a scheduler header, an annotation block and a body that runs
//! the task's command and writes the done file. The whole text is what the
//! hash gate fingerprints.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config::BatchSection;
use crate::fs::FileSystem;

/// Built-in SLURM header. `REPLACE_*` tokens are substituted on render.
pub const DEFAULT_HEADER: &str = "#!/bin/bash
#SBATCH --job-name=REPLACE_NAME
#SBATCH --output=REPLACE_LOGFILE
#SBATCH --time=REPLACE_WALLTIME
#SBATCH --mem=REPLACE_MEM
";

pub const LOG_FILE: &str = "output.log";

/// Scheduler header for one job.
#[derive(Debug, Clone)]
pub struct Header {
    template: String,
    replacements: BTreeMap<String, String>,
    append: Vec<String>,
}

impl Header {
    /// Header from the `[batch]` defaults. `template` replaces the built-in
    /// header when set.
    pub fn new(batch: &BatchSection, job_name: &str, template: Option<String>) -> Self {
        let mut replacements = BTreeMap::new();
        replacements.insert("REPLACE_NAME".to_string(), job_name.to_string());
        replacements.insert("REPLACE_LOGFILE".to_string(), LOG_FILE.to_string());
        replacements.insert("REPLACE_WALLTIME".to_string(), batch.walltime.clone());
        replacements.insert("REPLACE_MEM".to_string(), batch.mem.clone());

        let mut append = vec![
            "#SBATCH --ntasks=1".to_string(),
            format!("#SBATCH --cpus-per-task={}", batch.cpus_per_task),
        ];
        append.extend(batch.extra_directives.iter().cloned());

        Self {
            template: template.unwrap_or_else(|| DEFAULT_HEADER.to_string()),
            replacements,
            append,
        }
    }

    /// Load a header template through `fs`.
    pub fn load_template(fs: &dyn FileSystem, path: &Path) -> Result<String> {
        fs.read_to_string(path)
            .with_context(|| format!("reading batch header template {:?}", path))
    }

    /// Override or add `REPLACE_*` values.
    pub fn with_replacements<I>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.replacements.extend(overrides);
        self
    }

    pub fn render(&self) -> String {
        let mut text = self.template.clone();
        for (token, value) in &self.replacements {
            text = text.replace(token.as_str(), value);
        }
        let mut out = text.trim_end().to_string();
        for line in &self.append {
            out.push('\n');
            out.push_str(line);
        }
        out.push('\n');
        out
    }
}

/// A complete batch script.
#[derive(Debug, Clone)]
pub struct BatchScript {
    header: Header,
    annotations: Vec<String>,
    working_dir: String,
    command: String,
    done_file: String,
}

impl BatchScript {
    pub fn new(header: Header, working_dir: &Path, command: impl Into<String>, done_file: &Path) -> Self {
        Self {
            header,
            annotations: Vec::new(),
            working_dir: working_dir.display().to_string(),
            command: command.into(),
            done_file: done_file.display().to_string(),
        }
    }

    /// Add a `# ...` comment line after the header.
    pub fn annotate(mut self, line: impl Into<String>) -> Self {
        self.annotations.push(line.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = self.header.render();
        for line in &self.annotations {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
        let done = &self.done_file;
        out.push_str(&format!(
            "\ncd {dir}\n{cmd}\n\nif [ $? -ne 0 ]; then\n    echo FAILURE > {done}\nelif [ ! -f {done} ]; then\n    echo SUCCESS > {done}\nfi\n",
            dir = self.working_dir,
            cmd = self.command.trim_end(),
        ));
        out
    }
}

/// Rendered script plus the name the job is submitted under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub job_name: String,
    pub script: String,
}
