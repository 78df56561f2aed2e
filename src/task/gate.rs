// src/task/gate.rs

//! Hash-gated re-execution.
//!
//! Every task records the fingerprint of the job it last submitted in
//! `<output_dir>/hash.txt`, and the job itself writes `<output_dir>/done.txt`
//! when it finishes. Comparing a freshly rendered fingerprint with the
//! recorded one tells the runner whether the task must be regenerated.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::fs::FileSystem;

pub const HASH_FILE: &str = "hash.txt";
pub const DONE_FILE: &str = "done.txt";
pub const SCRIPT_FILE: &str = "job.slurm";

/// Fingerprint of a rendered job script plus the fingerprints of the tasks
/// it depends on.
///
/// Dependency fingerprints are sorted before hashing, so their order does
/// not matter; a regenerated upstream still changes the result.
pub fn compute_fingerprint<I, S>(script: &str, dependency_fingerprints: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut deps: Vec<String> = dependency_fingerprints
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    deps.sort();

    let mut hasher = Hasher::new();
    hasher.update(script.as_bytes());
    for dep in deps {
        hasher.update(b"\n");
        hasher.update(dep.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Outcome of comparing a fresh fingerprint with the recorded one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Recorded fingerprint matches and the previous job succeeded.
    Skip,
    /// Recorded fingerprint matches, no done file yet, and the job may still
    /// be in the queue: poll it instead of submitting again.
    Resume,
    /// Wipe the output directory and submit.
    Run,
}

/// Contents of a done file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionMarker {
    Success,
    Failure(String),
}

impl CompletionMarker {
    /// Any occurrence of `FAILURE` (case-insensitive) marks a failed job.
    pub fn parse(contents: &str) -> Self {
        if contents.to_uppercase().contains("FAILURE") {
            CompletionMarker::Failure(contents.trim().to_string())
        } else {
            CompletionMarker::Success
        }
    }
}

/// Result of polling a running task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Pending,
    Success,
    Failure(String),
    /// Not in the scheduler queue and no done file.
    Vanished,
}

/// Whether `job_name` appears in a scheduler queue snapshot.
///
/// Names must match exactly: `out__SNN_S` is not active just because
/// `out__SNN_S2` is queued. `None` means the queue could not be queried.
pub fn job_is_active(job_name: &str, active_jobs: Option<&[String]>) -> Option<bool> {
    active_jobs.map(|jobs| jobs.iter().any(|j| j == job_name))
}

/// Per-task view of the hash marker and done file.
#[derive(Debug, Clone)]
pub struct HashGate {
    output_dir: PathBuf,
}

impl HashGate {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn hash_file(&self) -> PathBuf {
        self.output_dir.join(HASH_FILE)
    }

    pub fn done_file(&self) -> PathBuf {
        self.output_dir.join(DONE_FILE)
    }

    pub fn script_file(&self) -> PathBuf {
        self.output_dir.join(SCRIPT_FILE)
    }

    /// Fingerprint recorded by the last successful submission, if any.
    pub fn persisted(&self, fs: &dyn FileSystem) -> Result<Option<String>> {
        let path = self.hash_file();
        if !fs.is_file(&path) {
            return Ok(None);
        }
        let contents = fs
            .read_to_string(&path)
            .with_context(|| format!("reading hash file {:?}", path))?;
        let hash = contents.trim();
        Ok((!hash.is_empty()).then(|| hash.to_string()))
    }

    pub fn marker(&self, fs: &dyn FileSystem) -> Result<Option<CompletionMarker>> {
        let path = self.done_file();
        if !fs.is_file(&path) {
            return Ok(None);
        }
        let contents = fs
            .read_to_string(&path)
            .with_context(|| format!("reading done file {:?}", path))?;
        Ok(Some(CompletionMarker::parse(&contents)))
    }

    /// Decide whether the task has to be (re)submitted.
    ///
    /// `job_active` is the queue lookup for this task's job name (`None`
    /// when the scheduler could not be queried).
    pub fn decide(
        &self,
        fs: &dyn FileSystem,
        fingerprint: &str,
        force_refresh: bool,
        job_active: Option<bool>,
    ) -> Result<GateDecision> {
        if force_refresh {
            debug!(dir = ?self.output_dir, "force refresh requested");
            return Ok(GateDecision::Run);
        }

        let old = match self.persisted(fs)? {
            Some(old) => old,
            None => {
                debug!(dir = ?self.output_dir, "no recorded hash");
                return Ok(GateDecision::Run);
            }
        };

        if old != fingerprint {
            debug!(dir = ?self.output_dir, old = %old, new = %fingerprint, "hash changed");
            return Ok(GateDecision::Run);
        }

        let decision = match self.marker(fs)? {
            Some(CompletionMarker::Success) => GateDecision::Skip,
            Some(CompletionMarker::Failure(_)) => GateDecision::Run,
            None => match job_active {
                Some(false) => GateDecision::Run,
                Some(true) | None => GateDecision::Resume,
            },
        };
        debug!(dir = ?self.output_dir, ?decision, "hash unchanged");
        Ok(decision)
    }

    /// Remove the output directory completely and recreate it empty.
    ///
    /// The returned handle is the only way to write the job script and
    /// record the new fingerprint, so nothing is written into a directory
    /// that still holds stale artifacts.
    pub fn prepare_output_dir<'a>(&'a self, fs: &'a dyn FileSystem) -> Result<FreshOutputDir<'a>> {
        fs.remove_dir_all(&self.output_dir)
            .with_context(|| format!("clearing output dir {:?}", self.output_dir))?;
        fs.create_dir_all(&self.output_dir)
            .with_context(|| format!("creating output dir {:?}", self.output_dir))?;
        debug!(dir = ?self.output_dir, "output dir wiped");
        Ok(FreshOutputDir { gate: self, fs })
    }

    /// Check a running task: done file first, then the queue snapshot.
    pub fn poll(
        &self,
        fs: &dyn FileSystem,
        job_name: &str,
        active_jobs: Option<&[String]>,
    ) -> Result<PollOutcome> {
        if let Some(marker) = self.marker(fs)? {
            debug!(done_file = ?self.done_file(), "found done file");
            return Ok(match marker {
                CompletionMarker::Success => PollOutcome::Success,
                CompletionMarker::Failure(contents) => PollOutcome::Failure(contents),
            });
        }

        match job_is_active(job_name, active_jobs) {
            Some(true) | None => Ok(PollOutcome::Pending),
            // The snapshot is taken before the done file is read, so a job
            // that finished in between has already left its marker.
            Some(false) => Ok(PollOutcome::Vanished),
        }
    }
}

/// A freshly wiped output directory, see [`HashGate::prepare_output_dir`].
pub struct FreshOutputDir<'a> {
    gate: &'a HashGate,
    fs: &'a dyn FileSystem,
}

impl FreshOutputDir<'_> {
    /// Write the job script and return its path.
    pub fn write_script(&self, script: &str) -> Result<PathBuf> {
        let path = self.gate.script_file();
        self.fs
            .write(&path, script.as_bytes())
            .with_context(|| format!("writing job script {:?}", path))?;
        Ok(path)
    }

    /// Record the fingerprint. Call only once the job has been submitted.
    pub fn commit(self, fingerprint: &str) -> Result<()> {
        let path = self.gate.hash_file();
        self.fs
            .write(&path, fingerprint.as_bytes())
            .with_context(|| format!("writing hash file {:?}", path))?;
        info!(hash = %fingerprint, dir = ?self.gate.output_dir, "stored task hash");
        Ok(())
    }
}
