// src/batch/backend.rs

//! Pluggable batch scheduler abstraction.
//!
//! The runner submits jobs and queries the queue through a `BatchBackend`,
//! so tests can swap in a fake scheduler while production talks to SLURM.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Everything a backend needs to submit one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    pub job_name: String,
    pub script_path: PathBuf,
    pub working_dir: PathBuf,
    /// Where the job writes its completion marker.
    pub done_file: PathBuf,
}

/// Trait abstracting the external batch scheduler.
pub trait BatchBackend: Send {
    /// Hand a job to the scheduler. Returns once the scheduler accepted it.
    fn submit(
        &mut self,
        job: &JobSubmission,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Names of all queued or running jobs, or `None` if the scheduler could
    /// not be queried.
    fn active_jobs(&mut self) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + '_>>;
}

/// SLURM backend: `sbatch` to submit, `squeue` to list jobs.
#[derive(Debug, Clone)]
pub struct SlurmBackend {
    user: Option<String>,
}

impl SlurmBackend {
    /// Queue queries are restricted to `$USER` when it is set.
    pub fn new() -> Self {
        Self {
            user: std::env::var("USER").ok().filter(|u| !u.is_empty()),
        }
    }
}

impl Default for SlurmBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchBackend for SlurmBackend {
    fn submit(
        &mut self,
        job: &JobSubmission,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let job = job.clone();
        Box::pin(async move {
            info!(job = %job.job_name, script = ?job.script_path, "submitting batch job");
            let output = Command::new("sbatch")
                .arg(&job.script_path)
                .current_dir(&job.working_dir)
                .stdin(Stdio::null())
                .output()
                .await
                .with_context(|| format!("spawning sbatch for job '{}'", job.job_name))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                bail!(
                    "sbatch exited with {} for job '{}': {}",
                    output.status,
                    job.job_name,
                    stderr.trim()
                );
            }
            debug!(
                job = %job.job_name,
                stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                "sbatch accepted job"
            );
            Ok(())
        })
    }

    fn active_jobs(&mut self) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + '_>> {
        let user = self.user.clone();
        Box::pin(async move {
            let mut cmd = Command::new("squeue");
            cmd.args(["-h", "-o", "%j"]).stdin(Stdio::null());
            if let Some(user) = &user {
                cmd.arg("-u").arg(user);
            }

            match cmd.output().await {
                Ok(output) if output.status.success() => {
                    let jobs: Vec<String> = String::from_utf8_lossy(&output.stdout)
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect();
                    debug!(count = jobs.len(), "queried scheduler queue");
                    Some(jobs)
                }
                Ok(output) => {
                    warn!(
                        status = %output.status,
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "squeue failed; treating queue state as unknown"
                    );
                    None
                }
                Err(e) => {
                    warn!(error = %e, "could not run squeue; treating queue state as unknown");
                    None
                }
            }
        })
    }
}
