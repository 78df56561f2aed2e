use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use pipdag::batch::{BatchBackend, JobSubmission};
use pipdag::fs::FileSystem;
use pipdag::fs::mock::MockFileSystem;

/// A fake batch scheduler backed by a [`MockFileSystem`].
///
/// - records every submission
/// - by default "runs" each job immediately by writing `SUCCESS` to its
///   done file
/// - jobs whose name contains a registered failing pattern write `FAILURE`
/// - jobs whose name contains a registered rejecting pattern fail to submit
/// - with `hold_jobs`, submitted jobs stay in the queue until
///   [`FakeBatchBackend::finish`] or [`FakeBatchBackend::vanish`]
#[derive(Clone, Default)]
pub struct FakeBatchBackend {
    fs: MockFileSystem,
    submitted: Arc<Mutex<Vec<JobSubmission>>>,
    queue: Arc<Mutex<Vec<JobSubmission>>>,
    failing: Vec<String>,
    rejecting: Vec<String>,
    hold_jobs: bool,
    queue_unavailable: bool,
}

impl FakeBatchBackend {
    pub fn new(fs: &MockFileSystem) -> Self {
        Self {
            fs: fs.clone(),
            ..Self::default()
        }
    }

    pub fn failing(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    pub fn rejecting(mut self, pattern: &str) -> Self {
        self.rejecting.push(pattern.to_string());
        self
    }

    pub fn hold_jobs(mut self) -> Self {
        self.hold_jobs = true;
        self
    }

    pub fn set_queue_unavailable(&mut self, unavailable: bool) {
        self.queue_unavailable = unavailable;
    }

    /// Pretend a job is already queued, e.g. from an earlier orchestrator run.
    pub fn enqueue(&self, job: JobSubmission) {
        self.queue.lock().unwrap().push(job);
    }

    pub fn submitted(&self) -> Vec<JobSubmission> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submitted_names(&self) -> Vec<String> {
        self.submitted().into_iter().map(|j| j.job_name).collect()
    }

    /// Complete queued jobs whose name contains `pattern`.
    pub fn finish(&self, pattern: &str, success: bool) {
        let mut queue = self.queue.lock().unwrap();
        queue.retain(|job| {
            if job.job_name.contains(pattern) {
                write_marker(&self.fs, job, success);
                false
            } else {
                true
            }
        });
    }

    /// Drop queued jobs whose name contains `pattern` without a done file.
    pub fn vanish(&self, pattern: &str) {
        self.queue
            .lock()
            .unwrap()
            .retain(|job| !job.job_name.contains(pattern));
    }
}

fn write_marker(fs: &MockFileSystem, job: &JobSubmission, success: bool) {
    let contents = if success { "SUCCESS\n" } else { "FAILURE\n" };
    fs.write(&job.done_file, contents.as_bytes())
        .expect("mock fs write never fails");
}

impl BatchBackend for FakeBatchBackend {
    fn submit(
        &mut self,
        job: &JobSubmission,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let job = job.clone();
        Box::pin(async move {
            if self.rejecting.iter().any(|p| job.job_name.contains(p)) {
                return Err(anyhow!("sbatch: rejected job {}", job.job_name));
            }

            self.submitted.lock().unwrap().push(job.clone());

            if self.hold_jobs {
                self.queue.lock().unwrap().push(job);
            } else {
                let success = !self.failing.iter().any(|p| job.job_name.contains(p));
                write_marker(&self.fs, &job, success);
            }
            Ok(())
        })
    }

    fn active_jobs(&mut self) -> Pin<Box<dyn Future<Output = Option<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            if self.queue_unavailable {
                return None;
            }
            Some(
                self.queue
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|j| j.job_name.clone())
                    .collect(),
            )
        })
    }
}
