// src/batch/mod.rs

//! Batch scheduler plumbing.
//!
//! - [`render`] builds the script text a job is submitted with.
//! - [`backend`] submits scripts and queries the queue.

pub mod backend;
pub mod render;

pub use backend::{BatchBackend, JobSubmission, SlurmBackend};
pub use render::{BatchScript, Header, Submission};
