// src/engine/mod.rs

//! Orchestration engine for pipdag.
//!
//! The [`runner`] repeatedly:
//! - queries the batch scheduler for active jobs,
//! - gates and submits tasks whose dependencies all succeeded,
//! - polls running tasks for their done file,
//! - propagates failures to every downstream task.

pub mod runner;

pub use runner::{RunSummary, Runner};
