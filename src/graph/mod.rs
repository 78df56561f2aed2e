// src/graph/mod.rs

//! Task graph construction.
//!
//! - [`index`] holds the append-only [`TaskGraph`] and its lookups.
//! - [`naming`] maps stage parameters to output directories.
//! - [`upstream`] builds data-prep, simulation and light-curve-fit tasks.
//!
//! Classifier tasks are appended last by
//! [`crate::classifier::ClassifierExpander`].

pub mod index;
pub mod naming;
pub mod upstream;

use tracing::info;

use crate::classifier::ClassifierExpander;
use crate::config::ConfigFile;
use crate::context::PipelineContext;
use crate::errors::Result;

pub use index::TaskGraph;
pub use naming::OutputLayout;

/// Build the complete task graph for a validated configuration.
///
/// Any [`crate::errors::PipdagError::Config`] raised here aborts the run
/// before a single job is submitted.
pub fn build_graph(cfg: &ConfigFile, ctx: &PipelineContext) -> Result<TaskGraph> {
    let mut graph = TaskGraph::new();
    upstream::add_upstream_tasks(cfg, ctx, &mut graph)?;

    let expander = ClassifierExpander::new(ctx);
    expander.expand_all(&cfg.classification, &mut graph)?;

    info!(tasks = graph.len(), "task graph built");
    Ok(graph)
}
