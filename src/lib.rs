// src/lib.rs

pub mod batch;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod task;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::batch::SlurmBackend;
use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::context::PipelineContext;
use crate::engine::Runner;
use crate::errors::Result;
use crate::fs::RealFileSystem;
use crate::graph::{TaskGraph, build_graph};

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, expands it into the task graph and drives
/// the graph to completion. Returns `Ok(true)` when every task succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_and_validate(&args.config)?;
    let ctx = PipelineContext::new(&cfg, Arc::new(RealFileSystem), args.refresh);
    let graph = build_graph(&cfg, &ctx)?;

    if args.dry_run {
        print_dry_run(&graph);
        return Ok(true);
    }

    let secs = args
        .poll_interval
        .unwrap_or(cfg.global.poll_interval_secs)
        .max(1);
    info!(
        config = %args.config,
        output_dir = ?cfg.global.output_dir,
        refresh = args.refresh,
        "starting pipeline"
    );

    let mut runner = Runner::new(ctx, graph, SlurmBackend::new());
    let summary = runner.run(Duration::from_secs(secs), args.once).await?;

    for (task, reason) in &summary.failed {
        warn!(task = %task, reason = %reason, "task failed");
    }
    Ok(summary.is_success())
}

/// Print every task with its directory and dependencies.
fn print_dry_run(graph: &TaskGraph) {
    println!("pipdag dry-run");
    println!();
    println!("tasks ({}):", graph.len());
    for (id, task) in graph.tasks() {
        println!("  {id} {} ({:?})", task.name(), task.role());
        println!("      output_dir: {}", task.output_dir().display());
        println!("      job: {}", task.job_name());
        if let Some(clas) = task.as_classifier() {
            println!(
                "      classifier: {} {} index={} prob_column={}",
                clas.kind, clas.mode, clas.index, clas.prob_column
            );
        }
        let deps = graph.dependencies(id);
        if !deps.is_empty() {
            let names: Vec<String> = deps
                .iter()
                .map(|d| format!("{d} {}", graph.task(*d).name()))
                .collect();
            println!("      after: {}", names.join(", "));
        }
    }

    debug!("dry-run complete (no submission)");
}
