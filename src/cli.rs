// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `pipdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pipdag",
    version,
    about = "Expand a pipeline config into batch jobs and drive them to completion.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the pipeline config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Pipeline.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PIPDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Validate and expand the config, print the task graph, submit nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Ignore recorded hashes and regenerate every task.
    #[arg(long, short = 'r')]
    pub refresh: bool,

    /// Do a single submit/poll pass and exit instead of waiting for completion.
    #[arg(long)]
    pub once: bool,

    /// Seconds between polling passes (overrides `[global].poll_interval_secs`).
    #[arg(long, value_name = "SECS")]
    pub poll_interval: Option<u64>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
