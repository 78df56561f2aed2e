// src/logging.rs

//! Log setup for the `pipdag` binary.
//!
//! Gate decisions, submissions and poll results are logged per task with
//! the task name as a `task` field. Scheduler job output never passes
//! through here; each job writes its own `output.log` in the task's output
//! directory.
//!
//! The filter comes from, in order:
//! 1. `--log-level` (applies to every target)
//! 2. `PIPDAG_LOG`, as `EnvFilter` directives (e.g. `pipdag::engine=debug,info`)
//! 3. `info`
//!
//! Logs go to STDERR; `--dry-run` prints the task graph on STDOUT.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "PIPDAG_LOG";

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = resolve_filter(cli_level, env.as_deref());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    Ok(())
}

/// Blank or unparsable `PIPDAG_LOG` values fall back to `info`.
fn resolve_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive(level));
    }
    env.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| EnvFilter::try_new(s).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}
