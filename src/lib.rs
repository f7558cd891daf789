pub mod cache;
pub mod config;
pub mod cooldown;
pub mod engine;
pub mod error;
pub mod geometry;
pub mod patterns;
pub mod rotation;
pub mod rules;
pub mod sim;
pub mod spatial;
pub mod world;

pub use config::{AppConfig, EngineConfig, Settings};
pub use engine::{Engine, EngineSnapshot, Forced, TickOutcome};
pub use rules::{AttackRule, RuleSet};
pub use world::{Actions, World};

use anyhow::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;

/// Installs the global tracing subscriber: a daily rolling file under
/// `log_dir` written through a non-blocking worker, filtered by `RUST_LOG`
/// with this crate at `debug` by default. Also routes panics through
/// `tracing::error!` so they end up in the log file.
///
/// Keep the returned guard alive for the lifetime of the process; dropping it
/// flushes and stops the writer.
pub fn init_logging(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "autoattack.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tilestrike_lib=debug".parse()?),
        )
        .with_writer(non_blocking)
        .with_ansi(false) // log files should not contain ANSI colour codes
        .try_init()
        .map_err(|e| anyhow::anyhow!("Logging init error: {}", e))?;

    std::panic::set_hook(Box::new(|info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());
        let message = if let Some(s) = info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        tracing::error!("PANIC at {}: {}", location, message);
    }));

    tracing::info!("Logging to {}", log_dir.display());
    Ok(guard)
}
