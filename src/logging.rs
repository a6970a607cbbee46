use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where log lines go for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget<'a> {
    /// Preview owns the terminal, so only a file (or nothing) is safe.
    FileOnly(Option<&'a Path>),
    /// Headless runs log to stderr, and to a file as well when one is given.
    Stderr(Option<&'a Path>),
}

/// `RUST_LOG` wins over `level` when set.
pub fn filter_for(level: &str) -> EnvFilter {
    let default = level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

pub fn init(level: &str, target: LogTarget<'_>) -> Result<()> {
    let (to_stderr, file_path) = match target {
        LogTarget::FileOnly(path) => (false, path),
        LogTarget::Stderr(path) => (true, path),
    };

    let console_layer = to_stderr.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter_for(level))
    });

    let file_layer = match file_path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_filter(filter_for(level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    tracing::debug!(level, "logging initialized");
    Ok(())
}
