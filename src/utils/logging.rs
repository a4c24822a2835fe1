use std::{path::PathBuf, sync::LazyLock};

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const LOG_PREFIX: &str = "toggl2tempo";

const MAX_LOG_FILES: usize = 5;
const DEFAULT_LEVEL: &str = "debug";

/// Where and how much to log. Built from the global CLI flags.
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub logs_dir: PathBuf,
    /// Overrides `RUST_LOG`.
    pub level: Option<LevelFilter>,
    /// Mirrors records into stderr. Stdout is left to the worklog table.
    pub console: bool,
}

/// Logs go into daily rotated `toggl2tempo.*.log` files under [LoggingOptions::logs_dir].
pub fn enable_logging(options: LoggingOptions) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(&options.logs_dir)?;

    let console = options.console;
    let stderr = std::io::stderr.with_filter(move |_| console);

    let directives = log_directives(options.level, std::env::var("RUST_LOG").ok());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&directives)?)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stderr.and(appender))
        .pretty()
        .try_init()
        .map_err(|e| anyhow!("Can't initialize logging: {e}"))
}

/// The crate logs at the requested level. HTTP client records are limited to warnings unless
/// tracing everything, they repeat what the API clients already log.
fn log_directives(level: Option<LevelFilter>, env_level: Option<String>) -> String {
    let level = level
        .map(|v| v.to_string().to_lowercase())
        .or(env_level)
        .unwrap_or_else(|| DEFAULT_LEVEL.into());
    let http_level = if level == "trace" { "debug" } else { "warn" };

    format!(
        "{}={level},reqwest={http_level}",
        env!("CARGO_PKG_NAME").replace('-', "_")
    )
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .try_init();
});
