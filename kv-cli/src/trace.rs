//! Logging setup: human-readable lines on stderr, full detail rolled daily
//! into `<dir>/kvcli.log.*`. Returns a guard that must be held for the
//! lifetime of the process — dropping it stops the background flush of
//! the non-blocking file writer.

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

const MAX_LOG_FILES: usize = 10;

pub fn init_logging(dir: &str, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;
    let rolling = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("kvcli.log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(rolling);

    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file_writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
