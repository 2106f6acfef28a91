use std::path::PathBuf;

use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

use crate::config::{ConfigPaths, LoggingConfig};

/// Logs to a rotated file; warnings are mirrored to stderr. Keep the
/// returned handle alive until exit so buffered lines are flushed.
pub fn init_logging(
    config: &LoggingConfig,
    paths: &ConfigPaths,
    debug: bool,
) -> anyhow::Result<LoggerHandle> {
    let log_path = config
        .path
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(|| paths.logs_dir.join("atl.log"));
    let directory = log_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or(paths.logs_dir.clone());
    let basename = log_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("atl")
        .to_string();
    std::fs::create_dir_all(&directory)?;
    let level = if debug { "debug" } else { config.level.as_str() };
    let handle = Logger::try_with_env_or_str(level)?
        .log_to_file(FileSpec::default().directory(directory).basename(basename))
        .duplicate_to_stderr(if debug { Duplicate::Debug } else { Duplicate::Warn })
        .rotate(
            Criterion::Size(config.rotate_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.rotate_keep),
        )
        .start()?;
    Ok(handle)
}
