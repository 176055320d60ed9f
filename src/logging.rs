use anyhow::{Context, Result, anyhow};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// Where logs go when `--log-file` is not given. The terminal is in raw mode while
// the app runs, so logs never go to stderr.
pub fn default_log_path(bin: &str) -> Option<PathBuf> {
    let base = std::env::var_os("XDG_STATE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .filter(|v| !v.is_empty())
                .map(|h| PathBuf::from(h).join(".local").join("state"))
        })?;
    Some(base.join("media_fx").join(format!("{bin}.log")))
}

pub fn parse_level(level: &str) -> Result<LevelFilter> {
    level
        .trim()
        .parse::<LevelFilter>()
        .map_err(|_| anyhow!("invalid log level '{level}' (use off, error, warn, info, debug, trace)"))
}

/// Install the global subscriber writing to `path`. `RUST_LOG` overrides `level`.
/// Returns the file actually used, or `None` when logging stays off.
pub fn init(level: &str, path: Option<&Path>, bin: &str) -> Result<Option<PathBuf>> {
    let level = parse_level(level)?;
    let Some(path) = path.map(Path::to_path_buf).or_else(|| default_log_path(bin)) else {
        return Ok(None);
    };
    if level == LevelFilter::OFF && std::env::var_os("RUST_LOG").is_none() {
        return Ok(None);
    }

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("create log directory {}", dir.display()))?;
    }
    let file = File::create(&path).with_context(|| format!("create log file {}", path.display()))?;

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let file_layer = fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("install log subscriber: {e}"))?;

    tracing::info!(bin, level = %level, path = %path.display(), "logging initialized");
    Ok(Some(path))
}
