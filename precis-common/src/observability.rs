//! Logging setup for the host binary and integration tests.
//!
//! The host speaks native messaging on stdout, so nothing but protocol frames
//! may ever be written there. Events go to a daily rolling file and are only
//! mirrored to `stderr` when asked.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{anyhow, Context};
use chrono::Local;
use serde::Deserialize;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Keeps the writer thread alive and remembers where logs went.
static INSTALLED: OnceLock<(WorkerGuard, PathBuf)> = OnceLock::new();

const LOG_DIR_ENV: &str = "PRECIS_LOG_DIR";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn layer<W>(self, writer: W, ansi: bool) -> BoxedLayer
    where
        W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        match self {
            LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
            LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Prefix of the log file name and of the fallback directory.
    pub app_name: String,
    /// Explicit log directory. Otherwise `PRECIS_LOG_DIR`, then the
    /// platform's local data directory.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "precis".to_string(),
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global `tracing` subscriber and return today's log file.
///
/// Only the first call installs anything; later calls return the path
/// resolved back then.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some((_, path)) = INSTALLED.get() {
        return Ok(path.clone());
    }

    let dir = log_dir(&config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    let (writer, guard, path) = daily_file(&dir, &config.app_name);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let mut layers = vec![config.format.layer(writer, false)];
    if config.emit_stderr {
        layers.push(config.format.layer(std::io::stderr, true));
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow!("tracing setup failed: {e}"))?;

    let _ = INSTALLED.set((guard, path.clone()));
    Ok(path)
}

/// `tracing_appender` names daily files `<prefix>.<yyyy-mm-dd>`.
fn daily_file(dir: &Path, app_name: &str) -> (NonBlocking, WorkerGuard, PathBuf) {
    let prefix = format!("{app_name}.log");
    let path = dir.join(format!("{prefix}.{}", Local::now().format("%Y-%m-%d")));
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, &prefix));
    (writer, guard, path)
}

fn log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    let configured = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(LOG_DIR_ENV).map(PathBuf::from));
    match configured {
        Some(dir) => expand_home(&dir),
        None => dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(app_name)
            .join("logs"),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = log_dir("precis", Some(Path::new("/var/log/precis")));
        assert_eq!(dir, PathBuf::from("/var/log/precis"));
    }

    #[test]
    fn tilde_is_the_home_dir() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_home(Path::new("~/logs")), home.join("logs"));
        assert_eq!(expand_home(Path::new("/tmp/~x")), PathBuf::from("/tmp/~x"));
    }

    #[test]
    fn daily_file_is_dated() {
        let dir = std::env::temp_dir();
        let (_writer, _guard, path) = daily_file(&dir, "precis-test");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("precis-test.log.20"), "{name}");
    }

    #[test]
    fn log_format_reads_lowercase() {
        let f: LogFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(f, LogFormat::Json);
    }
}
