//! Native messaging host for the Precis browser extension.
//!
//! The browser starts one process per connection and talks to it over
//! stdin/stdout; logs therefore go to a file, never to stdout.
use anyhow::{Context, Result};
use clap::Parser;
use precis_actors::settings::{ModelDefaults, SettingsStore};
use precis_common::observability::init_logging;
use precis_config::{PrecisConfig, PrecisConfigLoader};
use precis_runtime::HostRuntime;
use std::path::PathBuf;
use std::time::Duration;

mod bridge;
mod host;
mod protocol;
mod wire;

#[derive(Debug, Parser)]
#[command(name = "precis-host", version, about = "Precis native messaging host")]
struct Cli {
    /// YAML configuration file. Defaults to `<config dir>/precis/precis.yaml` when present.
    #[arg(long, env = "PRECIS_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite URL for user settings, overriding `storage.settings_url`.
    #[arg(long)]
    settings_url: Option<String>,

    /// Use a multi-threaded runtime with this many workers.
    #[arg(long)]
    workers: Option<usize>,

    /// Caller origin and window arguments appended by the browser.
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    browser_args: Vec<String>,
}

fn load_config(cli: &Cli) -> Result<PrecisConfig> {
    let loader = PrecisConfigLoader::new();
    let loader = match &cli.config {
        Some(path) => loader.with_file(path),
        None => match dirs::config_dir() {
            Some(dir) => loader.with_optional_file(dir.join("precis").join("precis.yaml")),
            None => loader,
        },
    };
    loader.load().context("failed to load configuration")
}

async fn run(cfg: PrecisConfig, settings_url: String) -> Result<()> {
    let models = ModelDefaults {
        model: cfg.gemini.model.clone(),
        fact_check_model: cfg.gemini.fact_check_model.clone(),
    };
    let settings = SettingsStore::connect(&settings_url, models).await?;
    if let Some(key) = cfg.gemini.api_key() {
        settings
            .seed_api_key(key)
            .await
            .context("failed to seed API key")?;
    }

    host::Host::build(&cfg, settings)?
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = load_config(&cli)?;
    let log_path = init_logging(cfg.logging.to_log_config("precis-host"))?;
    tracing::info!(
        log = %log_path.display(),
        caller = ?cli.browser_args.first(),
        version = ?cfg.version,
        "host.starting"
    );

    let settings_url = cli
        .settings_url
        .clone()
        .unwrap_or_else(|| cfg.storage.settings_url.clone());
    let runtime = HostRuntime::build("precis-host", cli.workers)?;
    let result = runtime.block_on(run(cfg, settings_url));
    if let Err(e) = &result {
        tracing::error!(error = ?e, "host.failed");
    }
    runtime.shutdown(Duration::from_secs(1));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn browser_arguments_are_accepted() {
        let cli = Cli::try_parse_from([
            "precis-host",
            "chrome-extension://abcdef/",
            "--parent-window=0",
        ])
        .unwrap();
        assert_eq!(
            cli.browser_args,
            ["chrome-extension://abcdef/", "--parent-window=0"]
        );
        assert!(cli.config.is_none());
    }

    #[test]
    fn flags_come_before_browser_arguments() {
        let cli = Cli::try_parse_from([
            "precis-host",
            "--settings-url",
            "sqlite::memory:",
            "--workers",
            "2",
        ])
        .unwrap();
        assert_eq!(cli.settings_url.as_deref(), Some("sqlite::memory:"));
        assert_eq!(cli.workers, Some(2));
        assert!(cli.browser_args.is_empty());
    }
}
