//! Loader for host configuration with YAML + environment overlays.
//!
//! Every section is optional; a missing file or key falls back to the
//! defaults below. Environment variables prefixed with `PRECIS__` override file
//! values (`PRECIS__GEMINI__MODEL=gemini-flash-latest`), and `${VAR}`
//! placeholders inside string values are expanded after merging.
//!
//! ```yaml
//! version: "1"
//! gemini:
//!   model: gemini-flash-lite-latest
//!   fact_check_model: gemini-flash-latest
//!   api_key: "${GEMINI_API_KEY}"
//! delivery:
//!   attempts: 10
//!   interval_ms: 100
//! storage:
//!   settings_url: "sqlite://precis-settings.db"
//! logging:
//!   format: json
//! ```
use config::{Config, ConfigError, Environment, File, FileFormat};
use precis_common::observability::{LogConfig, LogFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_EXPANSION_ROUNDS: usize = 8;

pub use precis_llm::DEFAULT_GEMINI_ENDPOINT;
pub const DEFAULT_MODEL: &str = "gemini-flash-lite-latest";
pub const DEFAULT_FACT_CHECK_MODEL: &str = "gemini-flash-latest";
pub const DEFAULT_GEMINI_WEB_URL: &str =
    "https://aistudio.google.com/prompts/new_chat?model=gemini-2.5-pro";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrecisConfig {
    pub version: Option<String>,
    pub gemini: GeminiConfig,
    pub delivery: DeliveryConfig,
    pub orchestrator: OrchestratorConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    pub bridge: BridgeConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub endpoint: String,
    pub model: String,
    pub fact_check_model: String,
    /// Seed for the persisted API key; only used when none is stored yet.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    /// Page opened by the "deep search" flow.
    pub web_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_GEMINI_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            fact_check_model: DEFAULT_FACT_CHECK_MODEL.to_string(),
            api_key: None,
            timeout_secs: 60,
            web_url: DEFAULT_GEMINI_WEB_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    /// The seed key, ignoring blanks and placeholders left unexpanded.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && !k.contains("${"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Bounded retry used when pushing messages to a UI surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub attempts: u32,
    pub interval_ms: u64,
    /// Cap on one attempt; a UI that never answers must not stall the queue
    /// for the full bridge command timeout.
    pub attempt_timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval_ms: 100,
            attempt_timeout_ms: 500,
        }
    }
}

impl DeliveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Let fact-checks consult web search instead of the article alone.
    pub fact_check_web_search: bool,
    pub mailbox: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fact_check_web_search: true,
            mailbox: 256,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub settings_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            settings_url: "sqlite://precis-settings.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
    pub dir: Option<PathBuf>,
    pub stderr: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".to_string(),
            dir: None,
            stderr: false,
        }
    }
}

impl LoggingConfig {
    pub fn to_log_config(&self, app_name: &str) -> LogConfig {
        LogConfig {
            app_name: app_name.to_string(),
            log_dir: self.dir.clone(),
            emit_stderr: self.stderr,
            format: self.format,
            default_filter: self.filter.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a host command waits for the browser shim to answer.
    pub command_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 5_000,
        }
    }
}

impl BridgeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Expand `$VAR`/`${VAR}` in every string, following values that expand to
/// further placeholders a bounded number of times. Unknown variables are left
/// as written.
fn expand_placeholders(value: &mut Value) {
    match value {
        Value::String(text) if text.contains('$') => {
            let mut rounds = 0;
            while rounds < MAX_EXPANSION_ROUNDS {
                let Ok(next) = shellexpand::env(text.as_str()) else {
                    break;
                };
                if next == text.as_str() {
                    break;
                }
                *text = next.into_owned();
                rounds += 1;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(expand_placeholders),
        Value::Object(fields) => fields.values_mut().for_each(expand_placeholders),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct PrecisConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PrecisConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PrecisConfigLoader {
    /// Start empty; `PRECIS__` env overrides are layered on last in [`Self::load`].
    ///
    /// ```
    /// use precis_config::PrecisConfigLoader;
    ///
    /// let config = PrecisConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.delivery.attempts, 10);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Like [`Self::with_file`] but silently skipped when the file is absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// ```
    /// use precis_config::PrecisConfigLoader;
    ///
    /// unsafe { std::env::set_var("DOCTEST_GEMINI_KEY", "injected-from-env"); }
    ///
    /// let config = PrecisConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// gemini:
    ///   model: "gemini-test"
    ///   api_key: "${DOCTEST_GEMINI_KEY}"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.gemini.model, "gemini-test");
    /// assert_eq!(config.gemini.api_key(), Some("injected-from-env"));
    ///
    /// unsafe { std::env::remove_var("DOCTEST_GEMINI_KEY"); }
    /// ```
    pub fn load(self) -> Result<PrecisConfig, ConfigError> {
        // Environment values stay strings here; typing happens per field below,
        // so an all-digit API key is not turned into a number.
        let merged = self
            .builder
            .add_source(Environment::with_prefix("PRECIS").separator("__"))
            .build()?;

        let mut tree: Value = merged.try_deserialize()?;
        expand_placeholders(&mut tree);
        Config::builder()
            .add_source(File::from_str(&tree.to_string(), FileFormat::Json))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn placeholders_expand_anywhere_in_the_tree() {
        temp_env::with_vars(
            [("PRECIS_T_HOST", Some("llm.local")), ("PRECIS_T_PORT", Some("8443"))],
            || {
                let mut v = json!({
                    "gemini": {"endpoint": "https://${PRECIS_T_HOST}:$PRECIS_T_PORT/v1beta"},
                    "extra": ["$PRECIS_T_HOST", 3, null]
                });
                expand_placeholders(&mut v);
                assert_eq!(
                    v,
                    json!({
                        "gemini": {"endpoint": "https://llm.local:8443/v1beta"},
                        "extra": ["llm.local", 3, null]
                    })
                );
            },
        );
    }

    #[test]
    fn nested_placeholders_resolve() {
        temp_env::with_vars(
            [("PRECIS_T_KEY", Some("${PRECIS_T_INNER}")), ("PRECIS_T_INNER", Some("k-9"))],
            || {
                let mut v = json!("${PRECIS_T_KEY}");
                expand_placeholders(&mut v);
                assert_eq!(v, json!("k-9"));
            },
        );
    }

    #[test]
    fn self_referencing_placeholders_terminate() {
        temp_env::with_vars(
            [("PRECIS_T_A", Some("${PRECIS_T_B}")), ("PRECIS_T_B", Some("${PRECIS_T_A}"))],
            || {
                let mut v = json!("${PRECIS_T_A}");
                expand_placeholders(&mut v);
                assert!(v.as_str().unwrap().starts_with("${PRECIS_T_"));
            },
        );
    }

    #[test]
    fn unknown_variables_stay_verbatim() {
        temp_env::with_vars([("PRECIS_T_MISSING", None::<&str>)], || {
            let mut v = json!("${PRECIS_T_MISSING}");
            expand_placeholders(&mut v);
            assert_eq!(v, json!("${PRECIS_T_MISSING}"));
        });
    }

    #[test]
    fn unexpanded_api_key_counts_as_missing() {
        let cfg = GeminiConfig {
            api_key: Some("${DOES_NOT_EXIST}".into()),
            ..GeminiConfig::default()
        };
        assert_eq!(cfg.api_key(), None);

        let blank = GeminiConfig {
            api_key: Some("   ".into()),
            ..GeminiConfig::default()
        };
        assert_eq!(blank.api_key(), None);
    }
}
