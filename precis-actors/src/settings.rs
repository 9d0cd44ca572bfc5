//! SQLite-backed user settings.
//!
//! One row per key in `settings(key, value, updated_at)`, values stored as
//! JSON text. Rows are created on first write and never expire; a key with
//! no row reads as its default. Only the orchestrator writes here.
use anyhow::Context as _;
use chrono::Utc;
use precis_common::{PrecisError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub const MAX_TEXT_SIZE_INDEX: u8 = 4;
pub const DEFAULT_TEXT_SIZE_INDEX: u8 = 2;
pub const DEFAULT_SPEECH_SPEED: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    GeminiApiKey,
    GeminiModel,
    GeminiFactCheckModel,
    TextSizeIndex,
    Theme,
    SpeechVoiceUri,
    SpeechSpeed,
}

impl SettingKey {
    pub const ALL: [SettingKey; 7] = [
        SettingKey::GeminiApiKey,
        SettingKey::GeminiModel,
        SettingKey::GeminiFactCheckModel,
        SettingKey::TextSizeIndex,
        SettingKey::Theme,
        SettingKey::SpeechVoiceUri,
        SettingKey::SpeechSpeed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::GeminiApiKey => "geminiApiKey",
            SettingKey::GeminiModel => "geminiModel",
            SettingKey::GeminiFactCheckModel => "geminiFactCheckModel",
            SettingKey::TextSizeIndex => "textSizeIndex",
            SettingKey::Theme => "theme",
            SettingKey::SpeechVoiceUri => "speechVoiceURI",
            SettingKey::SpeechSpeed => "speechSpeed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    System,
    Light,
    Dark,
}

/// Model names used when the user has not picked any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefaults {
    pub model: String,
    pub fact_check_model: String,
}

/// Fully resolved settings as the UI sees them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_fact_check_model: String,
    pub text_size_index: u8,
    pub theme: Theme,
    #[serde(rename = "speechVoiceURI")]
    pub speech_voice_uri: Option<String>,
    pub speech_speed: f64,
}

impl Settings {
    pub fn defaults(models: &ModelDefaults) -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: models.model.clone(),
            gemini_fact_check_model: models.fact_check_model.clone(),
            text_size_index: DEFAULT_TEXT_SIZE_INDEX,
            theme: Theme::System,
            speech_voice_uri: None,
            speech_speed: DEFAULT_SPEECH_SPEED,
        }
    }
}

/// Partial update from the UI. Absent fields are left alone; a blank API
/// key, model or voice removes the stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_fact_check_model: Option<String>,
    pub text_size_index: Option<u8>,
    pub theme: Option<Theme>,
    #[serde(rename = "speechVoiceURI")]
    pub speech_voice_uri: Option<String>,
    pub speech_speed: Option<f64>,
}

enum Write {
    Set(SettingKey, Value),
    Remove(SettingKey),
}

impl SettingsPatch {
    fn into_writes(self) -> Result<Vec<Write>> {
        let mut writes = Vec::new();
        let text = |key: SettingKey, v: Option<String>, writes: &mut Vec<Write>| {
            if let Some(v) = v {
                let trimmed = v.trim();
                writes.push(if trimmed.is_empty() {
                    Write::Remove(key)
                } else {
                    Write::Set(key, Value::String(trimmed.to_string()))
                });
            }
        };
        text(SettingKey::GeminiApiKey, self.gemini_api_key, &mut writes);
        text(SettingKey::GeminiModel, self.gemini_model, &mut writes);
        text(
            SettingKey::GeminiFactCheckModel,
            self.gemini_fact_check_model,
            &mut writes,
        );
        text(SettingKey::SpeechVoiceUri, self.speech_voice_uri, &mut writes);

        if let Some(index) = self.text_size_index {
            if index > MAX_TEXT_SIZE_INDEX {
                return Err(PrecisError::Configuration(format!(
                    "Text size must be between 0 and {MAX_TEXT_SIZE_INDEX}."
                )));
            }
            writes.push(Write::Set(SettingKey::TextSizeIndex, Value::from(index)));
        }
        if let Some(theme) = self.theme {
            let v = serde_json::to_value(theme)
                .map_err(|e| PrecisError::Configuration(e.to_string()))?;
            writes.push(Write::Set(SettingKey::Theme, v));
        }
        if let Some(speed) = self.speech_speed {
            if !speed.is_finite() || speed <= 0.0 {
                return Err(PrecisError::Configuration(
                    "Speech speed must be a positive number.".to_string(),
                ));
            }
            writes.push(Write::Set(SettingKey::SpeechSpeed, Value::from(speed)));
        }
        Ok(writes)
    }
}

fn storage_err(e: sqlx::Error) -> PrecisError {
    PrecisError::Storage(e.to_string())
}

#[derive(Clone)]
pub struct SettingsStore {
    pool: SqlitePool,
    models: ModelDefaults,
}

impl SettingsStore {
    /// Open (creating if needed) the database at `url` and ensure the schema.
    pub async fn connect(url: &str, models: ModelDefaults) -> anyhow::Result<Self> {
        let opts = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid settings database url: {url}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(opts)
            .await
            .with_context(|| format!("failed to open settings database: {url}"))?;
        Self::with_pool(pool, models).await
    }

    /// Private in-memory database; one connection so every query sees it.
    pub async fn in_memory(models: ModelDefaults) -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool, models).await
    }

    async fn with_pool(pool: SqlitePool, models: ModelDefaults) -> anyhow::Result<Self> {
        let store = Self { pool, models };
        store.migrate().await.context("settings schema")?;
        Ok(store)
    }

    async fn migrate(&self) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
              key        TEXT PRIMARY KEY,
              value      TEXT NOT NULL,
              updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub fn models(&self) -> &ModelDefaults {
        &self.models
    }

    pub async fn get(&self, key: SettingKey) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        let Some(row) = row else { return Ok(None) };
        let raw: String = row.try_get("value").map_err(storage_err)?;
        Ok(decode_value(key, &raw))
    }

    pub async fn set(&self, key: SettingKey, value: &Value) -> Result<()> {
        let encoded = serde_json::to_string(value)
            .map_err(|e| PrecisError::Storage(e.to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
              value = excluded.value,
              updated_at = excluded.updated_at
            "#,
        )
        .bind(key.as_str())
        .bind(encoded)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        tracing::debug!(key = key.as_str(), "settings.set");
        Ok(())
    }

    pub async fn remove(&self, key: SettingKey) -> Result<()> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(key.as_str())
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        tracing::debug!(key = key.as_str(), "settings.removed");
        Ok(())
    }

    /// Every key resolved against its default.
    pub async fn load(&self) -> Result<Settings> {
        let rows = sqlx::query("SELECT key, value FROM settings")
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let mut settings = Settings::defaults(&self.models);
        for row in rows {
            let name: String = row.try_get("key").map_err(storage_err)?;
            let raw: String = row.try_get("value").map_err(storage_err)?;
            let Some(key) = SettingKey::parse(&name) else {
                tracing::debug!(key = %name, "settings.unknown_key");
                continue;
            };
            let Some(value) = decode_value(key, &raw) else { continue };
            apply_value(&mut settings, key, value);
        }
        Ok(settings)
    }

    /// Validate and persist a patch, returning the resulting settings.
    /// Nothing is written if any field is invalid.
    pub async fn apply(&self, patch: SettingsPatch) -> Result<Settings> {
        let writes = patch.into_writes()?;
        let mut tx = self.pool.begin().await.map_err(storage_err)?;
        let now = Utc::now().to_rfc3339();
        for write in &writes {
            match write {
                Write::Set(key, value) => {
                    sqlx::query(
                        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
                         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    )
                    .bind(key.as_str())
                    .bind(value.to_string())
                    .bind(now.as_str())
                    .execute(&mut *tx)
                    .await
                    .map_err(storage_err)?;
                }
                Write::Remove(key) => {
                    sqlx::query("DELETE FROM settings WHERE key = ?")
                        .bind(key.as_str())
                        .execute(&mut *tx)
                        .await
                        .map_err(storage_err)?;
                }
            }
        }
        tx.commit().await.map_err(storage_err)?;
        tracing::info!(changes = writes.len(), "settings.updated");
        self.load().await
    }

    pub async fn api_key(&self) -> Result<Option<String>> {
        Ok(self
            .get(SettingKey::GeminiApiKey)
            .await?
            .and_then(|v| v.as_str().map(str::trim).map(str::to_string))
            .filter(|k| !k.is_empty()))
    }

    /// Store `key` only when no API key has been saved yet.
    pub async fn seed_api_key(&self, key: &str) -> Result<bool> {
        let key = key.trim();
        if key.is_empty() || self.api_key().await?.is_some() {
            return Ok(false);
        }
        self.set(SettingKey::GeminiApiKey, &Value::String(key.to_string()))
            .await?;
        tracing::info!("settings.api_key_seeded");
        Ok(true)
    }
}

fn decode_value(key: SettingKey, raw: &str) -> Option<Value> {
    match serde_json::from_str(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "settings.undecodable_value");
            None
        }
    }
}

fn apply_value(settings: &mut Settings, key: SettingKey, value: Value) {
    let as_text = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    match key {
        SettingKey::GeminiApiKey => settings.gemini_api_key = as_text(&value),
        SettingKey::GeminiModel => {
            if let Some(m) = as_text(&value) {
                settings.gemini_model = m;
            }
        }
        SettingKey::GeminiFactCheckModel => {
            if let Some(m) = as_text(&value) {
                settings.gemini_fact_check_model = m;
            }
        }
        SettingKey::TextSizeIndex => {
            if let Some(i) = value
                .as_u64()
                .filter(|i| *i <= u64::from(MAX_TEXT_SIZE_INDEX))
            {
                settings.text_size_index = i as u8;
            }
        }
        SettingKey::Theme => {
            if let Ok(theme) = serde_json::from_value(value) {
                settings.theme = theme;
            }
        }
        SettingKey::SpeechVoiceUri => settings.speech_voice_uri = as_text(&value),
        SettingKey::SpeechSpeed => {
            if let Some(s) = value.as_f64().filter(|s| s.is_finite() && *s > 0.0) {
                settings.speech_speed = s;
            }
        }
    }
}
