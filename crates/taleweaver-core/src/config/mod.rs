use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{compactor, endpoints, models, narrator, paths, retry};
use crate::context::SaveFile;
use crate::engine::{HistoryCompactor, TurnEngine};
use crate::error::TaleError;
use crate::llm::{CompletionOptions, LlmClient, OpenAIClient, RetryPolicy};

/// Every section and every key is optional; anything missing takes its
/// default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,
    pub narrator: NarratorSettings,
    pub compactor: CompactorSettings,
    pub retry: RetrySettings,
    pub game: GameSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub api_key_env: String,
    pub connect_timeout_secs: u64,
    /// Longest silence tolerated from the model before the attempt is
    /// abandoned and retried.
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactorSettings {
    pub enabled: bool,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GameSettings {
    /// Save file location; the platform data directory is used when unset.
    pub save_path: Option<PathBuf>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: endpoints::OPENAI_BASE_URL.to_string(),
            api_key_env: endpoints::DEFAULT_API_KEY_ENV.to_string(),
            connect_timeout_secs: endpoints::CONNECT_TIMEOUT_SECS,
            idle_timeout_secs: endpoints::IDLE_TIMEOUT_SECS,
        }
    }
}

impl Default for NarratorSettings {
    fn default() -> Self {
        Self {
            model: models::DEFAULT_NARRATOR_MODEL.to_string(),
            temperature: narrator::TEMPERATURE,
            max_tokens: narrator::MAX_TOKENS,
            system_prompt: narrator::SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for CompactorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: models::DEFAULT_COMPACTOR_MODEL.to_string(),
            temperature: compactor::TEMPERATURE,
            max_tokens: compactor::MAX_TOKENS,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: retry::MAX_ATTEMPTS,
            delay_secs: retry::DELAY_SECS,
        }
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(paths::CONFIG_DIR)
            .join(paths::CONFIG_FILE)
    }

    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!(
                        path = %config_path.display(),
                        error = %e,
                        "ignoring unparsable config"
                    ),
                },
                Err(e) => tracing::warn!(path = %config_path.display(), error = %e, "cannot read config"),
            }
        }
        Self::default()
    }

    pub fn load() -> Self {
        Self::load_or_init(&Self::config_path())
    }

    /// Load `config_path`, writing the defaults there first if there is no
    /// file yet so the player has one to edit.
    pub fn load_or_init(config_path: &std::path::Path) -> Self {
        if !config_path.exists() {
            let settings = Self::default();
            match settings.save_to(config_path) {
                Ok(()) => tracing::info!(path = %config_path.display(), "wrote default config"),
                Err(e) => tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "cannot write default config"
                ),
            }
            return settings;
        }
        Self::load_from(config_path)
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), TaleError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| TaleError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    /// Get the API key from the environment variable specified in settings.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env).ok()
    }

    pub fn narrator_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.narrator.model.clone(),
            temperature: self.narrator.temperature,
            max_tokens: self.narrator.max_tokens,
        }
    }

    pub fn compactor_options(&self) -> CompletionOptions {
        CompletionOptions {
            model: self.compactor.model.clone(),
            temperature: self.compactor.temperature,
            max_tokens: self.compactor.max_tokens,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.delay_secs),
        )
    }

    pub fn save_file(&self) -> Result<SaveFile, TaleError> {
        match &self.game.save_path {
            Some(path) => Ok(SaveFile::with_path(path.clone())),
            None => SaveFile::new(),
        }
    }

    /// Build the HTTP client shared by both model roles.
    pub fn build_client(&self) -> Result<Arc<dyn LlmClient>, TaleError> {
        let api_key = self.api_key().ok_or_else(|| {
            TaleError::Config(format!(
                "API key not found: set the {} environment variable",
                self.llm.api_key_env
            ))
        })?;

        let client = OpenAIClient::new(api_key)
            .with_base_url(&self.llm.base_url)
            .with_timeouts(
                Duration::from_secs(self.llm.connect_timeout_secs),
                Duration::from_secs(self.llm.idle_timeout_secs),
            )?;
        Ok(Arc::new(client))
    }

    /// Wire the narrator and compactor roles onto `client`.
    pub fn build_engine(&self, client: Arc<dyn LlmClient>) -> TurnEngine {
        let engine = TurnEngine::new(client.clone())
            .with_options(self.narrator_options())
            .with_system_prompt(&self.narrator.system_prompt)
            .with_retry(self.retry_policy());

        if self.compactor.enabled {
            engine.with_compactor(
                HistoryCompactor::new(client, &self.compactor.model)
                    .with_options(self.compactor_options())
                    .with_retry(self.retry_policy()),
            )
        } else {
            engine
        }
    }
}
