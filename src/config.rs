use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReminderBotError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_SQLITE_PATH: &str = "./data/reminder-bot.db";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
    pub sqlite_path: Option<String>,
}

impl StorageConfig {
    pub fn sqlite_path(&self) -> String {
        self.sqlite_path
            .as_deref()
            .map(str::trim)
            .filter(|path| !path.is_empty())
            .unwrap_or(DEFAULT_SQLITE_PATH)
            .to_string()
    }
}

/// Bounds applied to every chat-completion call.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CompletionConfig {
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
}

impl CompletionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1))
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(
            self.initial_backoff_ms
                .unwrap_or(DEFAULT_INITIAL_BACKOFF_MS),
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    pub openai: Option<OpenAiConfig>,
    pub storage: Option<StorageConfig>,
    pub completion: Option<CompletionConfig>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ReminderBotError::Config(e.to_string()))?;
        let config: Config =
            serde_json::from_str(&content).map_err(|e| ReminderBotError::Config(e.to_string()))?;
        Ok(config)
    }

    /// Builds a config purely from `REMINDER_BOT_*` environment variables.
    pub fn from_env() -> Self {
        let openai = OpenAiConfig {
            api_key: api_key_from_env(),
            model: non_empty_var("REMINDER_BOT_MODEL"),
            base_url: non_empty_var("REMINDER_BOT_BASE_URL"),
        };
        let storage = non_empty_var("REMINDER_BOT_DB").map(|path| StorageConfig {
            sqlite_path: Some(path),
        });
        Config {
            openai: Some(openai),
            storage,
            completion: None,
        }
    }

    /// Fills a missing api key from the environment.
    pub fn resolve_env(mut self) -> Self {
        let openai = self.openai.get_or_insert_with(OpenAiConfig::default);
        if openai.api_key.is_none() {
            openai.api_key = api_key_from_env();
        }
        self
    }

    pub fn completion(&self) -> CompletionConfig {
        self.completion.clone().unwrap_or_default()
    }
}

fn api_key_from_env() -> Option<String> {
    non_empty_var("REMINDER_BOT_API_KEY").or_else(|| non_empty_var("DEEPSEEK_API_KEY"))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
