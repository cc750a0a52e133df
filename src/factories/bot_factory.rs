use std::sync::Arc;

use crate::config::Config;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::providers::{ConversationStore, EventLogger, LlmProvider};
use crate::providers::event_log::TracingEventLogger;
use crate::providers::memory::InMemoryConversationStore;
use crate::providers::openai::OpenAiProvider;
use crate::providers::retry::RetryPolicy;
use crate::providers::sqlite::SqliteConversationStore;
use crate::services::conversation::ConversationService;

pub struct ReminderBotFactory;

impl ReminderBotFactory {
    pub async fn create_from_config(config: Config) -> Result<ConversationService> {
        let llm_provider = Self::create_llm_provider(&config)?;
        let store = Self::create_store(&config).await?;
        let event_logger: Arc<dyn EventLogger> = Arc::new(TracingEventLogger::new());
        Ok(ConversationService::new(llm_provider, store, event_logger))
    }

    pub fn create_llm_provider(config: &Config) -> Result<Arc<dyn LlmProvider>> {
        let openai = config
            .openai
            .as_ref()
            .ok_or_else(|| ReminderBotError::Config("Missing openai configuration".to_string()))?;

        let api_key = openai
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty());
        // Keyless access is only allowed against an explicitly configured endpoint.
        let api_key = match (api_key, openai.base_url.as_deref()) {
            (Some(key), _) => key.to_string(),
            (None, Some(_)) => String::new(),
            (None, None) => {
                return Err(ReminderBotError::Config(
                    "Missing openai api_key (set REMINDER_BOT_API_KEY or DEEPSEEK_API_KEY)"
                        .to_string(),
                ))
            }
        };

        let provider = OpenAiProvider::new(api_key, openai.model.clone(), openai.base_url.clone())
            .with_retry_policy(RetryPolicy::from_config(&config.completion()));
        tracing::info!(model = provider.model(), "llm provider configured");
        Ok(Arc::new(provider))
    }

    pub async fn create_store(config: &Config) -> Result<Arc<dyn ConversationStore>> {
        match &config.storage {
            Some(storage) => {
                let path = storage.sqlite_path();
                tracing::info!(path = %path, "using sqlite conversation store");
                Ok(Arc::new(SqliteConversationStore::new(path).await?))
            }
            None => {
                tracing::info!("using in-memory conversation store");
                Ok(Arc::new(InMemoryConversationStore::new()))
            }
        }
    }
}
