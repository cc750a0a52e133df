use std::path::Path;

use crate::config::Config;
use crate::domains::message::Message;
use crate::domains::reminder::Reminder;
use crate::domains::user::User;
use crate::error::Result;
use crate::factories::bot_factory::ReminderBotFactory;
use crate::services::conversation::ConversationService;

pub struct ReminderBot {
    conversation: ConversationService,
}

impl ReminderBot {
    pub fn new(conversation: ConversationService) -> Self {
        Self { conversation }
    }

    pub async fn from_config(config: Config) -> Result<Self> {
        let conversation = ReminderBotFactory::create_from_config(config).await?;
        Ok(Self { conversation })
    }

    pub async fn from_config_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::from_file(path)?.resolve_env();
        Self::from_config(config).await
    }

    /// Runs one turn and returns the assistant's reply text, if any.
    pub async fn handle_message(&self, user: &User, text: &str) -> Result<Option<String>> {
        let reply = self.conversation.handle_message(user, text).await?;
        Ok(reply.and_then(|message| message.content().map(str::to_string)))
    }

    pub async fn get_user_history(&self, user_id: &str) -> Result<Vec<Message>> {
        self.conversation.store().load_messages(user_id).await
    }

    pub async fn delete_user_history(&self, user_id: &str) -> Result<()> {
        self.conversation.store().clear_history(user_id).await
    }

    pub async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.conversation.store().list_reminders(user_id).await
    }

    pub fn conversation(&self) -> &ConversationService {
        &self.conversation
    }
}
