use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domains::message::Message;
use crate::domains::reminder::Reminder;
use crate::error::Result;
use crate::interfaces::providers::ConversationStore;

/// Process-local store, used when no SQLite path is configured and in tests.
#[derive(Default)]
pub struct InMemoryConversationStore {
    messages: RwLock<HashMap<String, Vec<Message>>>,
    reminders: RwLock<HashMap<String, Vec<Reminder>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        let guard = self.messages.read().await;
        Ok(guard.get(user_id).cloned().unwrap_or_default())
    }

    async fn save_messages(&self, batch: &[Message]) -> Result<()> {
        let mut guard = self.messages.write().await;
        for message in batch {
            guard
                .entry(message.user_id.clone())
                .or_default()
                .push(message.clone());
        }
        Ok(())
    }

    async fn save_reminder(&self, reminder: Option<&Reminder>) -> Result<()> {
        if let Some(reminder) = reminder {
            let mut guard = self.reminders.write().await;
            guard
                .entry(reminder.user_id.clone())
                .or_default()
                .push(reminder.clone());
        }
        Ok(())
    }

    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        let guard = self.reminders.read().await;
        let mut reminders = guard.get(user_id).cloned().unwrap_or_default();
        reminders.sort_by_key(|reminder| reminder.reminder_at);
        Ok(reminders)
    }

    async fn clear_history(&self, user_id: &str) -> Result<()> {
        let mut guard = self.messages.write().await;
        guard.remove(user_id);
        Ok(())
    }
}
