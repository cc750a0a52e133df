#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use reminder_bot::domains::message::{Message, ToolCall};
use reminder_bot::domains::reminder::Reminder;
use reminder_bot::error::{ReminderBotError, Result};
use reminder_bot::interfaces::providers::{
    Completion, ConversationStore, EventLogger, LlmProvider, PromptEntry,
};
use reminder_bot::providers::memory::InMemoryConversationStore;
use reminder_bot::services::conversation::ConversationService;

/// Replays queued completions and records every prompt it was given.
pub struct QueueLlmProvider {
    queue: Mutex<VecDeque<Result<Completion>>>,
    pub prompts: Mutex<Vec<Vec<PromptEntry>>>,
    pub tools: Mutex<Vec<Vec<Value>>>,
}

impl QueueLlmProvider {
    pub fn new(queue: Vec<Result<Completion>>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::from(queue)),
            prompts: Mutex::new(Vec::new()),
            tools: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(queue: Vec<Completion>) -> Self {
        Self::new(queue.into_iter().map(Ok).collect())
    }

    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn complete(&self, entries: &[PromptEntry], tools: &[Value]) -> Result<Completion> {
        self.prompts.lock().await.push(entries.to_vec());
        self.tools.lock().await.push(tools.to_vec());
        let mut guard = self.queue.lock().await;
        guard.pop_front().unwrap_or_else(|| Ok(Completion::text("mock text")))
    }
}

/// In-memory store that can be told to fail either write.
#[derive(Default)]
pub struct FlakyStore {
    inner: InMemoryConversationStore,
    pub fail_messages: bool,
    pub fail_reminder: bool,
    pub saved_batches: Mutex<Vec<Vec<Message>>>,
    pub saved_reminders: Mutex<Vec<Option<Reminder>>>,
}

impl FlakyStore {
    pub fn failing_messages() -> Self {
        Self {
            fail_messages: true,
            ..Default::default()
        }
    }

    pub fn failing_reminders() -> Self {
        Self {
            fail_reminder: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ConversationStore for FlakyStore {
    async fn load_messages(&self, user_id: &str) -> Result<Vec<Message>> {
        self.inner.load_messages(user_id).await
    }

    async fn save_messages(&self, messages: &[Message]) -> Result<()> {
        self.saved_batches.lock().await.push(messages.to_vec());
        if self.fail_messages {
            return Err(ReminderBotError::Persistence("messages unavailable".to_string()));
        }
        self.inner.save_messages(messages).await
    }

    async fn save_reminder(&self, reminder: Option<&Reminder>) -> Result<()> {
        self.saved_reminders.lock().await.push(reminder.cloned());
        if self.fail_reminder {
            return Err(ReminderBotError::Persistence("reminders unavailable".to_string()));
        }
        self.inner.save_reminder(reminder).await
    }

    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>> {
        self.inner.list_reminders(user_id).await
    }

    async fn clear_history(&self, user_id: &str) -> Result<()> {
        self.inner.clear_history(user_id).await
    }
}

#[derive(Default)]
pub struct RecordingEventLogger {
    pub events: Mutex<Vec<(String, Value)>>,
    pub fail: bool,
}

#[async_trait]
impl EventLogger for RecordingEventLogger {
    async fn log(&self, event: &str, payload: Value) -> Result<()> {
        self.events.lock().await.push((event.to_string(), payload));
        if self.fail {
            return Err(ReminderBotError::Http("log sink unavailable".to_string()));
        }
        Ok(())
    }
}

pub fn tool_call(id: &str, arguments: &str) -> ToolCall {
    ToolCall {
        id: id.to_string(),
        name: "createReminder".to_string(),
        arguments: arguments.to_string(),
    }
}

pub struct Harness {
    pub llm: Arc<QueueLlmProvider>,
    pub store: Arc<FlakyStore>,
    pub events: Arc<RecordingEventLogger>,
    pub service: ConversationService,
}

pub fn harness(llm: QueueLlmProvider, store: FlakyStore) -> Harness {
    let llm = Arc::new(llm);
    let store = Arc::new(store);
    let events = Arc::new(RecordingEventLogger::default());
    let service = ConversationService::new(llm.clone(), store.clone(), events.clone());
    Harness {
        llm,
        store,
        events,
        service,
    }
}

/// Waits for detached event-log tasks to run.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
}
