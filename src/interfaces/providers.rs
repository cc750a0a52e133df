use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::message::{Message, Role, ToolCall};
use crate::domains::reminder::Reminder;
use crate::error::Result;

/// One role-tagged entry of a chat-completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum PromptEntry {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl PromptEntry {
    pub fn role(&self) -> Role {
        match self {
            PromptEntry::System { .. } => Role::System,
            PromptEntry::User { .. } => Role::User,
            PromptEntry::Assistant { .. } => Role::Assistant,
            PromptEntry::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            PromptEntry::System { content }
            | PromptEntry::User { content }
            | PromptEntry::Tool { content, .. } => Some(content),
            PromptEntry::Assistant { content, .. } => content.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
    Other,
}

/// The first choice of a chat completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub finish_reason: FinishReason,
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            finish_reason: FinishReason::Stop,
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            finish_reason: FinishReason::ToolCalls,
            content: None,
            tool_calls,
        }
    }

    pub fn requests_tools(&self) -> bool {
        self.finish_reason == FinishReason::ToolCalls && !self.tool_calls.is_empty()
    }

    /// Text content, ignoring blank replies.
    pub fn reply_text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .filter(|content| !content.trim().is_empty())
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends the whole prompt with the given function tools and returns the
    /// first choice.
    async fn complete(&self, entries: &[PromptEntry], tools: &[Value]) -> Result<Completion>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stored messages for the user, oldest first.
    async fn load_messages(&self, user_id: &str) -> Result<Vec<Message>>;

    /// Appends the batch atomically and in order.
    async fn save_messages(&self, messages: &[Message]) -> Result<()>;

    /// `None` is accepted and does nothing.
    async fn save_reminder(&self, reminder: Option<&Reminder>) -> Result<()>;

    async fn list_reminders(&self, user_id: &str) -> Result<Vec<Reminder>>;

    async fn clear_history(&self, user_id: &str) -> Result<()>;
}

/// Outbound notification channel for operational events.
#[async_trait]
pub trait EventLogger: Send + Sync {
    async fn log(&self, event: &str, payload: Value) -> Result<()>;
}
