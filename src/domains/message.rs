use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A function invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON argument text exactly as the provider returned it.
    pub arguments: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "tool" => Ok(Role::Tool),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Role-tagged message body. A tool response can't exist without the id of
/// the call it answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum MessageBody {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        tool_call: Option<ToolCall>,
    },
    Tool {
        content: String,
        tool_call_id: String,
    },
}

impl MessageBody {
    pub fn role(&self) -> Role {
        match self {
            MessageBody::System { .. } => Role::System,
            MessageBody::User { .. } => Role::User,
            MessageBody::Assistant { .. } => Role::Assistant,
            MessageBody::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            MessageBody::System { content }
            | MessageBody::User { content }
            | MessageBody::Tool { content, .. } => Some(content),
            MessageBody::Assistant { content, .. } => content.as_deref(),
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            MessageBody::Tool { tool_call_id, .. } => Some(tool_call_id),
            MessageBody::Assistant {
                tool_call: Some(call),
                ..
            } => Some(&call.id),
            _ => None,
        }
    }

    pub fn tool_call(&self) -> Option<&ToolCall> {
        match self {
            MessageBody::Assistant { tool_call, .. } => tool_call.as_ref(),
            _ => None,
        }
    }
}

/// One persisted turn fragment, scoped to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Message {
    pub fn new(user_id: impl Into<String>, body: MessageBody) -> Self {
        Self {
            user_id: user_id.into(),
            created_at: Utc::now(),
            body,
        }
    }

    pub fn user(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            user_id,
            MessageBody::User {
                content: content.into(),
            },
        )
    }

    pub fn assistant_text(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(
            user_id,
            MessageBody::Assistant {
                content: Some(content.into()),
                tool_call: None,
            },
        )
    }

    pub fn assistant_tool_call(user_id: impl Into<String>, call: ToolCall) -> Self {
        Self::new(
            user_id,
            MessageBody::Assistant {
                content: None,
                tool_call: Some(call),
            },
        )
    }

    pub fn tool_response(
        user_id: impl Into<String>,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(
            user_id,
            MessageBody::Tool {
                content: content.into(),
                tool_call_id: tool_call_id.into(),
            },
        )
    }

    pub fn role(&self) -> Role {
        self.body.role()
    }

    pub fn content(&self) -> Option<&str> {
        self.body.content()
    }
}
