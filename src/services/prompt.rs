use chrono::{DateTime, Utc};

use crate::domains::message::{Message, MessageBody};
use crate::domains::user::User;
use crate::interfaces::providers::PromptEntry;
use crate::tools::create_reminder::format_local_timestamp;

pub const INSTRUCTIONS: &str = "You are an expert virtual assistant specialized in managing reminders. Use the supplied tools to assist the user.
This assistant receives user messages with the intention of creating reminders using the createReminder tool.
The function requires two mandatory parameters: the content of the reminder and the date and time for the reminder, which is either the moment of a one-time reminder or the starting moment of a recurring reminder.

Example interaction for a one-time reminder:
User: \"Hello assistant, I want to create a reminder for tomorrow.\"
Assistant: \"Hello! Of course, I'm here to help you create reminders. Please provide the content of the reminder.\"
User: \"I have an important meeting.\"
Assistant: \"Perfect. Now, let's set the date and time for the reminder. When would you like to be reminded about your important meeting?\"
User: \"Tomorrow at 3:00 PM.\"
Assistant: \"Understood. Reminder successfully created. I will remind you about your important meeting tomorrow at 3:00 PM.\"

When the user doesn't specify a day, set the reminder for today if possible. If today isn't feasible because of the current time, assume tomorrow.
When the user gives incomplete information, ask for what is missing. If the user mentions tomorrow without a time, ask for the date and time so the reminder can be created.

Example interaction for a recurring reminder:
User: \"Remind me every month to pay my bills\"
Assistant: \"Sure, I can help with that. What day of the month would you like to receive the reminder?\"
User: \"Every 1st of each month.\"
Assistant: \"Got it. Reminder successfully created. I will remind you to pay your bills every 1st of the month.\"

For one-time reminders 'reminder_at' is the exact date and time of the reminder. For recurring reminders it is the first occurrence, and the 'recurrence' property carries 'frequency' and 'unit' to say how often the reminder repeats.

Always answer in the language the user writes in.
Once a reminder is created, do not create it again or keep talking about it.";

/// Assembles the chat-completion prompt for one turn.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    instructions: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(INSTRUCTIONS)
    }
}

impl PromptBuilder {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Instructions, then `history` in stored order, then `incoming`, then the
    /// user's local time as the last entry.
    pub fn build(
        &self,
        history: &[Message],
        incoming: &Message,
        user: &User,
        now: DateTime<Utc>,
    ) -> Vec<PromptEntry> {
        let mut entries = Vec::with_capacity(history.len() + 3);
        entries.push(PromptEntry::System {
            content: self.instructions.clone(),
        });
        entries.extend(history.iter().map(to_prompt_entry));
        entries.push(to_prompt_entry(incoming));
        entries.push(grounding_entry(user, now));
        entries
    }
}

pub fn to_prompt_entry(message: &Message) -> PromptEntry {
    match &message.body {
        MessageBody::System { content } => system_entry(content),
        MessageBody::User { content } => user_entry(content),
        MessageBody::Assistant { content, tool_call } => PromptEntry::Assistant {
            content: content.clone(),
            tool_calls: tool_call.iter().cloned().collect(),
        },
        MessageBody::Tool {
            content,
            tool_call_id,
        } => PromptEntry::Tool {
            content: content.clone(),
            tool_call_id: tool_call_id.clone(),
        },
    }
}

fn system_entry(content: &str) -> PromptEntry {
    PromptEntry::System {
        content: content.to_string(),
    }
}

fn user_entry(content: &str) -> PromptEntry {
    PromptEntry::User {
        content: content.to_string(),
    }
}

pub fn grounding_entry(user: &User, now: DateTime<Utc>) -> PromptEntry {
    system_entry(&format!(
        "The now of the user in 24-Hour Clock Time is {}",
        format_local_timestamp(&user.local_time(now))
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::message::{Role, ToolCall};
    use chrono::TimeZone;

    #[test]
    fn keeps_history_order_and_grounds_last() {
        let user = User::with_timezone_name("u1", "America/Bogota").unwrap();
        let call = ToolCall {
            id: "call_7".to_string(),
            name: "createReminder".to_string(),
            arguments: "{}".to_string(),
        };
        let history = vec![
            Message::user("u1", "first"),
            Message::assistant_tool_call("u1", call.clone()),
            Message::tool_response("u1", "call_7", "created"),
            Message::assistant_text("u1", "done"),
        ];
        let incoming = Message::user("u1", "second");
        let now = Utc.with_ymd_and_hms(2024, 1, 10, 13, 0, 0).unwrap();

        let entries = PromptBuilder::default().build(&history, &incoming, &user, now);
        let roles: Vec<Role> = entries.iter().map(PromptEntry::role).collect();
        assert_eq!(
            roles,
            vec![
                Role::System,
                Role::User,
                Role::Assistant,
                Role::Tool,
                Role::Assistant,
                Role::User,
                Role::System
            ]
        );
        assert_eq!(entries[0].content(), Some(INSTRUCTIONS));
        assert_eq!(
            entries[2],
            PromptEntry::Assistant {
                content: None,
                tool_calls: vec![call]
            }
        );
        assert_eq!(
            entries[3],
            PromptEntry::Tool {
                content: "created".to_string(),
                tool_call_id: "call_7".to_string()
            }
        );
        assert_eq!(entries[5].content(), Some("second"));
        assert_eq!(
            entries[6].content(),
            Some("The now of the user in 24-Hour Clock Time is 2024-01-10 08:00:00.000")
        );
    }

    #[test]
    fn grounding_renders_millis_in_user_zone() {
        let user = User::with_timezone_name("u1", "Asia/Kolkata").unwrap();
        let now = Utc.timestamp_millis_opt(1_704_891_600_123).unwrap();
        let entry = grounding_entry(&user, now);
        assert_eq!(
            entry.content(),
            Some("The now of the user in 24-Hour Clock Time is 2024-01-10 18:30:00.123")
        );
    }
}
