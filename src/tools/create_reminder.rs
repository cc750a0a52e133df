use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domains::message::ToolCall;
use crate::domains::reminder::{Recurrence, Reminder};
use crate::domains::user::User;
use crate::error::{ReminderBotError, Result};
use crate::interfaces::plugins::Tool;

pub const CREATE_REMINDER_TOOL: &str = "createReminder";

/// Format of every timestamp exchanged with the model.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Reminders fire this many minutes before the requested wall-clock time.
// TODO: confirm with product whether the lead time should be user-configurable.
pub const REMINDER_LEAD_TIME_MINUTES: i64 = 1;

const ACCEPTED_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateReminderArgs {
    pub content: String,
    pub reminder_at: String,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CreateReminderTool;

impl CreateReminderTool {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_arguments(&self, raw: &str) -> Result<CreateReminderArgs> {
        let args: CreateReminderArgs = serde_json::from_str(raw)
            .map_err(|e| ReminderBotError::InvalidToolArguments(e.to_string()))?;
        if args.content.trim().is_empty() {
            return Err(ReminderBotError::InvalidToolArguments(
                "reminder content is empty".to_string(),
            ));
        }
        Ok(args)
    }

    /// Turns a model tool call into a reminder owned by `user`.
    pub fn interpret(&self, call: &ToolCall, user: &User) -> Result<(CreateReminderArgs, Reminder)> {
        if call.name != CREATE_REMINDER_TOOL {
            return Err(ReminderBotError::InvalidToolArguments(format!(
                "unknown function '{}'",
                call.name
            )));
        }
        let args = self.parse_arguments(&call.arguments)?;
        let local = parse_local_timestamp(&args.reminder_at, user.timezone())?;
        let reminder = Reminder::new(
            user.id(),
            local - Duration::minutes(REMINDER_LEAD_TIME_MINUTES),
            args.content.trim(),
            args.recurrence,
        );
        Ok((args, reminder))
    }
}

impl Tool for CreateReminderTool {
    fn name(&self) -> &str {
        CREATE_REMINDER_TOOL
    }

    fn description(&self) -> &str {
        "Create a reminder in the database"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {
                    "type": "string",
                    "description": "The content or text of the reminder"
                },
                "reminder_at": {
                    "type": "string",
                    "description": "The date and time of the reminder in format YYYY-MM-DD HH:mm:ss.SSS"
                },
                "recurrence": {
                    "type": "object",
                    "description": "The recurrence object is used to determine how often a reminder should occur",
                    "properties": {
                        "frequency": {
                            "type": "integer",
                            "minimum": 1,
                            "description": "The numerical value representing the frequency of the recurrence."
                        },
                        "unit": {
                            "type": "string",
                            "description": "The unit of time for recurrence",
                            "enum": ["day", "week", "month", "year"]
                        }
                    },
                    "additionalProperties": false,
                    "required": ["frequency", "unit"]
                }
            },
            "additionalProperties": false,
            "required": ["content", "reminder_at"]
        })
    }
}

/// Reads a wall-clock timestamp in `tz` and returns the UTC instant.
/// Times inside a DST gap are rejected; times inside a fold take the
/// earlier instant.
pub fn parse_local_timestamp(raw: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    let naive = ACCEPTED_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| {
            ReminderBotError::InvalidToolArguments(format!(
                "reminder_at '{raw}' is not in format YYYY-MM-DD HH:mm:ss.SSS"
            ))
        })?;
    let local = tz.from_local_datetime(&naive).earliest().ok_or_else(|| {
        ReminderBotError::InvalidToolArguments(format!(
            "reminder_at '{raw}' does not exist in timezone {tz}"
        ))
    })?;
    Ok(local.with_timezone(&Utc))
}

pub fn format_local_timestamp<T: TimeZone>(instant: &DateTime<T>) -> String
where
    T::Offset: std::fmt::Display,
{
    instant.format(TIMESTAMP_FORMAT).to_string()
}

/// Text of the tool message that answers a successful call.
pub fn created_summary(args: &CreateReminderArgs, reminder: &Reminder) -> String {
    match &reminder.recurrence {
        Some(recurrence) => format!(
            "Reminder created and scheduled for {} with recurrence {}",
            args.reminder_at,
            json!({"frequency": recurrence.frequency.get(), "unit": recurrence.unit})
        ),
        None => format!("Reminder created and scheduled for {}", args.reminder_at),
    }
}

/// Text of the tool message that answers a rejected call.
pub fn rejected_summary(err: &ReminderBotError) -> String {
    format!(
        "Reminder was not created: {err}. Ask the user to clarify the reminder content and its date and time."
    )
}
