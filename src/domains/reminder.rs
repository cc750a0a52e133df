use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceUnit {
    Day,
    Week,
    Month,
    Year,
}

impl RecurrenceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecurrenceUnit::Day => "day",
            RecurrenceUnit::Week => "week",
            RecurrenceUnit::Month => "month",
            RecurrenceUnit::Year => "year",
        }
    }
}

impl fmt::Display for RecurrenceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecurrenceUnit {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value {
            "day" => Ok(RecurrenceUnit::Day),
            "week" => Ok(RecurrenceUnit::Week),
            "month" => Ok(RecurrenceUnit::Month),
            "year" => Ok(RecurrenceUnit::Year),
            other => Err(format!("unknown recurrence unit '{other}'")),
        }
    }
}

/// Repeat interval: every `frequency` `unit`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recurrence {
    pub frequency: NonZeroU32,
    pub unit: RecurrenceUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub user_id: String,
    /// Trigger instant, always UTC.
    pub reminder_at: DateTime<Utc>,
    pub content: String,
    pub recurrence: Option<Recurrence>,
}

impl Reminder {
    pub fn new(
        user_id: impl Into<String>,
        reminder_at: DateTime<Utc>,
        content: impl Into<String>,
        recurrence: Option<Recurrence>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            reminder_at,
            content: content.into(),
            recurrence,
        }
    }
}
