use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::error::{ReminderBotError, Result};

/// The person a conversation belongs to. Owned by whatever transport
/// delivered the message; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: String,
    timezone: Tz,
}

impl User {
    pub fn new(id: impl Into<String>, timezone: Tz) -> Self {
        Self {
            id: id.into(),
            timezone,
        }
    }

    /// Builds a user from an IANA timezone name such as `America/Bogota`.
    pub fn with_timezone_name(id: impl Into<String>, timezone: &str) -> Result<Self> {
        let timezone: Tz = timezone
            .trim()
            .parse()
            .map_err(|e| ReminderBotError::Config(format!("unknown timezone '{timezone}': {e}")))?;
        Ok(Self::new(id, timezone))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn local_time(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }
}
