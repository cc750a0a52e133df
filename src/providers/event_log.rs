use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::interfaces::providers::EventLogger;

/// Writes events to the `reminder_bot::events` tracing target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLogger;

impl TracingEventLogger {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventLogger for TracingEventLogger {
    async fn log(&self, event: &str, payload: Value) -> Result<()> {
        tracing::info!(target: "reminder_bot::events", event, %payload);
        Ok(())
    }
}
