use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::domains::message::{Message, ToolCall};
use crate::domains::reminder::Reminder;
use crate::domains::user::User;
use crate::error::Result;
use crate::interfaces::plugins::Tool;
use crate::interfaces::providers::{ConversationStore, EventLogger, LlmProvider, PromptEntry};
use crate::services::prompt::{to_prompt_entry, PromptBuilder};
use crate::tools::create_reminder::{created_summary, rejected_summary, CreateReminderTool};

/// Reply sent when the model could not be reached. Never persisted.
pub const FAILURE_REPLY: &str =
    "Sorry, I couldn't process your message right now. Please try again in a moment.";

/// Tool calls acted upon per completion; the rest are dropped.
pub const MAX_TOOL_CALLS_PER_TURN: usize = 1;

pub const CREATING_REMINDER_EVENT: &str = "CREATING_REMINDER";

/// What a turn leaves behind for the store.
#[derive(Debug, Default)]
struct TurnRecord {
    messages: Vec<Message>,
    reminder: Option<Reminder>,
}

/// Runs one user turn: prompt, optional reminder tool call, confirmation,
/// persistence.
pub struct ConversationService {
    llm_provider: Arc<dyn LlmProvider>,
    store: Arc<dyn ConversationStore>,
    event_logger: Arc<dyn EventLogger>,
    prompt_builder: PromptBuilder,
    reminder_tool: CreateReminderTool,
}

impl ConversationService {
    pub fn new(
        llm_provider: Arc<dyn LlmProvider>,
        store: Arc<dyn ConversationStore>,
        event_logger: Arc<dyn EventLogger>,
    ) -> Self {
        Self {
            llm_provider,
            store,
            event_logger,
            prompt_builder: PromptBuilder::default(),
            reminder_tool: CreateReminderTool::new(),
        }
    }

    pub fn with_prompt_builder(mut self, prompt_builder: PromptBuilder) -> Self {
        self.prompt_builder = prompt_builder;
        self
    }

    pub fn store(&self) -> Arc<dyn ConversationStore> {
        Arc::clone(&self.store)
    }

    pub async fn handle_message(&self, user: &User, text: &str) -> Result<Option<Message>> {
        self.handle_message_at(user, text, Utc::now()).await
    }

    /// Same as [`handle_message`](Self::handle_message) with an explicit
    /// "now" for the grounding timestamp.
    pub async fn handle_message_at(
        &self,
        user: &User,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Message>> {
        tracing::info!(user_id = user.id(), "turn started");
        let incoming = Message::user(user.id(), text);
        let history = self.store.load_messages(user.id()).await?;
        let mut prompt = self.prompt_builder.build(&history, &incoming, user, now);

        let mut record = TurnRecord {
            messages: vec![incoming],
            reminder: None,
        };

        let reply = match self.converse(user, &mut prompt, &mut record).await {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(user_id = user.id(), error = %err, "completion failed");
                Some(Message::assistant_text(user.id(), FAILURE_REPLY))
            }
        };

        self.persist(&record).await?;
        tracing::info!(
            user_id = user.id(),
            saved_messages = record.messages.len(),
            reminder_created = record.reminder.is_some(),
            "turn finished"
        );
        Ok(reply)
    }

    pub fn tool_specs(&self) -> Vec<Value> {
        vec![self.reminder_tool.spec()]
    }

    /// Only provider calls can fail in here.
    async fn converse(
        &self,
        user: &User,
        prompt: &mut Vec<PromptEntry>,
        record: &mut TurnRecord,
    ) -> Result<Option<Message>> {
        let tools = self.tool_specs();
        let mut completion = self.llm_provider.complete(prompt, &tools).await?;

        if completion.requests_tools() {
            let entries = self.handle_tool_calls(user, &completion.tool_calls, record);
            prompt.extend(entries);
            completion = self.llm_provider.complete(prompt, &tools).await?;
        }

        Ok(completion.reply_text().map(|text| {
            let reply = Message::assistant_text(user.id(), text);
            record.messages.push(reply.clone());
            reply
        }))
    }

    fn handle_tool_calls(
        &self,
        user: &User,
        calls: &[ToolCall],
        record: &mut TurnRecord,
    ) -> Vec<PromptEntry> {
        if calls.len() > MAX_TOOL_CALLS_PER_TURN {
            tracing::warn!(
                user_id = user.id(),
                received = calls.len(),
                handled = MAX_TOOL_CALLS_PER_TURN,
                "model requested more tool calls than handled per turn"
            );
        }

        let mut entries = Vec::new();
        for call in calls.iter().take(MAX_TOOL_CALLS_PER_TURN) {
            let request = Message::assistant_tool_call(user.id(), call.clone());
            let response = self.run_tool_call(user, call, record);
            entries.push(to_prompt_entry(&request));
            entries.push(to_prompt_entry(&response));
            record.messages.push(request);
            record.messages.push(response);
        }
        entries
    }

    fn run_tool_call(&self, user: &User, call: &ToolCall, record: &mut TurnRecord) -> Message {
        let summary = match self.reminder_tool.interpret(call, user) {
            Ok((args, reminder)) => {
                tracing::info!(
                    user_id = user.id(),
                    reminder_at = %reminder.reminder_at,
                    recurring = reminder.recurrence.is_some(),
                    "creating reminder"
                );
                self.log_event_detached(
                    CREATING_REMINDER_EVENT,
                    json!({
                        "user_id": user.id(),
                        "content": &args.content,
                        "reminder_at": &args.reminder_at,
                        "recurrence": &args.recurrence,
                    }),
                );
                let summary = created_summary(&args, &reminder);
                record.reminder = Some(reminder);
                summary
            }
            Err(err) => {
                tracing::warn!(
                    user_id = user.id(),
                    tool_call_id = %call.id,
                    error = %err,
                    "rejected tool call"
                );
                rejected_summary(&err)
            }
        };
        Message::tool_response(user.id(), call.id.clone(), summary)
    }

    fn log_event_detached(&self, event: &'static str, payload: Value) {
        let logger = Arc::clone(&self.event_logger);
        tokio::spawn(async move {
            if let Err(err) = logger.log(event, payload).await {
                tracing::debug!(event, error = %err, "event logging failed");
            }
        });
    }

    async fn persist(&self, record: &TurnRecord) -> Result<()> {
        let (reminder_saved, messages_saved) = tokio::join!(
            self.store.save_reminder(record.reminder.as_ref()),
            self.store.save_messages(&record.messages),
        );
        reminder_saved?;
        messages_saved?;
        Ok(())
    }
}
