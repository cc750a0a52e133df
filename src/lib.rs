pub mod client;
pub mod config;
pub mod domains;
pub mod error;
pub mod factories;
pub mod interfaces;
pub mod providers;
pub mod services;
pub mod tools;

pub use crate::client::ReminderBot;
pub use crate::config::Config;
pub use crate::domains::message::{Message, MessageBody, Role, ToolCall};
pub use crate::domains::reminder::{Recurrence, RecurrenceUnit, Reminder};
pub use crate::domains::user::User;
pub use crate::error::{ReminderBotError, Result};
pub use crate::services::conversation::ConversationService;
