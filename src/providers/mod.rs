pub mod event_log;
pub mod memory;
pub mod openai;
pub mod retry;
pub mod sqlite;
