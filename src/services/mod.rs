pub mod conversation;
pub mod prompt;
