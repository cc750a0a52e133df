pub mod create_reminder;
