pub mod account;
pub mod habit;
pub mod habit_log;
