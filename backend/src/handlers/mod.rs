pub mod auth;
pub mod habits;
pub mod health;
pub mod logs;
pub mod pages;
pub mod stats;
