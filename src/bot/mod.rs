//! Live bot-session scheduling.

pub mod runner;

pub use runner::{BotRunSummary, BotRunner};
