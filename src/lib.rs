pub mod calendar;
pub mod chat;
pub mod config;
mod db;
pub mod domains;
pub mod error;
pub mod factories;
pub mod intent;
pub mod interfaces;
pub mod providers;
pub mod services;
pub mod timezone;

pub use crate::config::Config;
pub use crate::error::{AssistantError, FailureKind, Result};
pub use crate::factories::assistant_factory::AssistantFactory;
pub use crate::services::assistant::{AssistantReply, AssistantService, AssistantSettings};
