//! Command Gateway - Telegram personal assistant
//!
//! Turns free-form Spanish chat messages into actions on tasks, projects,
//! reminders, finances and fitness logs, and sends scheduled briefings.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │          Telegram webhook  │  Admin API  │  Health     │
//! └──────────────┬────────────────────────────────────────┘
//!                │
//! ┌──────────────▼────────────────────────────────────────┐
//! │ Assistant: slash commands │ conversation state │       │
//! │            intent classifier (LLM + rules)             │
//! └──────────────┬────────────────────────────────────────┘
//!                │ one handler per intent
//! ┌──────────────▼───────────────┐   ┌────────────────────┐
//! │ Handlers → repositories      │◄──│ Scheduler (cron)   │
//! │ (SQLite, query cache, RAG)   │   │ briefings, nudges  │
//! └──────────────────────────────┘   └────────────────────┘
//! ```

pub mod api;
pub mod assistant;
pub mod cache;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod handlers;
pub mod intent;
pub mod llm;
pub mod parsing;
pub mod rag;
pub mod retry;
pub mod scheduler;
pub mod telegram;

pub use assistant::Assistant;
pub use config::Config;
pub use db::{DbConn, DbPool};
pub use error::{Error, Result};
pub use handlers::Services;
pub use scheduler::Scheduler;
