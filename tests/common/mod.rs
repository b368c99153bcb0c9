//! Shared test utilities

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use command_gateway::api::ApiServerBuilder;
use command_gateway::cache::QueryCache;
use command_gateway::config::AssistantConfig;
use command_gateway::parsing::RuleParser;
use command_gateway::rag::Embed;
use command_gateway::telegram::{InlineKeyboard, Messenger};
use command_gateway::{Assistant, DbPool, Scheduler, Services, db};

pub const API_KEY: &str = "test-api-key";
pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Services backed by an in-memory database and the rule parser
#[must_use]
pub fn test_services() -> Services {
    services_with(setup_test_db())
}

/// Services over an existing pool
#[must_use]
pub fn services_with(pool: DbPool) -> Services {
    Services::new(
        pool,
        QueryCache::default(),
        AssistantConfig::default(),
        Arc::new(RuleParser),
    )
}

/// Messenger that keeps every outbound message
#[derive(Default)]
pub struct Recorder {
    pub sent: Mutex<Vec<(i64, String)>>,
}

impl Recorder {
    pub fn messages(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for Recorder {
    async fn send(
        &self,
        chat_id: i64,
        text: &str,
        _keyboard: Option<&InlineKeyboard>,
    ) -> command_gateway::Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn answer_callback(
        &self,
        _callback_id: &str,
        _text: Option<&str>,
    ) -> command_gateway::Result<()> {
        Ok(())
    }
}

/// Embeds by keyword so similarity is predictable
pub struct KeywordEmbedder;

#[async_trait]
impl Embed for KeywordEmbedder {
    async fn embed(&self, text: &str) -> command_gateway::Result<Vec<f32>> {
        let text = text.to_lowercase();
        let axes = ["informe", "pan", "gym"];
        Ok(axes
            .iter()
            .map(|k| if text.contains(k) { 1.0 } else { 0.0 })
            .chain(std::iter::once(0.1))
            .collect())
    }
}

/// Assistant wired to a recorder
pub fn test_assistant(services: Services) -> (Arc<Assistant>, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let assistant = Arc::new(Assistant::new(services, recorder.clone()));
    (assistant, recorder)
}

/// Router with admin key, webhook secret and a stopped scheduler
pub fn build_test_router() -> (axum::Router, Arc<Assistant>, Arc<Recorder>) {
    let db = setup_test_db();
    let services = services_with(db.clone());
    let (assistant, recorder) = test_assistant(services.clone());
    let scheduler = Scheduler::new(services, recorder.clone(), Some(42)).expect("scheduler");

    let server = ApiServerBuilder::new(db, assistant.clone())
        .scheduler(scheduler)
        .api_key(Some(API_KEY.to_string()))
        .webhook_secret(Some(WEBHOOK_SECRET.to_string()))
        .rate_limit(0)
        .build();
    (server.router(), assistant, recorder)
}
