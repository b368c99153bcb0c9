//! Intent handlers
//!
//! Every intent maps to exactly one [`IntentHandler`]. The
//! [`HandlerRegistry`] validates confidence, invokes the handler and turns
//! failures into a generic apology. Intents without a registered handler go
//! to the fallback handler, which parks the message in the inbox.

mod capture;
mod finance;
mod fitness;
mod general;
mod planning;
mod projects;
mod reminders;
mod tasks;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use serde::Serialize;

use crate::cache::QueryCache;
use crate::config::AssistantConfig;
use crate::conversation::ConversationState;
use crate::db::{
    ConversationRepo, DbPool, EmbeddingRepo, FinanceRepo, FitnessRepo, InboxRepo, MetricsRepo,
    ProjectRepo, ReminderRepo, Task, TaskRepo,
};
use crate::intent::{IntentResult, UserIntent};
use crate::llm::LlmClient;
use crate::parsing::TextParsing;
use crate::rag::Retriever;
use crate::telegram::{InlineButton, InlineKeyboard, html};
use crate::Result;

pub use capture::FallbackHandler;
pub(crate) use finance::money;
pub(crate) use fitness::{WEEKLY_TARGET, log_meal, log_workout};
pub(crate) use projects::next_study_project;
pub use reminders::{SNOOZE_MINUTES, reminder_keyboard};
pub(crate) use reminders::schedule_reminder;
pub(crate) use tasks::create_task;

/// Reply shown when a handler fails
pub const GENERIC_FAILURE: &str = "Ocurrió un error procesando tu solicitud.";

/// Everything a handler can reach
#[derive(Clone)]
pub struct Services {
    pub tasks: TaskRepo,
    pub projects: ProjectRepo,
    pub reminders: ReminderRepo,
    pub inbox: InboxRepo,
    pub fitness: FitnessRepo,
    pub finance: FinanceRepo,
    pub conversations: ConversationRepo,
    pub embeddings: EmbeddingRepo,
    pub metrics: MetricsRepo,
    pub cache: QueryCache,
    pub retriever: Option<Retriever>,
    pub llm: Option<Arc<dyn LlmClient>>,
    pub parser: Arc<dyn TextParsing>,
    pub settings: AssistantConfig,
}

impl Services {
    /// Build repositories over one pool and cache
    #[must_use]
    pub fn new(
        pool: DbPool,
        cache: QueryCache,
        settings: AssistantConfig,
        parser: Arc<dyn TextParsing>,
    ) -> Self {
        Self {
            tasks: TaskRepo::new(pool.clone(), cache.clone()),
            projects: ProjectRepo::new(pool.clone(), cache.clone()),
            reminders: ReminderRepo::new(pool.clone(), cache.clone()),
            inbox: InboxRepo::new(pool.clone(), cache.clone()),
            fitness: FitnessRepo::new(pool.clone(), cache.clone()),
            finance: FinanceRepo::new(pool.clone(), cache.clone()),
            conversations: ConversationRepo::new(pool.clone()),
            embeddings: EmbeddingRepo::new(pool.clone()),
            metrics: MetricsRepo::new(pool),
            cache,
            retriever: None,
            llm: None,
            parser,
            settings,
        }
    }

    /// Attach an LLM for classification and suggestions
    #[must_use]
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Attach a retriever for duplicate detection
    #[must_use]
    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = Some(retriever);
        self
    }
}

/// Per-message context
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub chat_id: i64,
    /// Local time the message arrived
    pub now: DateTime<FixedOffset>,
    pub user_name: Option<String>,
}

impl HandlerContext {
    #[must_use]
    pub fn new(chat_id: i64, now: DateTime<FixedOffset>) -> Self {
        Self {
            chat_id,
            now,
            user_name: None,
        }
    }

    #[must_use]
    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.user_name = (!name.trim().is_empty()).then_some(name);
        self
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    #[must_use]
    pub fn hour(&self) -> u32 {
        self.now.hour()
    }
}

/// What a handler wants sent back
#[derive(Debug, Clone, Default, Serialize)]
pub struct HandlerResponse {
    /// HTML message text
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyboard: Option<InlineKeyboard>,
    /// Structured result (ids of created records and similar)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Conversation state to persist for the chat
    #[serde(skip)]
    pub next_state: Option<ConversationState>,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: false,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = (!keyboard.inline_keyboard.is_empty()).then_some(keyboard);
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_state(mut self, state: ConversationState) -> Self {
        self.next_state = Some(state);
        self
    }
}

/// One externally visible action
#[async_trait]
pub trait IntentHandler: Send + Sync {
    /// Name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Intent this handler serves
    fn intent(&self) -> UserIntent;

    /// Confidence below which the handler refuses to act
    fn min_confidence(&self) -> f32 {
        0.0
    }

    /// Check the classification before handling
    ///
    /// # Errors
    ///
    /// Returns the user-facing reason when the request should not be handled
    fn validate(&self, result: &IntentResult) -> std::result::Result<(), String> {
        if result.confidence < self.min_confidence() {
            return Err(format!(
                "🤔 Confianza muy baja ({:.0}%). ¿Puedes reformular tu mensaje?",
                result.confidence * 100.0
            ));
        }
        Ok(())
    }

    /// Perform the action
    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse>;
}

/// Outcome of a dispatch
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Handler that was invoked
    pub handler: &'static str,
    pub response: HandlerResponse,
    /// Set when the handler failed and the response is the generic apology
    pub error: Option<String>,
}

/// Intent to handler lookup
pub struct HandlerRegistry {
    handlers: HashMap<UserIntent, Arc<dyn IntentHandler>>,
    fallback: Arc<dyn IntentHandler>,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlerRegistry {
    /// Empty registry; every intent goes to the fallback
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            fallback: Arc::new(FallbackHandler),
        }
    }

    /// Register a handler for its intent, replacing any previous one
    pub fn register(&mut self, handler: Arc<dyn IntentHandler>) {
        let intent = handler.intent();
        if let Some(previous) = self.handlers.insert(intent, handler) {
            tracing::warn!(%intent, replaced = previous.name(), "handler replaced");
        }
    }

    /// Replace the fallback handler
    pub fn set_fallback(&mut self, handler: Arc<dyn IntentHandler>) {
        self.fallback = handler;
    }

    /// Handler registered for `intent`
    #[must_use]
    pub fn get(&self, intent: UserIntent) -> Option<&Arc<dyn IntentHandler>> {
        self.handlers.get(&intent)
    }

    /// Number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Intents with a handler, with the handler name
    #[must_use]
    pub fn list(&self) -> Vec<(UserIntent, &'static str)> {
        let mut out: Vec<_> = self.handlers.iter().map(|(i, h)| (*i, h.name())).collect();
        out.sort_by_key(|(i, _)| i.as_str());
        out
    }

    /// Route a classified message to exactly one handler
    pub async fn dispatch(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Dispatch {
        let handler = self.handlers.get(&result.intent).unwrap_or_else(|| {
            tracing::warn!(intent = %result.intent, "no handler registered, using fallback");
            &self.fallback
        });
        let name = handler.name();

        if let Err(reason) = handler.validate(result) {
            tracing::info!(
                handler = name,
                confidence = result.confidence,
                "validation refused"
            );
            return Dispatch {
                handler: name,
                response: HandlerResponse::failure(reason),
                error: None,
            };
        }

        match handler.handle(services, ctx, result).await {
            Ok(response) => {
                tracing::debug!(handler = name, success = response.success, "handled");
                Dispatch {
                    handler: name,
                    response,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!(
                    handler = name,
                    chat_id = ctx.chat_id,
                    error = %e,
                    "handler failed"
                );
                Dispatch {
                    handler: name,
                    response: HandlerResponse::failure(GENERIC_FAILURE),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Registry with a handler for every intent
#[must_use]
pub fn default_registry() -> HandlerRegistry {
    let handlers: Vec<Arc<dyn IntentHandler>> = vec![
        Arc::new(tasks::TaskCreateHandler),
        Arc::new(tasks::TaskQueryHandler),
        Arc::new(tasks::TaskUpdateHandler),
        Arc::new(tasks::TaskDeleteHandler),
        Arc::new(tasks::TaskStatusChangeHandler),
        Arc::new(tasks::RescheduleHandler),
        Arc::new(planning::PlanTodayHandler),
        Arc::new(planning::PlanTomorrowHandler),
        Arc::new(planning::PlanWeekHandler),
        Arc::new(planning::PrioritizeHandler),
        Arc::new(planning::WorkloadCheckHandler),
        Arc::new(capture::IdeaHandler),
        Arc::new(capture::NoteHandler),
        Arc::new(capture::UnknownHandler),
        Arc::new(reminders::ReminderCreateHandler),
        Arc::new(reminders::ReminderQueryHandler),
        Arc::new(finance::ExpenseLogHandler),
        Arc::new(finance::ExpenseAnalyzeHandler),
        Arc::new(finance::DebtQueryHandler),
        Arc::new(fitness::GymLogHandler),
        Arc::new(fitness::GymQueryHandler),
        Arc::new(fitness::NutritionLogHandler),
        Arc::new(fitness::NutritionQueryHandler),
        Arc::new(projects::ProjectCreateHandler),
        Arc::new(projects::ProjectUpdateHandler),
        Arc::new(projects::ProjectDeleteHandler),
        Arc::new(projects::ProjectQueryHandler),
        Arc::new(projects::StudySessionHandler),
        Arc::new(general::GreetingHandler),
        Arc::new(general::HelpHandler),
        Arc::new(general::StatusHandler),
    ];

    let mut registry = HandlerRegistry::new();
    for handler in handlers {
        registry.register(handler);
    }
    tracing::debug!(handlers = registry.len(), "handlers registered");
    registry
}

/// First `max` characters of `text`, with an ellipsis when cut
pub(crate) fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Escaped and truncated user text for HTML replies
pub(crate) fn quote(text: &str, max: usize) -> String {
    html::escape(&truncate(text, max))
}

/// `13/02` style date
pub(crate) fn short_date(date: NaiveDate) -> String {
    date.format("%d/%m").to_string()
}

/// One task per line with status, priority and due date
pub(crate) fn task_line(task: &Task, today: NaiveDate) -> String {
    let due = match task.due_date {
        Some(d) if d < today => format!(" ⚠️ venció {}", short_date(d)),
        Some(d) if d == today => " 📅 hoy".to_string(),
        Some(d) => format!(" 📅 {}", short_date(d)),
        None => String::new(),
    };
    format!(
        "{} {} {}{due}",
        task.status.emoji(),
        task.priority.emoji(),
        quote(&task.title, 60)
    )
}

/// One "complete" button per task
pub(crate) fn complete_buttons<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> InlineKeyboard {
    tasks.into_iter().fold(InlineKeyboard::new(), |kb, task| {
        kb.row([InlineButton::new(
            format!("✅ {}", truncate(&task.title, 30)),
            format!("task_complete:{}", task.id),
        )])
    })
}

/// Entity value or the whole message
pub(crate) fn subject(result: &IntentResult, key: &str) -> String {
    result
        .entity(key)
        .unwrap_or(result.raw_message.as_str())
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::init_memory;
    use crate::parsing::RuleParser;
    use chrono::TimeZone;

    pub(crate) fn services() -> Services {
        Services::new(
            init_memory().unwrap(),
            QueryCache::default(),
            AssistantConfig::default(),
            Arc::new(RuleParser),
        )
    }

    pub(crate) fn ctx() -> HandlerContext {
        let tz = AssistantConfig::default().tz;
        HandlerContext::new(42, tz.with_ymd_and_hms(2026, 3, 10, 10, 0, 0).unwrap())
    }

    struct Failing;

    #[async_trait]
    impl IntentHandler for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn intent(&self) -> UserIntent {
            UserIntent::Status
        }

        async fn handle(
            &self,
            _: &Services,
            _: &HandlerContext,
            _: &IntentResult,
        ) -> Result<HandlerResponse> {
            Err(crate::Error::Database("boom".into()))
        }
    }

    struct Picky;

    #[async_trait]
    impl IntentHandler for Picky {
        fn name(&self) -> &'static str {
            "picky"
        }

        fn intent(&self) -> UserIntent {
            UserIntent::Help
        }

        fn min_confidence(&self) -> f32 {
            0.8
        }

        async fn handle(
            &self,
            _: &Services,
            _: &HandlerContext,
            _: &IntentResult,
        ) -> Result<HandlerResponse> {
            Ok(HandlerResponse::new("ok"))
        }
    }

    #[test]
    fn default_registry_covers_every_intent() {
        let registry = default_registry();
        for intent in UserIntent::ALL {
            let handler = registry.get(intent);
            assert!(handler.is_some(), "{intent} has no handler");
            assert_eq!(handler.unwrap().intent(), intent);
        }
        assert_eq!(registry.len(), UserIntent::ALL.len());
    }

    #[tokio::test]
    async fn unregistered_intent_goes_to_fallback() {
        let registry = HandlerRegistry::new();
        let services = services();
        let result = IntentResult::new(UserIntent::GymLog, 0.9, "fui al gym");

        let dispatch = registry.dispatch(&services, &ctx(), &result).await;
        assert_eq!(dispatch.handler, "fallback");
        assert_eq!(services.inbox.pending_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn handler_error_becomes_generic_reply() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Failing));

        let result = IntentResult::new(UserIntent::Status, 1.0, "/status");
        let dispatch = registry.dispatch(&services(), &ctx(), &result).await;
        assert_eq!(dispatch.handler, "failing");
        assert!(!dispatch.response.success);
        assert_eq!(dispatch.response.message, GENERIC_FAILURE);
        assert!(dispatch.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn low_confidence_is_refused_by_the_handler() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(Picky));

        let result = IntentResult::new(UserIntent::Help, 0.5, "ayuda?");
        let dispatch = registry.dispatch(&services(), &ctx(), &result).await;
        assert_eq!(dispatch.handler, "picky");
        assert!(!dispatch.response.success);
        assert!(dispatch.response.message.contains("Confianza muy baja (50%)"));
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("mañana", 10), "mañana");
        assert_eq!(truncate("abcdefghijk", 5), "abcd…");
    }

    #[test]
    fn empty_keyboard_is_dropped() {
        let response = HandlerResponse::new("x").with_keyboard(InlineKeyboard::new());
        assert!(response.keyboard.is_none());
    }
}
