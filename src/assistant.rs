//! Message pipeline
//!
//! Every inbound Telegram update ends up here: slash commands are answered
//! directly, pending conversation flows get their follow-up, and everything
//! else is classified and dispatched to exactly one handler.

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;

use crate::conversation::{Action, ConversationState, Event};
use crate::db::MAX_SNOOZE_MINUTES;
use crate::handlers::{
    self, GENERIC_FAILURE, HandlerContext, HandlerRegistry, HandlerResponse, Services,
    default_registry, quote, short_date,
};
use crate::intent::{IntentClassifier, IntentResult, SlashCommand};
use crate::telegram::{CallbackQuery, Messenger, Update};
use crate::{Error, Result};

/// History lines kept per chat
const HISTORY_KEEP: usize = 20;

/// History lines passed to the classifier
const HISTORY_CONTEXT: usize = 6;

/// Inbox items listed by `/inbox`
const INBOX_LIMIT: usize = 10;

/// Routes updates through classification, handlers and the messenger
pub struct Assistant {
    services: Services,
    classifier: IntentClassifier,
    registry: HandlerRegistry,
    messenger: Arc<dyn Messenger>,
}

impl Assistant {
    /// Assistant with every handler registered
    #[must_use]
    pub fn new(services: Services, messenger: Arc<dyn Messenger>) -> Self {
        let classifier = IntentClassifier::new(services.llm.clone(), services.parser.clone());
        Self {
            services,
            classifier,
            registry: default_registry(),
            messenger,
        }
    }

    /// Replace the handler registry
    #[must_use]
    pub fn with_registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    #[must_use]
    pub fn messenger(&self) -> &Arc<dyn Messenger> {
        &self.messenger
    }

    #[must_use]
    pub const fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Process one webhook update; failures are logged, never returned
    pub async fn process_update(&self, update: Update) {
        let update_id = update.update_id;
        let outcome = if let Some(callback) = update.callback_query {
            self.handle_callback(&callback).await.map(|_| ())
        } else if let Some(message) = update.message {
            match message.content() {
                Some(text) => {
                    let name = message.from.as_ref().map(|u| u.first_name.as_str());
                    self.handle_text(message.chat.id, text, name).await.map(|_| ())
                }
                None => {
                    tracing::debug!(update_id, "ignoring message without text");
                    Ok(())
                }
            }
        } else {
            tracing::debug!(update_id, "ignoring unsupported update");
            Ok(())
        };

        if let Err(e) = outcome {
            tracing::error!(update_id, error = %e, "update processing failed");
        }
    }

    /// Handle a text message and send the reply
    ///
    /// # Errors
    ///
    /// Returns error if state cannot be read or the reply cannot be sent
    pub async fn handle_text(
        &self,
        chat_id: i64,
        text: &str,
        user_name: Option<&str>,
    ) -> Result<HandlerResponse> {
        let mut ctx = HandlerContext::new(chat_id, self.services.settings.now());
        if let Some(name) = user_name {
            ctx = ctx.with_user_name(name);
        }
        self.count(&ctx, "messages");
        tracing::info!(chat_id, chars = text.chars().count(), "message received");

        let response = match SlashCommand::parse(text) {
            Some(command) => self.run_command(&ctx, command, text).await?,
            None => self.continue_conversation(&ctx, text).await?,
        };

        self.remember(chat_id, "user", text);
        self.remember(chat_id, "assistant", &response.message);
        self.messenger
            .send(chat_id, &response.message, response.keyboard.as_ref())
            .await?;
        Ok(response)
    }

    /// Handle an inline button press and send the outcome
    ///
    /// # Errors
    ///
    /// Returns error if the reply cannot be sent
    pub async fn handle_callback(&self, callback: &CallbackQuery) -> Result<HandlerResponse> {
        let chat_id = callback
            .message
            .as_ref()
            .map_or(callback.from.id, |m| m.chat.id);
        let ctx = HandlerContext::new(chat_id, self.services.settings.now())
            .with_user_name(callback.from.first_name.clone());
        let data = callback.data.as_deref().unwrap_or_default();
        tracing::info!(chat_id, data, "callback received");

        let response = match self.run_callback(&ctx, data).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(chat_id, data, error = %e, "callback failed");
                self.count(&ctx, "handler_errors");
                HandlerResponse::failure(GENERIC_FAILURE)
            }
        };

        let toast = if response.success { "✅" } else { "⚠️" };
        if let Err(e) = self.messenger.answer_callback(&callback.id, Some(toast)).await {
            tracing::warn!(error = %e, "callback not acknowledged");
        }
        self.messenger
            .send(chat_id, &response.message, response.keyboard.as_ref())
            .await?;
        Ok(response)
    }

    async fn run_command(
        &self,
        ctx: &HandlerContext,
        command: SlashCommand,
        text: &str,
    ) -> Result<HandlerResponse> {
        tracing::debug!(chat_id = ctx.chat_id, ?command, "slash command");
        match command {
            SlashCommand::Cancel => {
                let state = self.load_state(ctx)?;
                let (_, action) = state.next(Event::Cancel);
                self.services.conversations.clear_state(ctx.chat_id)?;
                Ok(match action {
                    Action::Cancelled(true) => HandlerResponse::new("❌ Operación cancelada."),
                    _ => HandlerResponse::new("👌 No había nada pendiente."),
                })
            }
            SlashCommand::Inbox => self.inbox(),
            _ => {
                let Some(result) = command.as_result(text) else {
                    return Ok(HandlerResponse::failure(GENERIC_FAILURE));
                };
                // An explicit command abandons whatever flow was pending
                self.services.conversations.clear_state(ctx.chat_id)?;
                Ok(self.dispatch(ctx, &result).await)
            }
        }
    }

    async fn continue_conversation(
        &self,
        ctx: &HandlerContext,
        text: &str,
    ) -> Result<HandlerResponse> {
        let state = self.load_state(ctx)?;
        let previous = state.name();
        let (state, action) = state.next(Event::Message(text));
        tracing::debug!(chat_id = ctx.chat_id, from = previous, to = state.name(), "transition");

        let response = match action {
            Action::Classify(message) => {
                let history = self
                    .services
                    .conversations
                    .history(ctx.chat_id, HISTORY_CONTEXT)
                    .unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "history unavailable");
                        Vec::new()
                    });
                let result = self.classifier.classify(&message, &history).await;
                self.dispatch(ctx, &result).await
            }
            action => self.perform(ctx, action).await,
        };

        let mut response = response;
        let next = response.next_state.take().unwrap_or(state);
        self.store_state(ctx, &next)?;
        Ok(response)
    }

    async fn run_callback(&self, ctx: &HandlerContext, data: &str) -> Result<HandlerResponse> {
        let mut parts = data.split(':');
        let kind = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();
        let now = Utc::now();

        match kind {
            "task_complete" => {
                let (task, changed) = self.services.tasks.complete(id)?;
                let message = if changed {
                    format!("✅ Tarea completada: <b>{}</b>", quote(&task.title, 80))
                } else {
                    format!("👌 <b>{}</b> ya estaba completada.", quote(&task.title, 80))
                };
                Ok(HandlerResponse::new(message))
            }
            "reminder_done" => {
                let reminder = self.services.reminders.mark_sent(id, now)?;
                if let Some(task_id) = &reminder.task_id {
                    self.services.tasks.complete(task_id)?;
                }
                Ok(HandlerResponse::new(format!(
                    "✅ Hecho: <i>{}</i>",
                    quote(&reminder.message, 80)
                )))
            }
            "reminder_snooze" => {
                let minutes = match parts.next().map(str::parse::<i64>) {
                    None => handlers::SNOOZE_MINUTES,
                    Some(Ok(m)) if (1..=MAX_SNOOZE_MINUTES).contains(&m) => m,
                    Some(_) => {
                        tracing::warn!(reminder_id = id, data, "invalid snooze length");
                        return Ok(HandlerResponse::failure("⚠️ Tiempo para posponer no válido."));
                    }
                };
                match self.services.reminders.snooze(id, minutes, now) {
                    Ok(reminder) => {
                        let at = reminder.remind_at.with_timezone(ctx.now.offset());
                        Ok(HandlerResponse::new(format!(
                            "⏰ Pospuesto hasta las {}",
                            at.format("%H:%M")
                        )))
                    }
                    Err(Error::Validation(reason)) => {
                        tracing::info!(reminder_id = id, %reason, "snooze refused");
                        Ok(HandlerResponse::failure(
                            "⚠️ Ya no puedes posponer este recordatorio. Márcalo como hecho o descártalo.",
                        ))
                    }
                    Err(e) => Err(e),
                }
            }
            "reminder_dismiss" => {
                let reminder = self.services.reminders.cancel(id)?;
                Ok(HandlerResponse::new(format!(
                    "🗑️ Recordatorio descartado: <i>{}</i>",
                    quote(&reminder.message, 80)
                )))
            }
            "task_confirm" | "task_discard" => {
                let event = if kind == "task_confirm" {
                    Event::Confirm
                } else {
                    Event::Discard
                };
                let (state, action) = self.load_state(ctx)?.next(event);
                let mut response = self.perform(ctx, action).await;
                let next = response.next_state.take().unwrap_or(state);
                self.store_state(ctx, &next)?;
                Ok(response)
            }
            other => {
                tracing::warn!(callback = other, "unknown callback");
                Ok(HandlerResponse::failure("🤔 Acción desconocida."))
            }
        }
    }

    /// Carry out a follow-up action from the state machine
    async fn perform(&self, ctx: &HandlerContext, action: Action) -> HandlerResponse {
        let outcome = match action {
            Action::ScheduleReminder { text, when } => {
                handlers::schedule_reminder(&self.services, ctx, &text, &when).await
            }
            Action::LogWorkout(text) => handlers::log_workout(&self.services, ctx, &text).await,
            Action::LogMeal { meal, description } => {
                handlers::log_meal(&self.services, ctx, meal, &description).await
            }
            Action::CreateTask {
                title,
                priority,
                due_date,
            } => handlers::create_task(&self.services, ctx, &title, priority, due_date).await,
            Action::DiscardTask { title } => {
                tracing::info!(chat_id = ctx.chat_id, %title, "task draft discarded");
                Ok(HandlerResponse::new("🗑️ Tarea descartada"))
            }
            Action::Cancelled(_) => Ok(HandlerResponse::new("❌ Operación cancelada.")),
            Action::Expired => Ok(HandlerResponse::failure("⌛ Esta acción ya expiró.")),
            Action::Classify(text) => {
                let result = self.classifier.classify(&text, &[]).await;
                Ok(self.dispatch(ctx, &result).await)
            }
        };

        outcome.unwrap_or_else(|e| {
            tracing::error!(chat_id = ctx.chat_id, error = %e, "follow-up failed");
            self.count(ctx, "handler_errors");
            HandlerResponse::failure(GENERIC_FAILURE)
        })
    }

    async fn dispatch(&self, ctx: &HandlerContext, result: &IntentResult) -> HandlerResponse {
        self.count(ctx, &format!("intent.{}", result.intent));
        let dispatch = self.registry.dispatch(&self.services, ctx, result).await;
        if dispatch.error.is_some() {
            self.count(ctx, "handler_errors");
        }
        tracing::info!(
            chat_id = ctx.chat_id,
            intent = %result.intent,
            confidence = result.confidence,
            handler = dispatch.handler,
            success = dispatch.response.success,
            "dispatched"
        );
        dispatch.response
    }

    fn inbox(&self) -> Result<HandlerResponse> {
        let items = self.services.inbox.pending(INBOX_LIMIT)?;
        if items.is_empty() {
            return Ok(HandlerResponse::new("📥 Inbox vacío. ¡Todo procesado!"));
        }
        let total = self.services.inbox.pending_count()?;
        let mut message = format!("📥 <b>Inbox</b> ({total} por revisar)\n\n");
        for item in &items {
            let _ = writeln!(
                message,
                "• {} <i>{}</i>",
                short_date(item.created_at.date_naive()),
                quote(&item.content, 80)
            );
        }
        Ok(HandlerResponse::new(message))
    }

    fn load_state(&self, ctx: &HandlerContext) -> Result<ConversationState> {
        let stored = self
            .services
            .conversations
            .load_state::<ConversationState>(ctx.chat_id)?;
        Ok(stored.map_or(ConversationState::Idle, |(state, updated_at)| {
            state.resume(updated_at, ctx.now.with_timezone(&Utc))
        }))
    }

    fn store_state(&self, ctx: &HandlerContext, state: &ConversationState) -> Result<()> {
        if state.is_idle() {
            self.services.conversations.clear_state(ctx.chat_id)
        } else {
            tracing::debug!(chat_id = ctx.chat_id, state = state.name(), "awaiting follow-up");
            self.services
                .conversations
                .save_state(ctx.chat_id, state, ctx.now.with_timezone(&Utc))
        }
    }

    fn remember(&self, chat_id: i64, role: &str, content: &str) {
        if let Err(e) = self
            .services
            .conversations
            .push_history(chat_id, role, content, HISTORY_KEEP)
        {
            tracing::warn!(chat_id, error = %e, "history not saved");
        }
    }

    fn count(&self, ctx: &HandlerContext, key: &str) {
        if let Err(e) = self.services.metrics.increment(ctx.today(), key) {
            tracing::warn!(key, error = %e, "metric not recorded");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::cache::QueryCache;
    use crate::config::AssistantConfig;
    use crate::db::{TaskPriority, init_memory};
    use crate::parsing::RuleParser;
    use crate::telegram::InlineKeyboard;

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(i64, String, Option<InlineKeyboard>)>>,
    }

    #[async_trait]
    impl Messenger for Recorder {
        async fn send(
            &self,
            chat_id: i64,
            text: &str,
            keyboard: Option<&InlineKeyboard>,
        ) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((chat_id, text.to_string(), keyboard.cloned()));
            Ok(())
        }

        async fn answer_callback(&self, _callback_id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }
    }

    fn assistant() -> (Assistant, Arc<Recorder>) {
        let pool = init_memory().unwrap();
        let services = Services::new(
            pool,
            QueryCache::default(),
            AssistantConfig::default(),
            Arc::new(RuleParser),
        );
        let recorder = Arc::new(Recorder::default());
        (Assistant::new(services, recorder.clone()), recorder)
    }

    #[tokio::test]
    async fn reply_is_sent_and_counted() {
        let (assistant, recorder) = assistant();
        let response = assistant.handle_text(7, "hola", Some("Ana")).await.unwrap();

        assert!(response.message.contains("<b>Ana</b>"));
        assert_eq!(recorder.sent.lock().unwrap().len(), 1);
        let today = assistant.services().settings.now().date_naive();
        let metrics = assistant.services().metrics.day(today).unwrap();
        assert_eq!(metrics.get("messages"), Some(&1));
        assert_eq!(metrics.get("intent.greeting"), Some(&1));
    }

    #[tokio::test]
    async fn reminder_follow_up_uses_pending_text() {
        let (assistant, _) = assistant();
        let first = assistant
            .handle_text(7, "recuérdame pagar la renta", None)
            .await
            .unwrap();
        assert!(first.message.contains("No entendí cuándo"));

        let second = assistant.handle_text(7, "en 2 horas", None).await.unwrap();
        assert!(second.message.contains("Recordatorio creado"));
        let upcoming = assistant.services().reminders.upcoming(7, 5).unwrap();
        assert_eq!(upcoming[0].message, "pagar la renta");

        let state = assistant.services().conversations.load_state::<ConversationState>(7).unwrap();
        assert!(state.is_none());
    }

    #[tokio::test]
    async fn cancel_clears_pending_flow() {
        let (assistant, _) = assistant();
        assistant.handle_text(7, "recuérdame algo", None).await.unwrap();

        let response = assistant.handle_text(7, "/cancel", None).await.unwrap();
        assert_eq!(response.message, "❌ Operación cancelada.");
        let response = assistant.handle_text(7, "/cancel", None).await.unwrap();
        assert_eq!(response.message, "👌 No había nada pendiente.");
    }

    #[tokio::test]
    async fn confirm_creates_drafted_task() {
        let (assistant, _) = assistant();
        let ctx = HandlerContext::new(7, assistant.services().settings.now());
        let draft = ConversationState::AwaitingTaskConfirmation {
            title: "Llamar al banco".to_string(),
            priority: TaskPriority::High,
            due_date: None,
            duplicate_of: None,
        };
        assistant.store_state(&ctx, &draft).unwrap();

        let response = assistant.run_callback(&ctx, "task_confirm").await.unwrap();
        assert!(response.message.contains("Tarea creada"));
        let again = assistant.run_callback(&ctx, "task_confirm").await.unwrap();
        assert!(again.message.contains("expiró"));
    }

    #[tokio::test]
    async fn snooze_callback_rejects_bad_lengths() {
        let (assistant, _) = assistant();
        let ctx = HandlerContext::new(7, assistant.services().settings.now());
        let reminder = assistant
            .services()
            .reminders
            .create(7, "pagar la luz", &Utc::now(), TaskPriority::Normal, None)
            .unwrap();

        for minutes in ["99999999999999999", "-5", "0", "1441", "abc"] {
            let data = format!("reminder_snooze:{}:{minutes}", reminder.id);
            let response = assistant.run_callback(&ctx, &data).await.unwrap();
            assert!(!response.success, "{minutes} accepted");
            assert!(response.message.contains("no válido"));
        }
        let stored = assistant.services().reminders.get(&reminder.id).unwrap().unwrap();
        assert_eq!(stored.snooze_count, 0);

        let data = format!("reminder_snooze:{}:30", reminder.id);
        let response = assistant.run_callback(&ctx, &data).await.unwrap();
        assert!(response.message.contains("Pospuesto"));
    }

    #[tokio::test]
    async fn inbox_command_lists_items() {
        let (assistant, _) = assistant();
        let empty = assistant.handle_text(7, "/inbox", None).await.unwrap();
        assert!(empty.message.contains("Inbox vacío"));

        assistant.services().inbox.capture("revisar esto", "telegram", None).unwrap();
        let listed = assistant.handle_text(7, "/inbox", None).await.unwrap();
        assert!(listed.message.contains("revisar esto"));
    }
}
