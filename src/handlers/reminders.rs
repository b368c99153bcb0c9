//! Reminder handlers

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote, subject};
use crate::conversation::ConversationState;
use crate::db::{Reminder, TaskPriority};
use crate::intent::{IntentResult, UserIntent};
use crate::telegram::{InlineButton, InlineKeyboard};
use crate::Result;

const TIME_PROMPT: &str = "🤔 No entendí cuándo quieres el recordatorio.\n\nEjemplos:\n• \"en 2 horas\"\n• \"mañana a las 10\"\n• \"el viernes a las 3pm\"\n\nEscribe /cancel para cancelar.";

/// Minutes added by the snooze button
pub const SNOOZE_MINUTES: i64 = 15;

const UPCOMING_LIMIT: usize = 10;

/// Done / snooze / dismiss buttons for a delivered reminder
#[must_use]
pub fn reminder_keyboard(reminder: &Reminder) -> InlineKeyboard {
    let mut row = vec![InlineButton::new(
        "✅ Hecho",
        format!("reminder_done:{}", reminder.id),
    )];
    if reminder.can_snooze() {
        row.push(InlineButton::new(
            format!("⏰ {SNOOZE_MINUTES} min"),
            format!("reminder_snooze:{}:{SNOOZE_MINUTES}", reminder.id),
        ));
    }
    row.push(InlineButton::new(
        "❌ Descartar",
        format!("reminder_dismiss:{}", reminder.id),
    ));
    InlineKeyboard::new().row(row)
}

/// Schedule `text` at the time described by `when`
///
/// When `when` holds no usable time the reply asks for one and keeps the
/// chat waiting for it.
///
/// # Errors
///
/// Returns error if the reminder cannot be stored
pub(crate) async fn schedule_reminder(
    services: &Services,
    ctx: &HandlerContext,
    text: &str,
    when: &str,
) -> Result<HandlerResponse> {
    let text = text.trim();
    let Some(remind_at) = services.parser.when(when, ctx.now) else {
        return Ok(HandlerResponse::failure(TIME_PROMPT).with_state(
            ConversationState::AwaitingReminderTime {
                text: text.to_string(),
            },
        ));
    };

    let stripped = services.parser.strip_when(text);
    let message = if stripped.is_empty() { text } else { stripped.as_str() };
    let reminder = services.reminders.create(
        ctx.chat_id,
        message,
        &remind_at,
        services.parser.priority(text).unwrap_or_default(),
        None,
    )?;
    tracing::info!(
        reminder_id = %reminder.id,
        chat_id = ctx.chat_id,
        remind_at = %remind_at,
        "reminder created"
    );

    Ok(HandlerResponse::new(format!(
        "✅ <b>Recordatorio creado</b>\n\n<i>{}</i>\n\n⏰ Te recordaré: {}",
        quote(&reminder.message, 100),
        remind_at.format("%H:%M del %d/%m")
    ))
    .with_data(json!({ "reminder_id": reminder.id, "remind_at": remind_at.to_rfc3339() }))
    .with_state(ConversationState::Idle))
}

pub struct ReminderCreateHandler;

#[async_trait]
impl IntentHandler for ReminderCreateHandler {
    fn name(&self) -> &'static str {
        "reminder_create"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ReminderCreate
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let text = subject(result, "reminder");
        if text.is_empty() {
            return Ok(HandlerResponse::failure(
                "🤔 ¿Qué quieres que te recuerde?",
            ));
        }

        let when = ["time", "when"]
            .iter()
            .find_map(|key| result.entity(key))
            .unwrap_or(&result.raw_message);
        schedule_reminder(services, ctx, &text, when).await
    }
}

pub struct ReminderQueryHandler;

#[async_trait]
impl IntentHandler for ReminderQueryHandler {
    fn name(&self) -> &'static str {
        "reminder_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ReminderQuery
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let reminders = services.reminders.upcoming(ctx.chat_id, UPCOMING_LIMIT)?;
        if reminders.is_empty() {
            return Ok(HandlerResponse::new(
                "⏰ No tienes recordatorios pendientes.\n\nCrea uno con: 'Recuérdame ... mañana a las 10'",
            )
            .with_data(json!({ "count": 0 })));
        }

        let tz = ctx.now.offset();
        let mut message = String::from("⏰ <b>Próximos recordatorios</b>\n\n");
        for reminder in &reminders {
            let local = reminder.remind_at.with_timezone(tz);
            let _ = write!(
                message,
                "• {} <i>{}</i>",
                local.format("%d/%m %H:%M"),
                quote(&reminder.message, 60)
            );
            if reminder.snooze_count > 0 {
                let _ = write!(message, " (pospuesto {}x)", reminder.snooze_count);
            }
            if reminder.priority == TaskPriority::Urgent {
                message.push_str(" 🔴");
            }
            message.push('\n');
        }

        Ok(HandlerResponse::new(message).with_data(json!({ "count": reminders.len() })))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[tokio::test]
    async fn relative_time_is_exact() {
        let services = services();
        let ctx = ctx();

        let response = schedule_reminder(&services, &ctx, "llamar a mamá", "en 2 horas")
            .await
            .unwrap();
        assert!(response.success);
        assert!(response.message.contains("Recordatorio creado"));

        let upcoming = services.reminders.upcoming(ctx.chat_id, 5).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].remind_at, ctx.now + Duration::hours(2));
    }

    #[tokio::test]
    async fn relative_time_keeps_sub_second_now() {
        let services = services();
        let mut ctx = ctx();
        ctx.now += Duration::nanoseconds(123_456_789);

        schedule_reminder(&services, &ctx, "llamar a mamá", "en 2 horas")
            .await
            .unwrap();

        let upcoming = services.reminders.upcoming(ctx.chat_id, 5).unwrap();
        assert_eq!(upcoming[0].remind_at, ctx.now + Duration::hours(2));
    }

    #[tokio::test]
    async fn missing_time_waits_for_it() {
        let services = services();
        let result = IntentResult::new(UserIntent::ReminderCreate, 0.95, "recuérdame pagar la luz")
            .with_entity("reminder", "pagar la luz");

        let response = ReminderCreateHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(!response.success);
        assert!(response.message.contains("No entendí cuándo"));
        assert_eq!(
            response.next_state,
            Some(ConversationState::AwaitingReminderTime {
                text: "pagar la luz".to_string()
            })
        );
        assert!(services.reminders.upcoming(42, 5).unwrap().is_empty());
    }

    #[tokio::test]
    async fn time_read_from_message() {
        let services = services();
        let result = IntentResult::new(
            UserIntent::ReminderCreate,
            0.95,
            "recuérdame sacar la basura mañana a las 8",
        )
        .with_entity("reminder", "sacar la basura mañana a las 8");

        let response = ReminderCreateHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.success);
        assert!(response.message.contains("08:00 del 11/03"));

        let upcoming = services.reminders.upcoming(42, 5).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].message, "sacar la basura");
    }

    #[tokio::test]
    async fn time_only_text_is_kept() {
        let services = services();
        let ctx = ctx();
        schedule_reminder(&services, &ctx, "mañana a las 8", "mañana a las 8")
            .await
            .unwrap();

        let upcoming = services.reminders.upcoming(ctx.chat_id, 5).unwrap();
        assert_eq!(upcoming[0].message, "mañana a las 8");
    }

    #[tokio::test]
    async fn query_lists_upcoming() {
        let services = services();
        let ctx = ctx();
        schedule_reminder(&services, &ctx, "tomar agua", "en 30 minutos")
            .await
            .unwrap();

        let result = IntentResult::new(UserIntent::ReminderQuery, 0.9, "mis recordatorios");
        let response = ReminderQueryHandler.handle(&services, &ctx, &result).await.unwrap();
        assert!(response.message.contains("10/03 10:30"));
        assert!(response.message.contains("tomar agua"));
    }

    #[test]
    fn keyboard_drops_snooze_when_exhausted() {
        let services = services();
        let reminder = services
            .reminders
            .create(1, "x", &ctx().now, TaskPriority::Normal, None)
            .unwrap();
        let callbacks: Vec<String> = reminder_keyboard(&reminder)
            .callbacks()
            .map(str::to_string)
            .collect();
        assert_eq!(
            callbacks,
            vec![
                format!("reminder_done:{}", reminder.id),
                format!("reminder_snooze:{}:15", reminder.id),
                format!("reminder_dismiss:{}", reminder.id),
            ]
        );

        let mut exhausted = reminder;
        exhausted.snooze_count = crate::db::MAX_SNOOZES;
        assert_eq!(reminder_keyboard(&exhausted).callbacks().count(), 2);
    }
}
