//! Greeting, help and status

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote};
use crate::db::TaskFilter;
use crate::intent::{IntentResult, UserIntent};
use crate::Result;

const HELP: &str = "🤖 <b>¿Qué puedo hacer?</b>

<b>📋 Tareas</b>
• \"Crear tarea: revisar el informe\"
• \"Terminé el informe\" · \"Pasa el informe al viernes\"
• /today para ver las tareas de hoy

<b>📅 Planificación</b>
• \"¿Qué hago hoy?\" · \"Planifica mañana\"
• /week para la semana · \"¿Qué es lo más importante?\"

<b>💰 Finanzas</b>
• \"Gasté $250 en comida\"
• \"¿Vale la pena comprar unos tenis de $2,000?\"
• \"¿Cuánto debo?\"

<b>🏋️ Fitness</b>
• \"Hoy hice pierna, sentadilla 4x8 100kg\"
• \"Desayuné avena con fruta\"

<b>💡 Captura</b>
• \"Idea: app de recetas\" · \"Nota: la reunión se movió\"
• \"Recuérdame pagar la luz mañana a las 10\"
• /inbox para ver lo pendiente de revisar

/cancel cancela cualquier flujo pendiente.";

/// Salutation for the local hour
const fn salutation(hour: u32) -> &'static str {
    if hour < 12 {
        "Buenos días"
    } else if hour < 19 {
        "Buenas tardes"
    } else {
        "Buenas noches"
    }
}

pub struct GreetingHandler;

#[async_trait]
impl IntentHandler for GreetingHandler {
    fn name(&self) -> &'static str {
        "greeting"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Greeting
    }

    async fn handle(
        &self,
        _services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let greeting = salutation(ctx.hour());
        let message = match &ctx.user_name {
            Some(name) => format!(
                "{greeting}, <b>{}</b>! ¿En qué te puedo ayudar?\n\nEscribe /help para ver lo que puedo hacer.",
                quote(name, 40)
            ),
            None => format!(
                "{greeting}! ¿En qué te puedo ayudar?\n\nEscribe /help para ver lo que puedo hacer."
            ),
        };
        Ok(HandlerResponse::new(message))
    }
}

pub struct HelpHandler;

#[async_trait]
impl IntentHandler for HelpHandler {
    fn name(&self) -> &'static str {
        "help"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Help
    }

    async fn handle(
        &self,
        _services: &Services,
        _ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        Ok(HandlerResponse::new(HELP))
    }
}

pub struct StatusHandler;

#[async_trait]
impl IntentHandler for StatusHandler {
    fn name(&self) -> &'static str {
        "status"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Status
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = ctx.today();
        let pending = services.tasks.list(&TaskFilter::pending())?;
        let overdue = pending.iter().filter(|t| t.is_overdue(today)).count();
        let inbox = services.inbox.pending_count()?;
        let reminders = services.reminders.upcoming(ctx.chat_id, 50)?.len();
        let projects = services.projects.list(true)?.len();
        let messages = services
            .metrics
            .day(today)?
            .get("messages")
            .copied()
            .unwrap_or(0);
        let cache = services.cache.stats();

        let mut message = String::from("⚙️ <b>Estado del Sistema</b>\n\n");
        let _ = writeln!(message, "📋 Tareas pendientes: {}", pending.len());
        if overdue > 0 {
            let _ = writeln!(message, "⚠️ Vencidas: {overdue}");
        }
        let _ = writeln!(message, "⏰ Recordatorios: {reminders}");
        let _ = writeln!(message, "📁 Proyectos activos: {projects}");
        let _ = writeln!(message, "📥 Inbox por revisar: {inbox}");
        let _ = writeln!(message, "💬 Mensajes hoy: {messages}");
        let _ = write!(
            message,
            "\n🧠 IA: {}\n🔎 Duplicados: {}",
            if services.llm.is_some() { "activa" } else { "reglas" },
            if services.retriever.is_some() { "activo" } else { "inactivo" }
        );

        Ok(HandlerResponse::new(message).with_data(json!({
            "pending_tasks": pending.len(),
            "overdue": overdue,
            "inbox": inbox,
            "reminders": reminders,
            "projects": projects,
            "messages_today": messages,
            "cache_hits": cache.hits,
            "cache_misses": cache.misses,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[test]
    fn salutation_by_hour() {
        assert_eq!(salutation(7), "Buenos días");
        assert_eq!(salutation(12), "Buenas tardes");
        assert_eq!(salutation(18), "Buenas tardes");
        assert_eq!(salutation(19), "Buenas noches");
    }

    #[tokio::test]
    async fn greeting_uses_name() {
        let ctx = ctx().with_user_name("Ana");
        let result = IntentResult::new(UserIntent::Greeting, 0.9, "hola");
        let response = GreetingHandler.handle(&services(), &ctx, &result).await.unwrap();
        assert!(response.message.starts_with("Buenos días, <b>Ana</b>!"));
    }

    #[tokio::test]
    async fn status_counts() {
        let services = services();
        services.inbox.capture("algo", "telegram", None).unwrap();
        let result = IntentResult::new(UserIntent::Status, 0.9, "/status");

        let response = StatusHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.message.contains("Estado del Sistema"));
        let data = response.data.unwrap();
        assert_eq!(data["inbox"], 1);
        assert_eq!(data["pending_tasks"], 0);
    }
}
