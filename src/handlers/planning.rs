//! Planning handlers: today, tomorrow, week, prioritization and workload

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use serde_json::json;

use super::{
    HandlerContext, HandlerResponse, IntentHandler, Services, complete_buttons, quote, short_date,
    task_line,
};
use crate::db::{Task, TaskFilter, TaskPriority, TaskStatus};
use crate::intent::{IntentResult, UserIntent};
use crate::llm::CompletionRequest;
use crate::Result;

/// Spanish weekday abbreviation
pub(crate) const fn weekday_short(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Lun",
        Weekday::Tue => "Mar",
        Weekday::Wed => "Mié",
        Weekday::Thu => "Jue",
        Weekday::Fri => "Vie",
        Weekday::Sat => "Sáb",
        Weekday::Sun => "Dom",
    }
}

/// Energy level inferred from the message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Energy {
    Low,
    Normal,
    High,
}

impl Energy {
    fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        if ["cansado", "cansada", "poco", "ligero", "agotado"]
            .iter()
            .any(|w| lower.contains(w))
        {
            Self::Low
        } else if ["motivado", "motivada", "energía", "productivo"]
            .iter()
            .any(|w| lower.contains(w))
        {
            Self::High
        } else {
            Self::Normal
        }
    }

    /// Priority slots for the plan
    const fn slots(self) -> usize {
        match self {
            Self::Low => 2,
            Self::Normal => 3,
            Self::High => 5,
        }
    }
}

/// Tasks that belong to `day`: due then, overdue, or marked for today
fn due_by(tasks: &[Task], day: NaiveDate) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|t| {
            t.due_date.is_some_and(|d| d <= day)
                || matches!(t.status, TaskStatus::Today | TaskStatus::Doing)
        })
        .collect()
}

/// One-line suggestion from the LLM, if configured and reachable
async fn suggestion(services: &Services, prompt: String) -> Option<String> {
    let llm = services.llm.as_ref()?;
    match llm.complete(&CompletionRequest::text(prompt)).await {
        Ok(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Err(e) => {
            tracing::warn!(error = %e, "planning suggestion unavailable");
            None
        }
    }
}

pub struct PlanTodayHandler;

#[async_trait]
impl IntentHandler for PlanTodayHandler {
    fn name(&self) -> &'static str {
        "plan_today"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::PlanToday
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = ctx.today();
        let pending = services.tasks.list(&TaskFilter::pending())?;
        let focus = due_by(&pending, today);
        let slots = Energy::detect(&result.raw_message).slots();

        let mut message = String::from("🎯 <b>Plan para hoy</b>\n\n");
        if focus.is_empty() {
            message.push_str("No tienes tareas para hoy.\n");
            if let Some(next) = pending.first() {
                let _ = writeln!(
                    message,
                    "\n💡 Podrías avanzar en: <i>{}</i>",
                    quote(&next.title, 60)
                );
            }
        } else {
            message.push_str("<b>Prioridades:</b>\n");
            for task in focus.iter().take(slots) {
                let _ = writeln!(message, "{}", task_line(task, today));
            }
            if focus.len() > slots {
                let _ = writeln!(message, "\n<i>+{} más si hay tiempo</i>", focus.len() - slots);
            }
        }

        let midnight = today
            .and_hms_opt(0, 0, 0)
            .and_then(|dt| dt.and_local_timezone(*ctx.now.offset()).single());
        let reminders = match midnight {
            Some(start) => {
                let from = start.with_timezone(&Utc);
                services.reminders.between(from, from + Duration::days(1))?
            }
            None => Vec::new(),
        };
        if !reminders.is_empty() {
            message.push_str("\n<b>⏰ Recordatorios:</b>\n");
            for reminder in &reminders {
                let at = reminder.remind_at.with_timezone(ctx.now.offset());
                let _ = writeln!(
                    message,
                    "• {} {}",
                    at.format("%H:%M"),
                    quote(&reminder.message, 50)
                );
            }
        }

        Ok(HandlerResponse::new(message)
            .with_keyboard(complete_buttons(focus.iter().copied().take(slots)))
            .with_data(json!({ "tasks": focus.len(), "reminders": reminders.len() })))
    }
}

pub struct PlanTomorrowHandler;

#[async_trait]
impl IntentHandler for PlanTomorrowHandler {
    fn name(&self) -> &'static str {
        "plan_tomorrow"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::PlanTomorrow
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let tomorrow = ctx.today() + Duration::days(1);
        let pending = services.tasks.list(&TaskFilter::pending())?;
        let energy = Energy::detect(&result.raw_message);

        // Due by tomorrow first, then the most important undated work
        let mut plan: Vec<&Task> = due_by(&pending, tomorrow);
        plan.extend(
            pending
                .iter()
                .filter(|t| t.due_date.is_none() && t.priority <= TaskPriority::High)
                .filter(|t| !matches!(t.status, TaskStatus::Today | TaskStatus::Doing)),
        );
        let (priority, secondary) = plan.split_at(plan.len().min(energy.slots()));

        let mut message = String::from("🌅 <b>Plan para mañana</b>\n\n");
        if priority.is_empty() {
            message.push_str(
                "No hay nada urgente para mañana. ¡Buen momento para avanzar proyectos!\n",
            );
        } else {
            message.push_str("<b>🎯 Prioridades:</b>\n");
            for task in priority {
                let _ = writeln!(message, "  • {}", task_line(task, ctx.today()));
            }
        }
        if !secondary.is_empty() {
            message.push_str("\n<b>📋 Si hay tiempo:</b>\n");
            for task in secondary.iter().take(3) {
                let _ = writeln!(message, "  • {}", quote(&task.title, 50));
            }
        }

        if !priority.is_empty() {
            let titles: Vec<&str> = priority.iter().map(|t| t.title.as_str()).collect();
            let prompt = format!(
                "Mañana tengo estas prioridades: {}. En una sola frase en español, dame un consejo práctico para organizar el día.",
                titles.join("; ")
            );
            if let Some(tip) = suggestion(services, prompt).await {
                let _ = write!(message, "\n<b>💡 Sugerencia:</b>\n{}\n", quote(&tip, 300));
            }
        }
        if energy == Energy::Low {
            message.push_str("\n<i>🔋 Plan ligero: descansa bien esta noche.</i>");
        }

        Ok(HandlerResponse::new(message).with_data(json!({
            "priority": priority.len(),
            "secondary": secondary.len(),
        })))
    }
}

pub struct PlanWeekHandler;

#[async_trait]
impl IntentHandler for PlanWeekHandler {
    fn name(&self) -> &'static str {
        "plan_week"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::PlanWeek
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = ctx.today();
        let week_end = today + Duration::days(6);
        let pending = services.tasks.list(&TaskFilter::pending())?;

        let mut by_day: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
        for task in &pending {
            if let Some(due) = task.due_date.filter(|d| *d >= today && *d <= week_end) {
                let entry = by_day.entry(due).or_default();
                entry.0 += 1;
                if task.priority == TaskPriority::Urgent {
                    entry.1 += 1;
                }
            }
        }

        let mut message = format!(
            "📊 <b>Resumen semanal</b>\n<i>{} al {}</i>\n\n<b>Carga por día:</b>\n",
            short_date(today),
            short_date(week_end)
        );
        for offset in 0..7 {
            let day = today + Duration::days(offset);
            let (count, urgent) = by_day.get(&day).copied().unwrap_or_default();
            let bar = if count == 0 { "·".to_string() } else { "█".repeat(count.min(5)) };
            let urgent = if urgent > 0 { format!(" 🔥{urgent}") } else { String::new() };
            let _ = writeln!(message, "{}: {bar} ({count}){urgent}", weekday_short(day.weekday()));
        }

        let deadlines: Vec<&Task> = pending
            .iter()
            .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= week_end))
            .collect();
        if !deadlines.is_empty() {
            message.push_str("\n<b>📅 Próximos deadlines:</b>\n");
            for task in deadlines.iter().take(5) {
                if let Some(due) = task.due_date {
                    let title = quote(&task.title, 30);
                    let _ = writeln!(message, "  • {}: {title}", short_date(due));
                }
            }
        }

        let overdue = pending.iter().filter(|t| t.is_overdue(today)).count();
        let heavy_days = by_day.values().filter(|(n, _)| *n > 5).count();
        if overdue > 0 || heavy_days > 0 {
            message.push_str("\n<b>⚠️ Alertas:</b>\n");
            if overdue > 0 {
                let _ = writeln!(message, "  • {overdue} tareas vencidas");
            }
            if heavy_days > 0 {
                let _ = writeln!(message, "  • {heavy_days} días con más de 5 tareas");
            }
        }

        Ok(HandlerResponse::new(message).with_data(json!({
            "deadlines": deadlines.len(),
            "overdue": overdue,
        })))
    }
}

/// Orders pending work by priority, then due date
pub struct PrioritizeHandler;

#[async_trait]
impl IntentHandler for PrioritizeHandler {
    fn name(&self) -> &'static str {
        "prioritize"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Prioritize
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = ctx.today();
        let mut pending = services.tasks.list(&TaskFilter::pending())?;
        pending.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        let Some(first) = pending.first() else {
            return Ok(HandlerResponse::new(
                "🎉 No tienes tareas pendientes. ¡Nada que priorizar!",
            ));
        };

        let mut message = String::from("🤔 <b>Orden sugerido</b>\n\n");
        for (i, task) in pending.iter().take(5).enumerate() {
            let _ = writeln!(message, "{}. {}", i + 1, task_line(task, today));
        }
        let _ = write!(message, "\n👉 Empieza por: <b>{}</b>", quote(&first.title, 60));

        Ok(HandlerResponse::new(message)
            .with_keyboard(complete_buttons(pending.iter().take(1)))
            .with_data(json!({ "first": first.id })))
    }
}

pub struct WorkloadCheckHandler;

#[async_trait]
impl IntentHandler for WorkloadCheckHandler {
    fn name(&self) -> &'static str {
        "workload_check"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::WorkloadCheck
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
        let count = |p: TaskPriority| pending.iter().filter(|t| t.priority == p).count();
        let urgent = count(TaskPriority::Urgent);

        let mut message = format!(
            "📊 <b>Tu carga de trabajo</b>\n\n📋 <b>Total pendiente:</b> {} tareas\n",
            pending.len()
        );
        if overdue > 0 {
            let _ = writeln!(message, "⚠️ <b>Vencidas:</b> {overdue}");
        }
        let _ = write!(
            message,
            "\n<b>Por prioridad:</b>\n🔴 Urgente: {urgent}\n🟠 Alta: {}\n🟡 Normal: {}\n🟢 Baja: {}\n",
            count(TaskPriority::High),
            count(TaskPriority::Normal),
            count(TaskPriority::Low)
        );

        let week_end = today + Duration::days(7);
        let deadlines: Vec<&Task> = pending
            .iter()
            .filter(|t| t.due_date.is_some_and(|d| d >= today && d <= week_end))
            .collect();
        if !deadlines.is_empty() {
            message.push_str("\n<b>Próximos deadlines:</b>\n");
            for task in deadlines.iter().take(5) {
                if let Some(due) = task.due_date {
                    let title = quote(&task.title, 25);
                    let _ = writeln!(message, "  • {}: {title}", short_date(due));
                }
            }
        }

        Ok(HandlerResponse::new(message).with_data(json!({
            "pending": pending.len(),
            "overdue": overdue,
            "urgent": urgent,
        })))
    }
}
