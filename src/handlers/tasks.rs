//! Task handlers

use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;

use super::{
    HandlerContext, HandlerResponse, IntentHandler, Services, complete_buttons, quote, short_date,
    subject, task_line,
};
use crate::conversation::ConversationState;
use crate::db::task::normalize_title;
use crate::db::{NewTask, Task, TaskFilter, TaskPriority, TaskStatus};
use crate::intent::{IntentResult, UserIntent};
use crate::rag::TASK_ENTITY;
use crate::telegram::{InlineButton, InlineKeyboard};
use crate::Result;

/// Tasks shown with buttons at most
const MAX_BUTTONS: usize = 5;

const DELETE_WORDS: [&str; 5] = ["elimina", "borra", "quita", "cancela", "descarta"];

fn not_found(name: &str) -> HandlerResponse {
    HandlerResponse::new(format!(
        "🔍 No encontré tareas que coincidan con:\n<i>{}</i>\n\nUsa /today para ver tus tareas.",
        quote(name, 50)
    ))
}

fn several(matches: &[Task], name: &str) -> HandlerResponse {
    HandlerResponse::new(format!(
        "📋 Encontré {} tareas que coinciden con \"{}\".\n\nSelecciona la que quieres marcar como completada:",
        matches.len(),
        quote(name, 30)
    ))
    .with_keyboard(complete_buttons(matches.iter().take(MAX_BUTTONS)))
}

fn resolve_priority(services: &Services, result: &IntentResult) -> Option<TaskPriority> {
    result
        .entity("priority")
        .and_then(|p| p.parse().ok())
        .or_else(|| services.parser.priority(&result.raw_message))
}

fn resolve_date(
    services: &Services,
    ctx: &HandlerContext,
    result: &IntentResult,
) -> Option<NaiveDate> {
    let today = ctx.today();
    ["due_date", "date"]
        .iter()
        .find_map(|key| result.entity(key))
        .and_then(|v| services.parser.due_date(v, today))
        .or_else(|| services.parser.due_date(&result.raw_message, today))
}

/// Status implied by phrases like "ya terminé" or "empecé"
fn status_from_text(text: &str) -> Option<TaskStatus> {
    const RULES: [(&[&str], TaskStatus); 5] = [
        (
            &["terminé", "termine", "completé", "acabé", "acabe", "ya quedó", "hecha", "lista"],
            TaskStatus::Done,
        ),
        (
            &["empecé", "empece", "empezando", "trabajando en", "comencé", "inicié"],
            TaskStatus::Doing,
        ),
        (&["pausa", "pausé", "pospon"], TaskStatus::Paused),
        (&["bloquead", "atorad", "esperando"], TaskStatus::Blocked),
        (&["cancel"], TaskStatus::Cancelled),
    ];

    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|(_, status)| *status)
}

/// Best pending task similar enough to `title` to be a duplicate, with its score
async fn find_duplicate(services: &Services, title: &str) -> Option<(Task, f32)> {
    let retriever = services.retriever.as_ref()?;
    let candidates = match retriever.find_duplicates(TASK_ENTITY, title).await {
        Ok(candidates) => candidates,
        Err(e) => {
            tracing::warn!(error = %e, "duplicate check skipped");
            return None;
        }
    };

    for candidate in candidates {
        match services.tasks.get(&candidate.entity_id) {
            Ok(Some(task)) if task.is_pending() => return Some((task, candidate.score)),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    task_id = %candidate.entity_id,
                    error = %e,
                    "duplicate lookup failed"
                );
            }
        }
    }
    None
}

/// Store a task, index it for duplicate detection and build the reply
///
/// # Errors
///
/// Returns error if the title is empty or the insert fails
pub(crate) async fn create_task(
    services: &Services,
    ctx: &HandlerContext,
    title: &str,
    priority: TaskPriority,
    due_date: Option<NaiveDate>,
) -> Result<HandlerResponse> {
    let task = services.tasks.create(
        &NewTask::new(title)
            .with_priority(priority)
            .with_due_date(due_date),
    )?;

    if let Some(retriever) = &services.retriever {
        if let Err(e) = retriever.index(TASK_ENTITY, &task.id, &task.title).await {
            tracing::warn!(task_id = %task.id, error = %e, "task not indexed");
        }
    }
    tracing::info!(
        task_id = %task.id,
        chat_id = ctx.chat_id,
        priority = task.priority.as_str(),
        "task created"
    );

    let mut message = format!(
        "✅ <b>Tarea creada</b>\n\n<i>{}</i>\n\n{} Prioridad: {}\n",
        quote(&task.title, 100),
        task.priority.emoji(),
        task.priority.label()
    );
    if let Some(due) = task.due_date {
        let _ = writeln!(message, "📅 Fecha: {}", short_date(due));
    }

    Ok(HandlerResponse::new(message)
        .with_keyboard(complete_buttons([&task]))
        .with_data(json!({ "task_id": task.id })))
}

pub struct TaskCreateHandler;

#[async_trait]
impl IntentHandler for TaskCreateHandler {
    fn name(&self) -> &'static str {
        "task_create"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::TaskCreate
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let Ok(title) = normalize_title(&subject(result, "task")) else {
            return Ok(HandlerResponse::failure(
                "🤔 ¿Qué tarea quieres crear?\n\nEjemplo: <i>Crear tarea: revisar el informe</i>",
            ));
        };
        let priority = resolve_priority(services, result).unwrap_or_default();
        let due_date = resolve_date(services, ctx, result);

        if let Some((existing, score)) = find_duplicate(services, &title).await {
            tracing::info!(duplicate_of = %existing.id, score, "possible duplicate task");
            let keyboard = InlineKeyboard::new().row([
                InlineButton::new("✅ Crear de todos modos", "task_confirm"),
                InlineButton::new("🗑️ Descartar", "task_discard"),
            ]);
            let message = format!(
                "⚠️ <b>Posible duplicado</b>\n\nYa tienes una tarea parecida ({:.0}%):\n<i>{}</i>\n\n¿Crear <i>{}</i> de todos modos?",
                score * 100.0,
                quote(&existing.title, 60),
                quote(&title, 60)
            );
            return Ok(HandlerResponse::new(message)
                .with_keyboard(keyboard)
                .with_data(json!({ "duplicate_of": existing.id, "score": score }))
                .with_state(ConversationState::AwaitingTaskConfirmation {
                    title,
                    priority,
                    due_date,
                    duplicate_of: Some(existing.id),
                }));
        }

        create_task(services, ctx, &title, priority, due_date).await
    }
}

pub struct TaskQueryHandler;

#[async_trait]
impl IntentHandler for TaskQueryHandler {
    fn name(&self) -> &'static str {
        "task_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::TaskQuery
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let today = ctx.today();
        let pending = services.tasks.list(&TaskFilter::pending())?;
        let focus: Vec<&Task> = pending
            .iter()
            .filter(|t| {
                matches!(t.status, TaskStatus::Today | TaskStatus::Doing)
                    || t.due_date.is_some_and(|d| d <= today)
            })
            .collect();

        let mut message = String::from("📋 <b>Tareas de hoy</b>\n\n");
        if focus.is_empty() {
            message.push_str("No hay tareas programadas para hoy.");
            if !pending.is_empty() {
                let _ = write!(message, "\n\nTienes {} tareas pendientes en total.", pending.len());
            }
            return Ok(HandlerResponse::new(message).with_data(json!({ "count": 0 })));
        }

        for task in &focus {
            let _ = writeln!(message, "{}", task_line(task, today));
        }
        let overdue = focus.iter().filter(|t| t.is_overdue(today)).count();
        if overdue > 0 {
            let _ = write!(message, "\n⚠️ {overdue} vencidas");
        }

        Ok(HandlerResponse::new(message)
            .with_keyboard(complete_buttons(focus.iter().copied().take(MAX_BUTTONS)))
            .with_data(json!({ "count": focus.len(), "overdue": overdue })))
    }
}

pub struct TaskUpdateHandler;

#[async_trait]
impl IntentHandler for TaskUpdateHandler {
    fn name(&self) -> &'static str {
        "task_update"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::TaskUpdate
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let name = subject(result, "task");
        let matches = services.tasks.find_pending_by_title(&name)?;
        let task = match matches.as_slice() {
            [] => return Ok(not_found(&name)),
            [task] => task,
            _ => return Ok(several(&matches, &name)),
        };

        let status = result.entity("status").and_then(|s| s.parse::<TaskStatus>().ok());
        let priority = resolve_priority(services, result);

        if status.is_none() && priority.is_none() {
            return Ok(HandlerResponse::new(format!(
                "📋 <b>Actualizar tarea</b>\n\n<i>{}</i>\n\n¿Qué deseas hacer?",
                quote(&task.title, 60)
            ))
            .with_keyboard(complete_buttons([task])));
        }

        let mut updated = task.clone();
        if let Some(status) = status {
            updated = match status {
                TaskStatus::Done | TaskStatus::Cancelled => {
                    services.tasks.settle(&task.id, status)?.0
                }
                other => services.tasks.update_status(&task.id, other)?,
            };
        }
        if let Some(priority) = priority {
            updated = services.tasks.update_priority(&task.id, priority)?;
        }

        Ok(HandlerResponse::new(format!(
            "✏️ <b>Tarea actualizada</b>\n\n<i>{}</i>\n\n{} {}\n{} Prioridad: {}",
            quote(&updated.title, 60),
            updated.status.emoji(),
            updated.status.label(),
            updated.priority.emoji(),
            updated.priority.label()
        ))
        .with_data(json!({ "task_id": updated.id })))
    }
}

/// Completes (or, with delete words, cancels) a task
pub struct TaskDeleteHandler;

#[async_trait]
impl IntentHandler for TaskDeleteHandler {
    fn name(&self) -> &'static str {
        "task_delete"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::TaskDelete
    }

    fn min_confidence(&self) -> f32 {
        0.5
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let name = subject(result, "task");
        let matches = services.tasks.find_pending_by_title(&name)?;
        let task = match matches.as_slice() {
            [] => return Ok(not_found(&name)),
            [task] => task,
            _ => return Ok(several(&matches, &name)),
        };

        let lower = result.raw_message.to_lowercase();
        let delete = DELETE_WORDS.iter().any(|w| lower.contains(w));

        if delete {
            let (task, _) = services.tasks.settle(&task.id, TaskStatus::Cancelled)?;
            if let Some(retriever) = &services.retriever {
                if let Err(e) = retriever.remove(TASK_ENTITY, &task.id) {
                    tracing::warn!(task_id = %task.id, error = %e, "cancelled task still indexed");
                }
            }
            return Ok(HandlerResponse::new(format!(
                "🗑️ <b>Tarea eliminada</b>\n\n<s>{}</s>",
                quote(&task.title, 60)
            ))
            .with_data(json!({ "task_id": task.id, "status": task.status })));
        }

        let (task, changed) = services.tasks.complete(&task.id)?;
        Ok(HandlerResponse::new(format!(
            "✅ <b>Tarea completada</b>\n\n<s>{}</s>",
            quote(&task.title, 60)
        ))
        .with_data(json!({ "task_id": task.id, "changed": changed })))
    }
}

pub struct TaskStatusChangeHandler;

#[async_trait]
impl IntentHandler for TaskStatusChangeHandler {
    fn name(&self) -> &'static str {
        "task_status_change"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::TaskStatusChange
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let status = result
            .entity("status")
            .and_then(|s| s.parse::<TaskStatus>().ok())
            .or_else(|| status_from_text(&result.raw_message));
        let Some(status) = status else {
            return Ok(HandlerResponse::failure(
                "🤔 ¿A qué estado la muevo?\n\nPor ejemplo: en progreso, pausada, bloqueada o completada.",
            ));
        };

        let name = subject(result, "task");
        let matches = services.tasks.find_pending_by_title(&name)?;
        let task = match matches.as_slice() {
            [] => return Ok(not_found(&name)),
            [task] => task,
            _ => return Ok(several(&matches, &name)),
        };

        let (task, changed) = match status {
            TaskStatus::Done | TaskStatus::Cancelled => services.tasks.settle(&task.id, status)?,
            other => (services.tasks.update_status(&task.id, other)?, task.status != other),
        };
        tracing::debug!(
            task_id = %task.id,
            status = status.as_str(),
            changed,
            "task status changed"
        );

        Ok(HandlerResponse::new(format!(
            "{} <b>{}</b>\n\n<i>{}</i>",
            task.status.emoji(),
            task.status.label(),
            quote(&task.title, 60)
        ))
        .with_data(json!({ "task_id": task.id, "status": task.status, "changed": changed })))
    }
}

/// Moves a task's due date
pub struct RescheduleHandler;

#[async_trait]
impl IntentHandler for RescheduleHandler {
    fn name(&self) -> &'static str {
        "reschedule"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::Reschedule
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let name = subject(result, "task");
        let matches = services.tasks.find_pending_by_title(&name)?;
        let task = match matches.as_slice() {
            [] if result.entity("task").is_none() => {
                return Ok(HandlerResponse::new(
                    "📅 <b>Reprogramar tarea</b>\n\n¿Qué tarea quieres mover?\nDime el nombre de la tarea y la nueva fecha.",
                ));
            }
            [] => return Ok(not_found(&name)),
            [task] => task,
            _ => return Ok(several(&matches, &name)),
        };

        let Some(date) = resolve_date(services, ctx, result) else {
            return Ok(HandlerResponse::new(format!(
                "📅 ¿Para cuándo quieres mover <i>{}</i>?\n\nEjemplo: <i>mover {} al viernes</i>",
                quote(&task.title, 60),
                quote(&task.title, 30)
            )));
        };

        let task = services.tasks.update_due_date(&task.id, Some(date))?;
        Ok(HandlerResponse::new(format!(
            "📅 <b>Tarea reprogramada</b>\n\n<i>{}</i>\nNueva fecha: {}",
            quote(&task.title, 60),
            short_date(date)
        ))
        .with_data(json!({ "task_id": task.id, "due_date": date })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[tokio::test]
    async fn explicit_create_stores_pending_task() {
        let services = services();
        let result = IntentResult::new(
            UserIntent::TaskCreate,
            0.95,
            "Crear tarea: revisar el informe mensual",
        )
        .with_entity("task", "revisar el informe mensual");

        let response = TaskCreateHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.success);
        assert!(response.message.contains("Tarea creada"));

        let id = response.data.unwrap()["task_id"].as_str().unwrap().to_string();
        let task = services.tasks.require(&id).unwrap();
        assert_eq!(task.title, "revisar el informe mensual");
        assert_eq!(task.status, TaskStatus::Backlog);
        assert!(task.is_pending());
    }

    #[tokio::test]
    async fn create_picks_up_priority_and_date() {
        let services = services();
        let result = IntentResult::new(UserIntent::TaskCreate, 0.9, "pagar renta urgente mañana")
            .with_entity("task", "pagar renta");

        let response = TaskCreateHandler.handle(&services, &ctx(), &result).await.unwrap();
        let id = response.data.unwrap()["task_id"].as_str().unwrap().to_string();
        let task = services.tasks.require(&id).unwrap();
        assert_eq!(task.priority, TaskPriority::Urgent);
        assert_eq!(task.due_date, Some(ctx().today().succ_opt().unwrap()));
    }

    #[tokio::test]
    async fn empty_title_asks_again() {
        let result =
            IntentResult::new(UserIntent::TaskCreate, 0.9, "   ").with_entity("task", "  ");
        let response = TaskCreateHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(!response.success);
    }

    #[tokio::test]
    async fn completing_twice_is_idempotent() {
        let services = services();
        services.tasks.create(&NewTask::new("llamar al banco")).unwrap();
        let result = IntentResult::new(UserIntent::TaskDelete, 0.9, "ya llamé al banco")
            .with_entity("task", "llamar al banco");

        let first = TaskDeleteHandler.handle(&services, &ctx(), &result).await.unwrap();
        let data = first.data.unwrap();
        assert_eq!(data["changed"], true);
        let id = data["task_id"].as_str().unwrap().to_string();
        let done = services.tasks.require(&id).unwrap();
        assert_eq!(done.status, TaskStatus::Done);
        assert!(done.completed_at.is_some());

        // No longer pending, so the second attempt finds nothing and changes nothing
        let second = TaskDeleteHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(second.message.contains("No encontré"));
        assert_eq!(services.tasks.require(&id).unwrap(), done);
    }

    /// One axis per keyword so overlapping titles score high
    struct Keywords;

    #[async_trait]
    impl crate::rag::Embed for Keywords {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok([("informe", 1.0), ("mensual", 0.3), ("pan", 1.0)]
                .iter()
                .map(|(w, weight)| if lower.contains(w) { *weight } else { 0.0 })
                .chain(std::iter::once(0.1))
                .collect())
        }
    }

    fn with_retriever(services: Services) -> Services {
        let retriever = crate::rag::Retriever::new(
            std::sync::Arc::new(Keywords),
            services.embeddings.clone(),
            services.settings.duplicate_threshold,
        );
        services.with_retriever(retriever)
    }

    #[tokio::test]
    async fn completed_task_does_not_hide_pending_duplicate() {
        let services = with_retriever(services());
        let ctx = ctx();

        // The closed task scores 1.0 and the pending one about 0.96
        let closed = create_task(&services, &ctx, "informe", TaskPriority::Normal, None)
            .await
            .unwrap();
        let closed_id = closed.data.unwrap()["task_id"].as_str().unwrap().to_string();
        services.tasks.complete(&closed_id).unwrap();
        services
            .tasks
            .create(&NewTask::new("revisar el informe mensual"))
            .unwrap();
        let pending = services.tasks.find_pending_by_title("informe mensual").unwrap();
        services
            .retriever
            .as_ref()
            .unwrap()
            .index(TASK_ENTITY, &pending[0].id, &pending[0].title)
            .await
            .unwrap();

        let (found, score) = find_duplicate(&services, "informe").await.unwrap();
        assert_eq!(found.id, pending[0].id);
        assert!(score > services.settings.duplicate_threshold);
    }

    #[tokio::test]
    async fn no_pending_candidate_means_no_duplicate() {
        let services = with_retriever(services());
        let ctx = ctx();
        let response = create_task(&services, &ctx, "informe", TaskPriority::Normal, None)
            .await
            .unwrap();
        let id = response.data.unwrap()["task_id"].as_str().unwrap().to_string();
        services.tasks.complete(&id).unwrap();

        assert!(find_duplicate(&services, "informe anual").await.is_none());
    }

    #[tokio::test]
    async fn query_lists_today_and_overdue() {
        let services = services();
        let today = ctx().today();
        services
            .tasks
            .create(&NewTask::new("vencida").with_due_date(today.pred_opt()))
            .unwrap();
        services
            .tasks
            .create(&NewTask::new("hoy").with_due_date(Some(today)))
            .unwrap();
        services.tasks.create(&NewTask::new("algún día")).unwrap();

        let result = IntentResult::new(UserIntent::TaskQuery, 1.0, "/today");
        let response = TaskQueryHandler.handle(&services, &ctx(), &result).await.unwrap();
        let data = response.data.unwrap();
        assert_eq!(data["count"], 2);
        assert_eq!(data["overdue"], 1);
        assert!(!response.message.contains("algún día"));
        assert_eq!(response.keyboard.unwrap().callbacks().count(), 2);
    }

    #[tokio::test]
    async fn empty_day_says_so() {
        let result = IntentResult::new(UserIntent::TaskQuery, 1.0, "/today");
        let response = TaskQueryHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(response.message.contains("No hay tareas programadas para hoy."));
    }

    #[tokio::test]
    async fn status_change_from_phrase() {
        let services = services();
        let task = services.tasks.create(&NewTask::new("migrar base de datos")).unwrap();
        let result = IntentResult::new(
            UserIntent::TaskStatusChange,
            0.8,
            "empecé a migrar base de datos",
        )
        .with_entity("task", "migrar base de datos");

        TaskStatusChangeHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert_eq!(services.tasks.require(&task.id).unwrap().status, TaskStatus::Doing);
    }

    #[tokio::test]
    async fn reschedule_moves_due_date() {
        let services = services();
        let task = services.tasks.create(&NewTask::new("dentista")).unwrap();
        let result = IntentResult::new(UserIntent::Reschedule, 0.8, "mueve dentista al 2026-04-01")
            .with_entity("task", "dentista");

        RescheduleHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert_eq!(
            services.tasks.require(&task.id).unwrap().due_date,
            NaiveDate::from_ymd_opt(2026, 4, 1)
        );
    }

    #[tokio::test]
    async fn ambiguous_match_offers_buttons() {
        let services = services();
        services.tasks.create(&NewTask::new("reporte ventas")).unwrap();
        services.tasks.create(&NewTask::new("reporte gastos")).unwrap();
        let result = IntentResult::new(UserIntent::TaskDelete, 0.9, "completar reporte")
            .with_entity("task", "reporte");

        let response = TaskDeleteHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert_eq!(response.keyboard.unwrap().callbacks().count(), 2);
    }

    #[test]
    fn phrases_map_to_statuses() {
        assert_eq!(status_from_text("ya terminé el reporte"), Some(TaskStatus::Done));
        assert_eq!(status_from_text("estoy bloqueado con X"), Some(TaskStatus::Blocked));
        assert_eq!(status_from_text("revisar"), None);
    }
}
