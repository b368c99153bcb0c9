//! Project and study handlers

use std::fmt::Write as _;

use async_trait::async_trait;
use serde_json::json;

use super::{HandlerContext, HandlerResponse, IntentHandler, Services, quote, short_date, subject};
use crate::db::{Project, ProjectStatus, ProjectType};
use crate::intent::{IntentResult, UserIntent};
use crate::Result;

const CANCEL_WORDS: [&str; 5] = ["cancela", "elimina", "borra", "abandona", "descarta"];

fn not_found(name: &str) -> HandlerResponse {
    HandlerResponse::failure(format!(
        "🔍 No encontré un proyecto activo llamado <i>{}</i>.\n\nVe tus proyectos con: 'Mis proyectos'",
        quote(name, 50)
    ))
}

/// Status implied by the message, if any
fn status_from_text(text: &str) -> Option<ProjectStatus> {
    let lower = text.to_lowercase();
    if ["paus", "en espera"].iter().any(|w| lower.contains(w)) {
        Some(ProjectStatus::Paused)
    } else if ["reactiv", "retom", "reanud"].iter().any(|w| lower.contains(w)) {
        Some(ProjectStatus::Active)
    } else if ["terminé", "termine", "completé", "complete", "acabé", "terminado", "completado"]
        .iter()
        .any(|w| lower.contains(w))
    {
        Some(ProjectStatus::Completed)
    } else {
        None
    }
}

fn find_project(services: &Services, result: &IntentResult) -> Result<Option<Project>> {
    if let Some(name) = result.entity("project_name") {
        if let Some(project) = services.projects.find_by_name(name)? {
            return Ok(Some(project));
        }
    }
    services.projects.find_by_name(&result.raw_message)
}

fn project_line(services: &Services, project: &Project) -> Result<String> {
    let (total, done) = services.projects.task_counts(&project.id)?;
    let mut line = format!(
        "{} <b>{}</b> ({})\n{} {}%",
        project.status.emoji(),
        quote(&project.name, 40),
        project.project_type.label(),
        project.progress_bar(),
        project.progress
    );
    if total > 0 {
        let _ = write!(line, " · {done}/{total} tareas");
    }
    if let Some(target) = project.target_date {
        let _ = write!(line, " · 🎯 {}", short_date(target));
    }
    Ok(line)
}

pub struct ProjectCreateHandler;

#[async_trait]
impl IntentHandler for ProjectCreateHandler {
    fn name(&self) -> &'static str {
        "project_create"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ProjectCreate
    }

    async fn handle(
        &self,
        services: &Services,
        ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let name = subject(result, "project_name");
        if name.is_empty() {
            return Ok(HandlerResponse::failure(
                "🤔 ¿Cómo se llama el proyecto?\n\nEjemplo: 'Nuevo proyecto: curso de Rust'",
            ));
        }
        let kind = result
            .entity("project_type")
            .and_then(|t| t.parse().ok())
            .or_else(|| {
                services
                    .parser
                    .project_info(&result.raw_message)
                    .get("project_type")
                    .and_then(|t| t.parse().ok())
            })
            .unwrap_or(ProjectType::Personal);
        let target = services.parser.due_date(&result.raw_message, ctx.today());

        let project = services.projects.create(&name, kind, target)?;
        tracing::info!(project_id = %project.id, kind = kind.as_str(), "project created");

        let mut message = format!(
            "📁 <b>Proyecto creado</b>\n\n<b>{}</b>\nTipo: {}\n",
            quote(&project.name, 60),
            kind.label()
        );
        if let Some(target) = project.target_date {
            let _ = writeln!(message, "🎯 Meta: {}", short_date(target));
        }
        message.push_str("\nActualiza el avance con: '<i>nombre</i> al 50%'");

        Ok(HandlerResponse::new(message).with_data(json!({ "project_id": project.id })))
    }
}

pub struct ProjectUpdateHandler;

#[async_trait]
impl IntentHandler for ProjectUpdateHandler {
    fn name(&self) -> &'static str {
        "project_update"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ProjectUpdate
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let Some(project) = find_project(services, result)? else {
            return Ok(not_found(&subject(result, "project_name")));
        };

        let percent = result
            .entity("progress")
            .and_then(|p| services.parser.percent(&format!("{p}%")))
            .or_else(|| services.parser.percent(&result.raw_message));
        let status = result
            .entity("status")
            .and_then(|s| s.parse().ok())
            .or_else(|| status_from_text(&result.raw_message));

        let updated = match (percent, status) {
            (Some(p), _) => services.projects.update_progress(&project.id, p)?,
            (None, Some(s)) => services.projects.update_status(&project.id, s)?,
            (None, None) => {
                return Ok(HandlerResponse::failure(format!(
                    "{}\n\n¿Qué quieres actualizar? Indica un porcentaje o un estado (pausado, activo, terminado).",
                    project_line(services, &project)?
                )));
            }
        };
        tracing::info!(project_id = %updated.id, progress = updated.progress, "project updated");

        let mut message = format!(
            "📁 <b>Proyecto actualizado</b>\n\n{}",
            project_line(services, &updated)?
        );
        if updated.status == ProjectStatus::Completed {
            message.push_str("\n\n🎉 ¡Proyecto completado!");
        }
        Ok(HandlerResponse::new(message).with_data(json!({
            "project_id": updated.id,
            "progress": updated.progress,
            "status": updated.status,
        })))
    }
}

/// Closes a project: cancelled when asked to delete, otherwise completed
pub struct ProjectDeleteHandler;

#[async_trait]
impl IntentHandler for ProjectDeleteHandler {
    fn name(&self) -> &'static str {
        "project_delete"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ProjectDelete
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
        let Some(project) = find_project(services, result)? else {
            return Ok(not_found(&subject(result, "project_name")));
        };

        let lower = result.raw_message.to_lowercase();
        let status = if CANCEL_WORDS.iter().any(|w| lower.contains(w)) {
            ProjectStatus::Cancelled
        } else {
            ProjectStatus::Completed
        };
        let closed = services.projects.update_status(&project.id, status)?;
        tracing::info!(project_id = %closed.id, status = status.as_str(), "project closed");

        let name = quote(&closed.name, 60);
        let message = match status {
            ProjectStatus::Cancelled => format!("❌ Proyecto cancelado: <b>{name}</b>"),
            _ => format!("✅ Proyecto completado: <b>{name}</b>\n\n🎉 ¡Buen trabajo!"),
        };
        Ok(HandlerResponse::new(message)
            .with_data(json!({ "project_id": closed.id, "status": status })))
    }
}

pub struct ProjectQueryHandler;

#[async_trait]
impl IntentHandler for ProjectQueryHandler {
    fn name(&self) -> &'static str {
        "project_query"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::ProjectQuery
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let projects = services.projects.list(true)?;
        if projects.is_empty() {
            return Ok(HandlerResponse::new(
                "No tienes proyectos activos.\n\nCrea uno con: 'Nuevo proyecto [nombre]'",
            )
            .with_data(json!({ "count": 0 })));
        }

        let mut message = String::from("📁 <b>Proyectos Activos</b>\n\n");
        for project in &projects {
            let _ = writeln!(message, "{}\n", project_line(services, project)?);
        }
        Ok(HandlerResponse::new(message.trim_end().to_string())
            .with_data(json!({ "count": projects.len() })))
    }
}

/// Picks the learning project that is furthest behind
pub struct StudySessionHandler;

#[async_trait]
impl IntentHandler for StudySessionHandler {
    fn name(&self) -> &'static str {
        "study_session"
    }

    fn intent(&self) -> UserIntent {
        UserIntent::StudySession
    }

    async fn handle(
        &self,
        services: &Services,
        _ctx: &HandlerContext,
        _result: &IntentResult,
    ) -> Result<HandlerResponse> {
        let Some(project) = next_study_project(services)? else {
            return Ok(HandlerResponse::new(
                "📚 No tienes proyectos de aprendizaje activos.\n\nCrea uno con: 'Nuevo proyecto: curso de ...'",
            ));
        };

        let message = format!(
            "📚 <b>Sesión de Estudio</b>\n\nHoy toca: <b>{}</b>\n{} {}%\n\n\
             • Bloque de 25 minutos sin distracciones\n\
             • Anota una idea clave al terminar\n\
             • Actualiza el avance con: '{} al {}%'",
            quote(&project.name, 60),
            project.progress_bar(),
            project.progress,
            quote(&project.name, 30),
            (project.progress + 5).min(100)
        );
        Ok(HandlerResponse::new(message).with_data(json!({ "project_id": project.id })))
    }
}

/// Active learning project with the lowest progress
///
/// # Errors
///
/// Returns error if projects cannot be listed
pub(crate) fn next_study_project(services: &Services) -> Result<Option<Project>> {
    Ok(services
        .projects
        .list(true)?
        .into_iter()
        .filter(|p| p.project_type == ProjectType::Learning && p.status == ProjectStatus::Active)
        .min_by_key(|p| p.progress))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::{ctx, services};

    #[tokio::test]
    async fn create_and_update_progress() {
        let services = services();
        let create = IntentResult::new(UserIntent::ProjectCreate, 0.95, "proyecto: curso de rust")
            .with_entity("project_name", "curso de rust")
            .with_entity("project_type", "learning");
        let response = ProjectCreateHandler.handle(&services, &ctx(), &create).await.unwrap();
        assert!(response.message.contains("Proyecto creado"));
        assert!(response.message.contains("Aprendizaje"));

        let update = IntentResult::new(UserIntent::ProjectUpdate, 0.9, "curso de rust al 40%");
        let response = ProjectUpdateHandler.handle(&services, &ctx(), &update).await.unwrap();
        assert!(response.success);
        assert_eq!(response.data.unwrap()["progress"], 40);
    }

    #[tokio::test]
    async fn full_progress_completes() {
        let services = services();
        services.projects.create("Portafolio", ProjectType::SideProject, None).unwrap();

        let update = IntentResult::new(UserIntent::ProjectUpdate, 0.9, "portafolio al 100%");
        let response = ProjectUpdateHandler.handle(&services, &ctx(), &update).await.unwrap();
        assert!(response.message.contains("Proyecto completado"));
        assert!(services.projects.list(true).unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_cancels_or_completes() {
        let services = services();
        services.projects.create("Blog", ProjectType::Personal, None).unwrap();
        services.projects.create("Tesis", ProjectType::Learning, None).unwrap();

        let cancel = IntentResult::new(UserIntent::ProjectDelete, 0.9, "cancela el proyecto blog");
        let response = ProjectDeleteHandler.handle(&services, &ctx(), &cancel).await.unwrap();
        assert_eq!(response.data.unwrap()["status"], "cancelled");

        let finish = IntentResult::new(UserIntent::ProjectDelete, 0.9, "terminé la tesis");
        let response = ProjectDeleteHandler.handle(&services, &ctx(), &finish).await.unwrap();
        assert_eq!(response.data.unwrap()["status"], "completed");
    }

    #[tokio::test]
    async fn study_picks_lowest_progress() {
        let services = services();
        let rust = services.projects.create("Rust", ProjectType::Learning, None).unwrap();
        let go = services.projects.create("Go", ProjectType::Learning, None).unwrap();
        services.projects.create("Casa", ProjectType::Personal, None).unwrap();
        services.projects.update_progress(&rust.id, 60).unwrap();
        services.projects.update_progress(&go.id, 20).unwrap();

        let result = IntentResult::new(UserIntent::StudySession, 0.9, "qué estudio hoy");
        let response = StudySessionHandler.handle(&services, &ctx(), &result).await.unwrap();
        assert!(response.message.contains("Hoy toca: <b>Go</b>"));
    }

    #[tokio::test]
    async fn unknown_project() {
        let result = IntentResult::new(UserIntent::ProjectUpdate, 0.9, "inexistente al 10%");
        let response = ProjectUpdateHandler.handle(&services(), &ctx(), &result).await.unwrap();
        assert!(!response.success);
        assert!(response.message.contains("No encontré"));
    }
}
