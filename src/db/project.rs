//! Project repository

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, conn, new_id, parse_date_opt, parse_datetime, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// Project category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Work,
    Freelance,
    Learning,
    SideProject,
    Personal,
}

impl ProjectType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::Freelance => "freelance",
            Self::Learning => "learning",
            Self::SideProject => "side_project",
            Self::Personal => "personal",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Work => "Trabajo",
            Self::Freelance => "Freelance",
            Self::Learning => "Aprendizaje",
            Self::SideProject => "Side project",
            Self::Personal => "Personal",
        }
    }
}

impl FromStr for ProjectType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim().to_lowercase().as_str() {
            "work" | "trabajo" => Self::Work,
            "freelance" | "cliente" => Self::Freelance,
            "learning" | "aprendizaje" | "estudio" | "curso" => Self::Learning,
            "side_project" | "side project" | "sideproject" => Self::SideProject,
            "personal" => Self::Personal,
            other => return Err(Error::Validation(format!("unknown project type: {other}"))),
        };
        Ok(kind)
    }
}

/// Project lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Idea,
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl ProjectStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idea => "idea",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Idea | Self::Active | Self::Paused)
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Idea => "💡",
            Self::Active => "🟢",
            Self::Paused => "⏸️",
            Self::Completed => "✅",
            Self::Cancelled => "❌",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let status = match s.trim().to_lowercase().as_str() {
            "idea" => Self::Idea,
            "active" | "activo" | "activa" => Self::Active,
            "paused" | "pausado" | "pausada" => Self::Paused,
            "completed" | "completado" | "terminado" | "done" => Self::Completed,
            "cancelled" | "cancelado" | "canceled" => Self::Cancelled,
            other => return Err(Error::Validation(format!("unknown project status: {other}"))),
        };
        Ok(status)
    }
}

/// A project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    pub progress: u8,
    pub target_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Ten-cell progress bar
    #[must_use]
    pub fn progress_bar(&self) -> String {
        let filled = usize::from(self.progress / 10);
        format!("{}{}", "▓".repeat(filled), "░".repeat(10 - filled))
    }
}

const PROJECT_COLUMNS: &str =
    "id, name, project_type, status, progress, target_date, description, created_at, updated_at";

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    let kind: String = row.get(2)?;
    let status: String = row.get(3)?;
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        project_type: kind.parse().unwrap_or(ProjectType::Personal),
        status: status.parse().unwrap_or(ProjectStatus::Idea),
        progress: row.get::<_, u8>(4)?.min(100),
        target_date: parse_date_opt(row.get(5)?),
        description: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

/// Project repository
#[derive(Clone)]
pub struct ProjectRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl ProjectRepo {
    /// Create a new project repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Create a project in `active` status
    ///
    /// # Errors
    ///
    /// Returns error if the name is empty or the insert fails
    pub fn create(
        &self,
        name: &str,
        project_type: ProjectType,
        target_date: Option<NaiveDate>,
    ) -> Result<Project> {
        let name = name.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            return Err(Error::Validation("project name is empty".to_string()));
        }

        let conn = conn(&self.pool)?;
        let id = new_id();
        let now = timestamp(&Utc::now());
        conn.execute(
            "INSERT INTO projects (id, name, project_type, status, progress, target_date, \
             created_at, updated_at) VALUES (?1, ?2, ?3, 'active', 0, ?4, ?5, ?5)",
            params![
                id,
                name,
                project_type.as_str(),
                target_date.map(|d| d.to_string()),
                now
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Projects);
        self.require(&id)
    }

    /// Fetch a project by id
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn get(&self, id: &str) -> Result<Option<Project>> {
        let conn = conn(&self.pool)?;
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id],
                row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    fn require(&self, id: &str) -> Result<Project> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("project {id}")))
    }

    /// List projects, optionally only open ones (idea/active/paused)
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn list(&self, open_only: bool) -> Result<Vec<Project>> {
        let sig = if open_only { "open" } else { "all" };
        self.cache.get_or_load(CacheScope::Projects, sig, || {
            let conn = conn(&self.pool)?;
            let sql = if open_only {
                format!(
                    "SELECT {PROJECT_COLUMNS} FROM projects \
                     WHERE status IN ('idea', 'active', 'paused') ORDER BY progress DESC, name"
                )
            } else {
                format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY created_at")
            };
            let mut stmt = conn.prepare(&sql)?;
            let projects = stmt
                .query_map([], row_to_project)?
                .collect::<rusqlite::Result<_>>()?;
            Ok(projects)
        })
    }

    /// First open project whose name matches `text` in either direction
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn find_by_name(&self, text: &str) -> Result<Option<Project>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }
        Ok(self.list(true)?.into_iter().find(|p| {
            let name = p.name.to_lowercase();
            name.contains(&needle) || needle.contains(&name)
        }))
    }

    /// Set progress, clamped to 100
    ///
    /// Reaching 100 completes the project.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project does not exist
    pub fn update_progress(&self, id: &str, progress: u8) -> Result<Project> {
        let progress = progress.min(100);
        let conn = conn(&self.pool)?;
        let now = timestamp(&Utc::now());
        let changed = if progress == 100 {
            conn.execute(
                "UPDATE projects SET progress = ?1, status = 'completed', updated_at = ?2 \
                 WHERE id = ?3",
                params![progress, now, id],
            )?
        } else {
            conn.execute(
                "UPDATE projects SET progress = ?1, updated_at = ?2 WHERE id = ?3",
                params![progress, now, id],
            )?
        };
        if changed == 0 {
            return Err(Error::NotFound(format!("project {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Projects);
        self.require(id)
    }

    /// Change a project's status
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the project does not exist
    pub fn update_status(&self, id: &str, status: ProjectStatus) -> Result<Project> {
        let conn = conn(&self.pool)?;
        let now = timestamp(&Utc::now());
        let changed = conn.execute(
            "UPDATE projects SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("project {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Projects);
        self.require(id)
    }

    /// `(total, done)` task counts for a project
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn task_counts(&self, id: &str) -> Result<(u64, u64)> {
        let conn = conn(&self.pool)?;
        let counts = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(CASE WHEN status = 'done' THEN 1 ELSE 0 END), 0) \
             FROM tasks WHERE project_id = ?1",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewTask, TaskRepo, TaskStatus, init_memory};

    fn repo() -> ProjectRepo {
        ProjectRepo::new(init_memory().unwrap(), QueryCache::default())
    }

    #[test]
    fn create_starts_active_at_zero() {
        let repo = repo();
        let p = repo.create("  Curso de  Rust ", ProjectType::Learning, None).unwrap();
        assert_eq!(p.name, "Curso de Rust");
        assert_eq!(p.status, ProjectStatus::Active);
        assert_eq!(p.progress, 0);
        assert_eq!(p.progress_bar(), "░░░░░░░░░░");
    }

    #[test]
    fn progress_is_clamped_and_completes() {
        let repo = repo();
        let p = repo.create("App", ProjectType::SideProject, None).unwrap();

        let p = repo.update_progress(&p.id, 40).unwrap();
        assert_eq!(p.progress, 40);
        assert_eq!(p.status, ProjectStatus::Active);

        let p = repo.update_progress(&p.id, 250).unwrap();
        assert_eq!(p.progress, 100);
        assert_eq!(p.status, ProjectStatus::Completed);
        assert!(repo.list(true).unwrap().is_empty());
    }

    #[test]
    fn find_by_name_is_fuzzy() {
        let repo = repo();
        repo.create("Portafolio web", ProjectType::Personal, None).unwrap();
        let found = repo.find_by_name("avance en portafolio web 30%").unwrap();
        assert!(found.is_some());
        assert!(repo.find_by_name("otra cosa").unwrap().is_none());
    }

    #[test]
    fn counts_tasks_by_reference() {
        let pool = init_memory().unwrap();
        let cache = QueryCache::default();
        let projects = ProjectRepo::new(pool.clone(), cache.clone());
        let tasks = TaskRepo::new(pool, cache);

        let p = projects.create("Tesis", ProjectType::Learning, None).unwrap();
        let t1 = tasks
            .create(&NewTask::new("capítulo 1").with_project(Some(p.id.clone())))
            .unwrap();
        tasks
            .create(&NewTask::new("capítulo 2").with_project(Some(p.id.clone())))
            .unwrap();
        tasks.update_status(&t1.id, TaskStatus::Done).unwrap();

        assert_eq!(projects.task_counts(&p.id).unwrap(), (2, 1));
    }
}
