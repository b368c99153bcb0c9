//! Task repository

use std::fmt::Write as _;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};

use super::{DbPool, conn, new_id, parse_date_opt, parse_datetime, parse_datetime_opt, timestamp};
use crate::cache::{CacheScope, QueryCache};
use crate::{Error, Result};

/// Longest title kept for a task
const MAX_TITLE_CHARS: usize = 200;

/// Task workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Planned,
    Today,
    Doing,
    Paused,
    Blocked,
    Done,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [Self; 8] = [
        Self::Backlog,
        Self::Planned,
        Self::Today,
        Self::Doing,
        Self::Paused,
        Self::Blocked,
        Self::Done,
        Self::Cancelled,
    ];

    /// Statuses that still need work
    pub const PENDING: [Self; 6] = [
        Self::Backlog,
        Self::Planned,
        Self::Today,
        Self::Doing,
        Self::Paused,
        Self::Blocked,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Planned => "planned",
            Self::Today => "today",
            Self::Doing => "doing",
            Self::Paused => "paused",
            Self::Blocked => "blocked",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
        }
    }

    /// Not done and not cancelled
    #[must_use]
    pub const fn is_pending(self) -> bool {
        !matches!(self, Self::Done | Self::Cancelled)
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Backlog => "⬜",
            Self::Planned => "📋",
            Self::Today => "🎯",
            Self::Doing => "🔵",
            Self::Paused => "⏸️",
            Self::Blocked => "🚧",
            Self::Done => "✅",
            Self::Cancelled => "❌",
        }
    }

    /// Spanish label for replies
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Planned => "Planeada",
            Self::Today => "Hoy",
            Self::Doing => "En progreso",
            Self::Paused => "Pausada",
            Self::Blocked => "Bloqueada",
            Self::Done => "Completada",
            Self::Cancelled => "Cancelada",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let status = match s.trim().to_lowercase().as_str() {
            "backlog" | "pending" | "pendiente" | "todo" => Self::Backlog,
            "planned" | "planeada" | "planificada" => Self::Planned,
            "today" | "hoy" => Self::Today,
            "doing" | "in_progress" | "en progreso" | "haciendo" | "progreso" => Self::Doing,
            "paused" | "pausada" | "pausar" => Self::Paused,
            "blocked" | "bloqueada" | "bloqueado" => Self::Blocked,
            "done" | "completed" | "completada" | "hecha" | "terminada" | "lista" => Self::Done,
            "cancelled" | "canceled" | "cancelada" => Self::Cancelled,
            other => return Err(Error::Validation(format!("unknown task status: {other}"))),
        };
        Ok(status)
    }
}

/// Task priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Urgent,
    High,
    #[default]
    Normal,
    Low,
}

impl TaskPriority {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Normal => "normal",
            Self::Low => "low",
        }
    }

    #[must_use]
    pub const fn emoji(self) -> &'static str {
        match self {
            Self::Urgent => "🔴",
            Self::High => "🟠",
            Self::Normal => "🟡",
            Self::Low => "🟢",
        }
    }

    /// Spanish label for replies
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Urgent => "Urgente",
            Self::High => "Alta",
            Self::Normal => "Normal",
            Self::Low => "Baja",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let priority = match s.trim().to_lowercase().as_str() {
            "urgent" | "urgente" | "critical" | "crítica" | "critica" => Self::Urgent,
            "high" | "alta" | "importante" => Self::High,
            "normal" | "media" | "medium" => Self::Normal,
            "low" | "baja" => Self::Low,
            other => return Err(Error::Validation(format!("unknown priority: {other}"))),
        };
        Ok(priority)
    }
}

/// A task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub project_id: Option<String>,
    pub context: Option<String>,
    pub notes: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Pending with a due date before `today`
    #[must_use]
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.is_pending() && self.due_date.is_some_and(|d| d < today)
    }
}

/// Fields for a new task
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewTask {
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub const fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }

    #[must_use]
    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }
}

/// Collapse whitespace and bound the length of a task title
///
/// # Errors
///
/// Returns a validation error for an empty title
pub fn normalize_title(raw: &str) -> Result<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_matches(|c: char| c == '"' || c == '\'' || c == '.').trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("task title is empty".to_string()));
    }
    Ok(trimmed.chars().take(MAX_TITLE_CHARS).collect())
}

/// Query filter for listing tasks
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub statuses: Vec<TaskStatus>,
    pub due_on: Option<NaiveDate>,
    pub due_before: Option<NaiveDate>,
    pub project_id: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl TaskFilter {
    /// Every task that still needs work
    #[must_use]
    pub fn pending() -> Self {
        Self {
            statuses: TaskStatus::PENDING.to_vec(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    #[must_use]
    pub const fn due_on(mut self, date: NaiveDate) -> Self {
        self.due_on = Some(date);
        self
    }

    #[must_use]
    pub const fn due_before(mut self, date: NaiveDate) -> Self {
        self.due_before = Some(date);
        self
    }

    /// Cache key for this filter
    fn signature(&self) -> String {
        let mut sig = String::from("list");
        for s in &self.statuses {
            let _ = write!(sig, "|s={}", s.as_str());
        }
        let _ = write!(
            sig,
            "|on={:?}|before={:?}|p={:?}|q={:?}|n={:?}",
            self.due_on, self.due_before, self.project_id, self.search, self.limit
        );
        sig
    }
}

const TASK_COLUMNS: &str = "id, title, status, priority, due_date, project_id, context, notes, \
                            completed_at, created_at, updated_at";

fn row_to_task(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(2)?;
    let priority: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        status: status.parse().unwrap_or(TaskStatus::Backlog),
        priority: priority.parse().unwrap_or_default(),
        due_date: parse_date_opt(row.get(4)?),
        project_id: row.get(5)?,
        context: row.get(6)?,
        notes: row.get(7)?,
        completed_at: parse_datetime_opt(row.get(8)?),
        created_at: parse_datetime(&row.get::<_, String>(9)?),
        updated_at: parse_datetime(&row.get::<_, String>(10)?),
    })
}

/// Task repository
#[derive(Clone)]
pub struct TaskRepo {
    pool: DbPool,
    cache: QueryCache,
}

impl TaskRepo {
    /// Create a new task repository
    #[must_use]
    pub const fn new(pool: DbPool, cache: QueryCache) -> Self {
        Self { pool, cache }
    }

    /// Insert a task
    ///
    /// # Errors
    ///
    /// Returns error if the title is empty or the insert fails
    pub fn create(&self, new: &NewTask) -> Result<Task> {
        let title = normalize_title(&new.title)?;
        let conn = conn(&self.pool)?;
        let id = new_id();
        let now = Utc::now();
        let now_str = timestamp(&now);

        conn.execute(
            "INSERT INTO tasks (id, title, status, priority, due_date, project_id, context, notes, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id,
                title,
                TaskStatus::Backlog.as_str(),
                new.priority.as_str(),
                new.due_date.map(|d| d.to_string()),
                new.project_id,
                new.context,
                new.notes,
                now_str,
            ],
        )?;
        drop(conn);
        self.cache.invalidate(CacheScope::Tasks);

        tracing::debug!(task_id = %id, "task created");
        self.get(&id)?
            .ok_or_else(|| Error::NotFound(format!("task {id} vanished after insert")))
    }

    /// Fetch a task by id
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn get(&self, id: &str) -> Result<Option<Task>> {
        let conn = conn(&self.pool)?;
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                [id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    /// Fetch a task by id or fail with `NotFound`
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no task has this id
    pub fn require(&self, id: &str) -> Result<Task> {
        self.get(id)?
            .ok_or_else(|| Error::NotFound(format!("task {id}")))
    }

    /// List tasks matching a filter
    ///
    /// Ordered by priority, then due date (undated last), then age.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        self.cache
            .get_or_load(CacheScope::Tasks, &filter.signature(), || self.query(filter))
    }

    fn query(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let conn = conn(&self.pool)?;

        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();

        if !filter.statuses.is_empty() {
            let placeholders: Vec<String> = filter
                .statuses
                .iter()
                .map(|s| {
                    args.push(s.as_str().to_string());
                    format!("?{}", args.len())
                })
                .collect();
            let _ = write!(sql, " AND status IN ({})", placeholders.join(", "));
        }
        if let Some(on) = filter.due_on {
            args.push(on.to_string());
            let _ = write!(sql, " AND due_date = ?{}", args.len());
        }
        if let Some(before) = filter.due_before {
            args.push(before.to_string());
            let _ = write!(sql, " AND due_date IS NOT NULL AND due_date < ?{}", args.len());
        }
        if let Some(project) = &filter.project_id {
            args.push(project.clone());
            let _ = write!(sql, " AND project_id = ?{}", args.len());
        }
        if let Some(search) = &filter.search {
            args.push(format!("%{}%", search.trim().to_lowercase()));
            let _ = write!(sql, " AND lower(title) LIKE ?{}", args.len());
        }

        sql.push_str(
            " ORDER BY CASE priority WHEN 'urgent' THEN 0 WHEN 'high' THEN 1 \
             WHEN 'normal' THEN 2 ELSE 3 END, due_date IS NULL, due_date, created_at",
        );
        if let Some(limit) = filter.limit {
            let _ = write!(sql, " LIMIT {limit}");
        }

        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(rusqlite::params_from_iter(args.iter()), row_to_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Pending tasks whose title contains `text`, or whose title is contained in `text`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn find_pending_by_title(&self, text: &str) -> Result<Vec<Task>> {
        let needle = text.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let pending = self.list(&TaskFilter::pending())?;
        Ok(pending
            .into_iter()
            .filter(|t| {
                let title = t.title.to_lowercase();
                title.contains(&needle) || needle.contains(&title)
            })
            .collect())
    }

    /// Change a task's status
    ///
    /// Moving into `done` stamps `completed_at`; moving out clears it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist
    pub fn update_status(&self, id: &str, status: TaskStatus) -> Result<Task> {
        let conn = conn(&self.pool)?;
        let now = timestamp(&Utc::now());
        let completed_at = (status == TaskStatus::Done).then(|| now.clone());

        let changed = conn.execute(
            "UPDATE tasks SET status = ?1, completed_at = ?2, updated_at = ?3 WHERE id = ?4",
            params![status.as_str(), completed_at, now, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("task {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Tasks);
        self.require(id)
    }

    /// Move a task into a terminal status, leaving it untouched if it is already there
    ///
    /// Returns the task and whether anything changed, so completing a
    /// completed task keeps its original `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist
    pub fn settle(&self, id: &str, status: TaskStatus) -> Result<(Task, bool)> {
        let task = self.require(id)?;
        if task.status == status {
            return Ok((task, false));
        }
        Ok((self.update_status(id, status)?, true))
    }

    /// Mark a task done (idempotent)
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist
    pub fn complete(&self, id: &str) -> Result<(Task, bool)> {
        self.settle(id, TaskStatus::Done)
    }

    /// Change a task's priority
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist
    pub fn update_priority(&self, id: &str, priority: TaskPriority) -> Result<Task> {
        self.update_column(id, "priority", Some(priority.as_str().to_string()))
    }

    /// Change or clear a task's due date
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the task does not exist
    pub fn update_due_date(&self, id: &str, due_date: Option<NaiveDate>) -> Result<Task> {
        self.update_column(id, "due_date", due_date.map(|d| d.to_string()))
    }

    fn update_column(&self, id: &str, column: &'static str, value: Option<String>) -> Result<Task> {
        let conn = conn(&self.pool)?;
        let now = timestamp(&Utc::now());
        let changed = conn.execute(
            &format!("UPDATE tasks SET {column} = ?1, updated_at = ?2 WHERE id = ?3"),
            params![value, now, id],
        )?;
        if changed == 0 {
            return Err(Error::NotFound(format!("task {id}")));
        }
        drop(conn);
        self.cache.invalidate(CacheScope::Tasks);
        self.require(id)
    }

    /// Tasks completed at or after `since`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn completed_since(&self, since: DateTime<Utc>) -> Result<Vec<Task>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status = 'done' AND completed_at >= ?1 \
             ORDER BY completed_at"
        ))?;
        let tasks = stmt
            .query_map([timestamp(&since)], row_to_task)?
            .collect::<rusqlite::Result<_>>()?;
        Ok(tasks)
    }

    /// Number of tasks per status (statuses with no tasks are omitted)
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn count_by_status(&self) -> Result<Vec<(TaskStatus, u64)>> {
        self.cache.get_or_load(CacheScope::Tasks, "count_by_status", || {
            let conn = conn(&self.pool)?;
            let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM tasks GROUP BY status")?;
            let counts: Vec<(TaskStatus, u64)> = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?
                .into_iter()
                .map(|(s, n)| s.parse::<TaskStatus>().map(|s| (s, n)))
                .collect::<Result<_>>()?;
            Ok(counts)
        })
    }

    /// Delete a task
    ///
    /// # Errors
    ///
    /// Returns error if the delete fails
    pub fn delete(&self, id: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        drop(conn);
        self.cache.invalidate(CacheScope::Tasks);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    fn repo() -> TaskRepo {
        TaskRepo::new(init_memory().unwrap(), QueryCache::default())
    }

    #[test]
    fn new_tasks_default_to_normal_priority() {
        assert_eq!(TaskPriority::default(), TaskPriority::Normal);
        assert_eq!(NewTask::new("x").priority, TaskPriority::Normal);
    }

    #[test]
    fn undecodable_row_fails_the_list() {
        let pool = init_memory().unwrap();
        let repo = TaskRepo::new(pool.clone(), QueryCache::default());
        repo.create(&NewTask::new("revisar el informe")).unwrap();
        conn(&pool)
            .unwrap()
            .execute(
                "INSERT INTO tasks (id, title, created_at, updated_at) VALUES ('bad', X'FF', ?1, ?1)",
                [timestamp(&Utc::now())],
            )
            .unwrap();

        assert!(matches!(repo.list(&TaskFilter::default()), Err(Error::Sqlite(_))));

        conn(&pool)
            .unwrap()
            .execute(
                "INSERT INTO tasks (id, title, status, created_at, updated_at) \
                 VALUES ('odd', 'x', 'limbo', ?1, ?1)",
                [timestamp(&Utc::now())],
            )
            .unwrap();
        assert!(repo.count_by_status().is_err());
    }

    #[test]
    fn create_and_fetch_roundtrip() {
        let repo = repo();
        let due = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let created = repo
            .create(
                &NewTask::new("  revisar   el informe mensual ")
                    .with_priority(TaskPriority::High)
                    .with_due_date(Some(due)),
            )
            .unwrap();

        let fetched = repo.get(&created.id).unwrap().unwrap();
        assert_eq!(fetched.title, "revisar el informe mensual");
        assert_eq!(fetched.priority, TaskPriority::High);
        assert_eq!(fetched.due_date, Some(due));
        assert_eq!(fetched.status, TaskStatus::Backlog);
        assert!(fetched.is_pending());
        assert_eq!(fetched, created);
    }

    #[test]
    fn empty_title_is_rejected() {
        let repo = repo();
        let err = repo.create(&NewTask::new("   ")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn list_orders_by_priority() {
        let repo = repo();
        repo.create(&NewTask::new("low").with_priority(TaskPriority::Low))
            .unwrap();
        repo.create(&NewTask::new("urgent").with_priority(TaskPriority::Urgent))
            .unwrap();
        repo.create(&NewTask::new("normal")).unwrap();

        let titles: Vec<String> = repo
            .list(&TaskFilter::pending())
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, vec!["urgent", "normal", "low"]);
    }

    #[test]
    fn writes_invalidate_cached_lists() {
        let repo = repo();
        assert!(repo.list(&TaskFilter::pending()).unwrap().is_empty());

        let task = repo.create(&NewTask::new("algo")).unwrap();
        assert_eq!(repo.list(&TaskFilter::pending()).unwrap().len(), 1);

        repo.update_status(&task.id, TaskStatus::Done).unwrap();
        assert!(repo.list(&TaskFilter::pending()).unwrap().is_empty());
    }

    #[test]
    fn done_stamps_completed_at() {
        let repo = repo();
        let task = repo.create(&NewTask::new("x")).unwrap();
        assert!(task.completed_at.is_none());

        let done = repo.update_status(&task.id, TaskStatus::Done).unwrap();
        assert!(done.completed_at.is_some());

        let reopened = repo.update_status(&task.id, TaskStatus::Doing).unwrap();
        assert!(reopened.completed_at.is_none());
    }

    #[test]
    fn completing_twice_is_a_no_op() {
        let repo = repo();
        let task = repo.create(&NewTask::new("x")).unwrap();

        let (done, changed) = repo.complete(&task.id).unwrap();
        assert!(changed);
        let (again, changed) = repo.complete(&task.id).unwrap();
        assert!(!changed);
        assert_eq!(again, done);
    }

    #[test]
    fn update_missing_task_is_not_found() {
        let repo = repo();
        let err = repo.update_status("nope", TaskStatus::Done).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn fuzzy_title_lookup() {
        let repo = repo();
        repo.create(&NewTask::new("Llamar al contador")).unwrap();
        repo.create(&NewTask::new("Pagar luz")).unwrap();

        let found = repo.find_pending_by_title("contador").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Llamar al contador");

        let found = repo
            .find_pending_by_title("ya terminé de pagar luz hoy")
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn overdue_requires_pending() {
        let repo = repo();
        let yesterday = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let task = repo
            .create(&NewTask::new("vencida").with_due_date(Some(yesterday)))
            .unwrap();
        assert!(task.is_overdue(today));

        let done = repo.update_status(&task.id, TaskStatus::Done).unwrap();
        assert!(!done.is_overdue(today));
    }

    #[test]
    fn status_aliases_parse() {
        assert_eq!("completada".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!("en progreso".parse::<TaskStatus>().unwrap(), TaskStatus::Doing);
        assert!("whatever".parse::<TaskStatus>().is_err());
    }
}
