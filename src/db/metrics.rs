//! Daily counters and scheduler run log

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

use super::{DbPool, conn, parse_datetime, parse_datetime_opt, timestamp};
use crate::Result;

/// One recorded scheduler run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRun {
    pub id: i64,
    pub job: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: String,
    pub error: Option<String>,
}

/// Metrics repository
#[derive(Clone)]
pub struct MetricsRepo {
    pool: DbPool,
}

impl MetricsRepo {
    /// Create a new metrics repository
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Add one to a counter for `day`
    ///
    /// # Errors
    ///
    /// Returns error if the upsert fails
    pub fn increment(&self, day: NaiveDate, key: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO metrics (day, key, value) VALUES (?1, ?2, 1)
             ON CONFLICT(day, key) DO UPDATE SET value = value + 1",
            params![day.to_string(), key],
        )?;
        Ok(())
    }

    /// Counters for one day
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn day(&self, day: NaiveDate) -> Result<BTreeMap<String, u64>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare("SELECT key, value FROM metrics WHERE day = ?1")?;
        let counters = stmt
            .query_map([day.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(counters)
    }

    /// Counters summed over every day on or after `since`
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn totals_since(&self, since: NaiveDate) -> Result<BTreeMap<String, u64>> {
        let conn = conn(&self.pool)?;
        let mut stmt = conn.prepare(
            "SELECT key, SUM(value) FROM metrics WHERE day >= ?1 GROUP BY key ORDER BY key",
        )?;
        let counters = stmt
            .query_map([since.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<_>>()?;
        Ok(counters)
    }

    /// Record that a job started; returns the run id
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails
    pub fn start_run(&self, job: &str, at: DateTime<Utc>) -> Result<i64> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO job_runs (job, started_at, status) VALUES (?1, ?2, 'running')",
            params![job, timestamp(&at)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Close a run with `ok` or the error text
    ///
    /// # Errors
    ///
    /// Returns error if the update fails
    pub fn finish_run(&self, run_id: i64, at: DateTime<Utc>, error: Option<&str>) -> Result<()> {
        let conn = conn(&self.pool)?;
        let status = if error.is_some() { "failed" } else { "ok" };
        conn.execute(
            "UPDATE job_runs SET finished_at = ?1, status = ?2, error = ?3 WHERE id = ?4",
            params![timestamp(&at), status, error, run_id],
        )?;
        Ok(())
    }

    /// Most recent run of a job
    ///
    /// # Errors
    ///
    /// Returns error if the query fails
    pub fn last_run(&self, job: &str) -> Result<Option<JobRun>> {
        let conn = conn(&self.pool)?;
        let run = conn
            .query_row(
                "SELECT id, job, started_at, finished_at, status, error FROM job_runs
                 WHERE job = ?1 ORDER BY id DESC LIMIT 1",
                [job],
                |row| {
                    Ok(JobRun {
                        id: row.get(0)?,
                        job: row.get(1)?,
                        started_at: parse_datetime(&row.get::<_, String>(2)?),
                        finished_at: parse_datetime_opt(row.get(3)?),
                        status: row.get(4)?,
                        error: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn counters_accumulate_per_day() {
        let repo = MetricsRepo::new(init_memory().unwrap());
        let d1 = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 2, 2).unwrap();

        repo.increment(d1, "messages").unwrap();
        repo.increment(d1, "messages").unwrap();
        repo.increment(d2, "messages").unwrap();
        repo.increment(d2, "intent.task_create").unwrap();

        assert_eq!(repo.day(d1).unwrap().get("messages"), Some(&2));
        let totals = repo.totals_since(d1).unwrap();
        assert_eq!(totals.get("messages"), Some(&3));
        assert_eq!(totals.get("intent.task_create"), Some(&1));
    }

    #[test]
    fn job_runs_are_recorded() {
        let repo = MetricsRepo::new(init_memory().unwrap());
        assert!(repo.last_run("weekly_review").unwrap().is_none());

        let now = Utc::now();
        let first = repo.start_run("weekly_review", now).unwrap();
        repo.finish_run(first, now, None).unwrap();
        let second = repo.start_run("weekly_review", now).unwrap();
        repo.finish_run(second, now, Some("telegram down")).unwrap();

        let last = repo.last_run("weekly_review").unwrap().unwrap();
        assert_eq!(last.id, second);
        assert_eq!(last.status, "failed");
        assert_eq!(last.error.as_deref(), Some("telegram down"));
        assert!(last.finished_at.is_some());
    }
}
