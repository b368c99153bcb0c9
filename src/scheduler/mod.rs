//! Cron-driven background jobs
//!
//! One tokio task per job sleeps until the next firing time of its cron
//! expression (in the assistant's UTC offset), runs the job and records the
//! run in `job_runs`. Jobs share nothing but the store.

mod cron;
mod jobs;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::db::JobRun;
use crate::handlers::Services;
use crate::telegram::Messenger;
use crate::Result;

pub use cron::CronExpr;
pub use jobs::{
    Job, JobContext, JobOutcome, NotificationKind, is_quiet_hours, is_workday,
    should_send_notification,
};

/// Background job runner
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    services: Services,
    messenger: Arc<dyn Messenger>,
    chat_id: Option<i64>,
    schedules: Vec<(Job, CronExpr)>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

/// Job listing for the admin API
#[derive(Debug, Clone, Serialize)]
pub struct TriggerInfo {
    pub name: &'static str,
    pub schedule: String,
    pub next_run: Option<DateTime<FixedOffset>>,
    pub last_run: Option<JobRun>,
}

impl Scheduler {
    /// Build a scheduler for every [`Job`]
    ///
    /// # Errors
    ///
    /// Returns error if a job's cron expression does not parse
    pub fn new(
        services: Services,
        messenger: Arc<dyn Messenger>,
        chat_id: Option<i64>,
    ) -> Result<Self> {
        let schedules = Job::ALL
            .into_iter()
            .map(|job| CronExpr::parse(job.schedule()).map(|expr| (job, expr)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            inner: Arc::new(Inner {
                services,
                messenger,
                chat_id,
                schedules,
                handles: Mutex::new(Vec::new()),
            }),
        })
    }

    /// Spawn one loop per job; returns how many were started
    pub async fn start(&self) -> usize {
        let mut handles = self.inner.handles.lock().await;
        if !handles.is_empty() {
            tracing::debug!("scheduler already running");
            return 0;
        }

        if self.inner.chat_id.is_none() {
            tracing::warn!("TELEGRAM_CHAT_ID not set, proactive jobs will skip");
        }

        for (job, expr) in &self.inner.schedules {
            let scheduler = self.clone();
            let (job, expr) = (*job, expr.clone());
            handles.push(tokio::spawn(async move {
                scheduler.job_loop(job, expr).await;
            }));
        }

        tracing::info!(jobs = handles.len(), "scheduler started");
        handles.len()
    }

    /// Abort every job loop and wait for the loops to unwind
    pub async fn stop(&self) {
        let handles: Vec<_> = self.inner.handles.lock().await.drain(..).collect();
        for handle in &handles {
            handle.abort();
        }
        let stopped = futures::future::join_all(handles)
            .await
            .into_iter()
            .filter(|r| r.as_ref().is_err_and(tokio::task::JoinError::is_cancelled))
            .count();
        tracing::info!(stopped, "scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.inner
            .handles
            .lock()
            .await
            .iter()
            .any(|h| !h.is_finished())
    }

    async fn job_loop(&self, job: Job, expr: CronExpr) {
        loop {
            let now = self.inner.services.settings.now();
            let Some(next) = expr.next_after(&now) else {
                tracing::warn!(job = job.name(), "no next run, stopping job");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::trace!(job = job.name(), next = %next, "sleeping until next run");
            tokio::time::sleep(wait).await;

            let scheduler = self.clone();
            tokio::spawn(async move {
                let _ = scheduler.execute(job).await;
            });
        }
    }

    /// Run a job now in the background
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` for an unknown job name
    pub fn trigger(&self, name: &str) -> Result<Job> {
        let job: Job = name.parse()?;
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _ = scheduler.execute(job).await;
        });
        tracing::info!(job = job.name(), "job triggered manually");
        Ok(job)
    }

    /// Run a job to completion and record the run
    ///
    /// # Errors
    ///
    /// Returns the job's error after recording it
    pub async fn execute(&self, job: Job) -> Result<JobOutcome> {
        let services = &self.inner.services;
        let now = services.settings.now();

        let run_id = services.metrics.start_run(job.name(), now.with_timezone(&Utc))?;
        if let Err(e) = services
            .metrics
            .increment(now.date_naive(), &format!("jobs.{}", job.name()))
        {
            tracing::warn!(job = job.name(), error = %e, "failed to count job run");
        }

        let ctx = JobContext {
            services,
            messenger: self.inner.messenger.as_ref(),
            chat_id: self.inner.chat_id,
            now,
        };
        let result = jobs::run(job, &ctx).await;

        let error = result.as_ref().err().map(ToString::to_string);
        if let Err(e) = services
            .metrics
            .finish_run(run_id, Utc::now(), error.as_deref())
        {
            tracing::warn!(job = job.name(), error = %e, "failed to record job run");
        }

        match &result {
            Ok(outcome) => tracing::info!(job = job.name(), ?outcome, "job finished"),
            Err(e) => tracing::error!(job = job.name(), error = %e, "job failed"),
        }
        result
    }

    /// Every job with its schedule, next and last run
    ///
    /// # Errors
    ///
    /// Returns error if run history cannot be read
    pub fn triggers(&self) -> Result<Vec<TriggerInfo>> {
        let now = self.inner.services.settings.now();
        self.inner
            .schedules
            .iter()
            .map(|(job, expr)| -> Result<TriggerInfo> {
                Ok(TriggerInfo {
                    name: job.name(),
                    schedule: expr.to_string(),
                    next_run: expr.next_after(&now),
                    last_run: self.inner.services.metrics.last_run(job.name())?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::tests::services;
    use crate::telegram::DisabledMessenger;
    use crate::Error;

    fn scheduler() -> Scheduler {
        Scheduler::new(services(), Arc::new(DisabledMessenger), Some(1)).unwrap()
    }

    #[tokio::test]
    async fn lists_every_job() {
        let triggers = scheduler().triggers().unwrap();
        assert_eq!(triggers.len(), Job::ALL.len());
        let dispatcher = triggers
            .iter()
            .find(|t| t.name == "reminder_dispatcher")
            .unwrap();
        assert_eq!(dispatcher.schedule, "*/2 * * * *");
        assert!(dispatcher.next_run.is_some());
        assert!(dispatcher.last_run.is_none());
    }

    #[tokio::test]
    async fn execute_records_run() {
        let scheduler = scheduler();
        let outcome = scheduler.execute(Job::PostPayday).await.unwrap();
        assert_eq!(outcome, JobOutcome::Sent(1));

        let run = scheduler
            .inner
            .services
            .metrics
            .last_run("post_payday")
            .unwrap()
            .unwrap();
        assert_eq!(run.status, "ok");
        assert!(run.finished_at.is_some());

        let today = scheduler.inner.services.settings.now().date_naive();
        let counters = scheduler.inner.services.metrics.day(today).unwrap();
        assert_eq!(counters.get("jobs.post_payday"), Some(&1));
    }

    #[tokio::test]
    async fn unknown_trigger_is_not_found() {
        assert!(matches!(scheduler().trigger("nope"), Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn start_and_stop() {
        let scheduler = scheduler();
        assert_eq!(scheduler.start().await, Job::ALL.len());
        assert_eq!(scheduler.start().await, 0);
        assert!(scheduler.is_running().await);
        scheduler.stop().await;
        assert!(!scheduler.is_running().await);
    }
}
