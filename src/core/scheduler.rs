use crate::domain::ports::Notifier;
use crate::utils::error::{HubError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration as ChronoDuration, NaiveTime, Utc, Weekday};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// When a job fires. Times are UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { at: NaiveTime },
    Weekly { day: Weekday, at: NaiveTime },
}

fn parse_time(time: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(time.trim(), "%H:%M").map_err(|e| HubError::ConfigError {
        message: format!("invalid time '{}' (expected HH:MM): {}", time, e),
    })
}

impl Schedule {
    pub fn daily_at(time: &str) -> Result<Self> {
        Ok(Schedule::Daily {
            at: parse_time(time)?,
        })
    }

    pub fn weekly_at(day: &str, time: &str) -> Result<Self> {
        let day: Weekday = day.trim().parse().map_err(|_| HubError::ConfigError {
            message: format!("invalid weekday '{}'", day),
        })?;
        Ok(Schedule::Weekly {
            day,
            at: parse_time(time)?,
        })
    }

    /// First fire time strictly after `now`.
    pub fn next_run_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match *self {
            Schedule::Daily { at } => {
                let candidate = now.date_naive().and_time(at).and_utc();
                if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::days(1)
                }
            }
            Schedule::Weekly { day, at } => {
                let today = now.weekday().num_days_from_monday() as i64;
                let target = day.num_days_from_monday() as i64;
                let days_ahead = (target - today).rem_euclid(7);
                let candidate = (now.date_naive() + ChronoDuration::days(days_ahead))
                    .and_time(at)
                    .and_utc();
                if candidate > now {
                    candidate
                } else {
                    candidate + ChronoDuration::days(7)
                }
            }
        }
    }

    /// Fire time after a run that was due at `fired`. Counts from whichever
    /// of `fired` and `now` is later, so a clock behind the timer cannot hand
    /// back the slot that just ran.
    pub fn following_run(&self, fired: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        self.next_run_after(fired.max(now))
    }
}

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &str;

    /// Returns a one-line summary of the run.
    async fn run(&self) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed(String),
    Skipped,
    Failed(String),
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Wraps a job with its schedule, an overlap guard and failure notification.
pub struct JobRunner {
    job: Arc<dyn ScheduledJob>,
    schedule: Schedule,
    running: AtomicBool,
    notifier: Arc<dyn Notifier>,
    admin_email: Option<String>,
}

impl JobRunner {
    pub fn new(
        job: Arc<dyn ScheduledJob>,
        schedule: Schedule,
        notifier: Arc<dyn Notifier>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            job,
            schedule,
            running: AtomicBool::new(false),
            notifier,
            admin_email,
        }
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn schedule(&self) -> Schedule {
        self.schedule
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn run_once(&self) -> RunStatus {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("⏭️ Job '{}' is still running, skipping this run", self.name());
            return RunStatus::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        tracing::info!("⏰ Job '{}' started", self.name());
        let started = Instant::now();

        match self.job.run().await {
            Ok(summary) => {
                tracing::info!(
                    "✅ Job '{}' finished in {:.2}s: {}",
                    self.name(),
                    started.elapsed().as_secs_f64(),
                    summary
                );
                RunStatus::Completed(summary)
            }
            Err(e) => {
                tracing::error!(
                    "❌ Job '{}' failed after {:.2}s: {} (Severity: {:?})",
                    self.name(),
                    started.elapsed().as_secs_f64(),
                    e,
                    e.severity()
                );
                self.notify_failure(&e).await;
                RunStatus::Failed(e.to_string())
            }
        }
    }

    async fn notify_failure(&self, error: &HubError) {
        let Some(to) = &self.admin_email else {
            tracing::warn!("No admin email configured, failure of '{}' not mailed", self.name());
            return;
        };

        let subject = format!("[wound-care-hub] Scheduled job '{}' failed", self.name());
        let body = format!(
            "Job: {}\nTime: {}\nError: {}\nSuggestion: {}\n",
            self.name(),
            Utc::now().to_rfc3339(),
            error,
            error.recovery_suggestion()
        );

        if let Err(e) = self.notifier.notify(to, &subject, &body).await {
            tracing::error!("❌ Could not send failure notification for '{}': {}", self.name(), e);
        }
    }
}

#[derive(Default)]
pub struct Scheduler {
    runners: Vec<Arc<JobRunner>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, runner: Arc<JobRunner>) {
        self.runners.push(runner);
    }

    pub fn runners(&self) -> &[Arc<JobRunner>] {
        &self.runners
    }

    /// Spawns one timer loop per job. A run is spawned as its own task so a
    /// slow run overlaps the next tick, which the guard then skips.
    pub fn start(&self) -> Vec<JoinHandle<()>> {
        self.runners
            .iter()
            .map(|runner| {
                let runner = Arc::clone(runner);
                tokio::spawn(async move {
                    let mut next = runner.schedule().next_run_after(Utc::now());
                    loop {
                        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                        tracing::info!("🗓️ Job '{}' next run at {}", runner.name(), next);
                        tokio::time::sleep(wait).await;

                        let run = Arc::clone(&runner);
                        tokio::spawn(async move {
                            run.run_once().await;
                        });
                        next = runner.schedule().following_run(next, Utc::now());
                    }
                })
            })
            .collect()
    }
}
