//! Scheduler job records (spec §3, §4.7).
//!
//! Grounded on the reference framework's `cron::job` module (`CronJobId`,
//! `CronJob`, fluent `CronJobBuilder`) but with real six-field cron
//! validation via `croner` in place of the reference's explicit
//! placeholder (`parse_cron_next` there just schedules a minute ahead).

use chrono::{DateTime, Utc};
use croner::Cron;
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::types::Metadata;

/// A scheduler job id.
pub type JobId = String;

/// Recurring (cron expression) or one-shot (timestamp) schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type", rename_all = "snake_case")]
pub enum JobSchedule {
    /// Fires on a six-field (with seconds) cron expression.
    Recurring {
        /// The cron expression, e.g. `"0 */5 * * * *"`.
        expression: String,
    },
    /// Fires once at `execute_at`.
    OneShot {
        /// When the job should fire.
        execute_at: DateTime<Utc>,
    },
}

impl JobSchedule {
    /// Validate a recurring schedule's cron expression eagerly; one-shot
    /// schedules have nothing to validate structurally.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if let Self::Recurring { expression } = self {
            Cron::new(expression).parse().map_err(|e| SchedulerError::InvalidSchedule {
                expression: expression.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Whether this schedule should fire now, given `last_run` (recurring)
    /// or the `executed` flag (one-shot).
    fn is_due(&self, now: DateTime<Utc>, last_run: Option<DateTime<Utc>>, executed: bool) -> bool {
        match self {
            Self::Recurring { expression } => {
                let Ok(cron) = Cron::new(expression).parse() else {
                    return false;
                };
                let since = last_run.unwrap_or(now - chrono::Duration::seconds(1));
                cron.iter_after(since).next().is_some_and(|next| next <= now)
            }
            Self::OneShot { execute_at } => !executed && *execute_at <= now,
        }
    }
}

/// A scheduled job (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Job id.
    pub id: JobId,
    /// Schedule.
    pub schedule: JobSchedule,
    /// Tool name this job invokes when it fires (spec §4.7:
    /// `"send_message"`/`"agent"` are recognised specially).
    pub tool: String,
    /// Tool payload; `"message"` is the recognised key.
    #[serde(default)]
    pub payload: Metadata,
    /// Target session id, required for channelled tools.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Originating user id.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Whether this job has fired (meaningful for one-shot jobs; recurring
    /// jobs use `last_run` instead).
    #[serde(default)]
    pub executed: bool,
    /// When this job last fired.
    #[serde(default)]
    pub executed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Start building a job with the given id and schedule.
    #[must_use]
    pub fn builder(id: impl Into<String>, schedule: JobSchedule) -> JobBuilder {
        JobBuilder::new(id, schedule)
    }

    /// Whether this job should fire at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.schedule.is_due(now, self.executed_at, self.executed)
    }

    /// Mark this job as having fired at `now`.
    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        self.executed = true;
        self.executed_at = Some(now);
    }

    /// The `payload.message` field, if present and a string.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.payload.get("message").and_then(serde_json::Value::as_str)
    }
}

/// Fluent builder for [`Job`], matching the reference framework's style.
#[derive(Debug)]
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    fn new(id: impl Into<String>, schedule: JobSchedule) -> Self {
        Self {
            job: Job {
                id: id.into(),
                schedule,
                tool: String::new(),
                payload: Metadata::new(),
                session_id: None,
                user_id: None,
                metadata: Metadata::new(),
                executed: false,
                executed_at: None,
            },
        }
    }

    /// Set the tool name.
    #[must_use]
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.job.tool = tool.into();
        self
    }

    /// Set the `payload.message` field.
    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.job.payload.insert("message".to_string(), serde_json::Value::String(message.into()));
        self
    }

    /// Set the target session id.
    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.job.session_id = Some(session_id.into());
        self
    }

    /// Set the originating user id.
    #[must_use]
    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.job.user_id = Some(user_id.into());
        self
    }

    /// Build the job, validating its schedule.
    pub fn build(self) -> Result<Job, SchedulerError> {
        self.job.schedule.validate()?;
        Ok(self.job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_cron_expression_accepted() {
        let schedule = JobSchedule::Recurring {
            expression: "0 */5 * * * *".to_string(),
        };
        assert!(schedule.validate().is_ok());
    }

    #[test]
    fn test_invalid_cron_expression_rejected() {
        let schedule = JobSchedule::Recurring {
            expression: "not a cron expression".to_string(),
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn test_one_shot_past_due_is_due() {
        let schedule = JobSchedule::OneShot {
            execute_at: Utc::now() - chrono::Duration::seconds(1),
        };
        let job = Job::builder("j1", schedule)
            .tool("send_message")
            .message("ping")
            .session_id("telegram:1")
            .build()
            .unwrap();
        assert!(job.is_due(Utc::now()));
    }

    #[test]
    fn test_one_shot_executed_is_not_due_again() {
        let schedule = JobSchedule::OneShot {
            execute_at: Utc::now() - chrono::Duration::seconds(1),
        };
        let mut job = Job::builder("j1", schedule).tool("send_message").build().unwrap();
        job.mark_fired(Utc::now());
        assert!(!job.is_due(Utc::now()));
    }

    #[test]
    fn test_builder_rejects_invalid_schedule() {
        let schedule = JobSchedule::Recurring {
            expression: "garbage".to_string(),
        };
        assert!(Job::builder("j1", schedule).build().is_err());
    }
}
