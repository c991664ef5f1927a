//! One-shot scheduled callbacks via EventBridge Scheduler.
//!
//! A registered schedule fires once at the trigger time and invokes the
//! deferred update function with the stored payload. Nothing is retried and
//! the firing itself is never verified.

use async_trait::async_trait;
use aws_sdk_scheduler::error::DisplayErrorContext;
use aws_sdk_scheduler::types::{
    ActionAfterCompletion, FlexibleTimeWindow, FlexibleTimeWindowMode, Target,
};
use aws_sdk_scheduler::Client as SchedulerClient;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::{Error, Result};

/// Schedule names are limited to 64 characters by the service.
const MAX_NAME_ID_LEN: usize = 32;

/// A schedule that was accepted by the scheduling service.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledCallback {
    pub name: String,
    pub expression: String,
    pub timezone: String,
}

/// Registers one-shot timed invocations of the deferred update function.
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Register a callback firing once at `trigger_time` with `payload` as input.
    ///
    /// `name_hint` seeds the schedule name; every call gets a unique name.
    async fn register_one_shot(
        &self,
        name_hint: &str,
        trigger_time: &str,
        payload: &str,
    ) -> Result<ScheduledCallback>;
}

/// An `at(...)` schedule expression and the timezone it is evaluated in.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotExpression {
    pub expression: String,
    pub timezone: String,
}

/// Build the one-shot expression for a trigger time.
///
/// Times with an offset are converted to UTC; naive times are taken as-is in
/// `default_timezone`.
pub fn one_shot_expression(trigger_time: &str, default_timezone: &str) -> Result<OneShotExpression> {
    let text = trigger_time.trim();
    let at = |naive: NaiveDateTime| format!("at({})", naive.format("%Y-%m-%dT%H:%M:%S"));

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(OneShotExpression {
            expression: at(dt.with_timezone(&Utc).naive_utc()),
            timezone: "UTC".to_string(),
        });
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(OneShotExpression {
                expression: at(naive),
                timezone: default_timezone.to_string(),
            });
        }
    }

    Err(Error::Scheduling(format!(
        "invalid trigger time '{}': expected RFC 3339 or YYYY-MM-DDThh:mm:ss",
        trigger_time
    )))
}

/// Schedule name derived from the record id, the current time and a short random suffix.
pub fn schedule_name(name_hint: &str, now: DateTime<Utc>) -> String {
    let id: String = name_hint
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .take(MAX_NAME_ID_LEN)
        .collect();

    let suffix = Uuid::new_v4().simple().to_string();
    format!("event-{}-{}-{}", id, now.timestamp_millis(), &suffix[..8])
}

/// Scheduler backed by EventBridge Scheduler `CreateSchedule`.
pub struct EventBridgeScheduler {
    client: SchedulerClient,
    config: ScheduleConfig,
}

impl EventBridgeScheduler {
    pub fn new(client: SchedulerClient, config: ScheduleConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Scheduler for EventBridgeScheduler {
    async fn register_one_shot(
        &self,
        name_hint: &str,
        trigger_time: &str,
        payload: &str,
    ) -> Result<ScheduledCallback> {
        let schedule = one_shot_expression(trigger_time, &self.config.timezone)?;
        let name = schedule_name(name_hint, Utc::now());

        let window = FlexibleTimeWindow::builder()
            .mode(FlexibleTimeWindowMode::Off)
            .build()
            .map_err(|e| Error::Scheduling(format!("Invalid time window: {}", e)))?;

        let target = Target::builder()
            .arn(&self.config.target_arn)
            .role_arn(&self.config.role_arn)
            .input(payload)
            .build()
            .map_err(|e| Error::Scheduling(format!("Invalid schedule target: {}", e)))?;

        let mut request = self
            .client
            .create_schedule()
            .name(&name)
            .schedule_expression(&schedule.expression)
            .schedule_expression_timezone(&schedule.timezone)
            .flexible_time_window(window)
            .target(target)
            .action_after_completion(ActionAfterCompletion::Delete);

        if let Some(group) = &self.config.group_name {
            request = request.group_name(group);
        }

        request.send().await.map_err(|e| {
            Error::Scheduling(format!("CreateSchedule failed: {}", DisplayErrorContext(&e)))
        })?;

        info!(
            schedule_name = %name,
            expression = %schedule.expression,
            timezone = %schedule.timezone,
            "Registered one-shot schedule"
        );

        Ok(ScheduledCallback {
            name,
            expression: schedule.expression,
            timezone: schedule.timezone,
        })
    }
}
