//! Configuration management for Lambda functions.

use std::env;

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::{Error, Result};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Record store table name
    pub table_name: String,
    /// AWS region
    pub aws_region: String,
    /// Whether create/update also require `entryCount`
    pub require_entry_count: bool,
    /// Scheduled callback settings; `None` disables scheduling
    pub schedule: Option<ScheduleConfig>,
}

/// Where and how deferred updates get scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleConfig {
    /// ARN of the function the schedule invokes
    pub target_arn: String,
    /// Role the scheduler assumes to invoke the target
    pub role_arn: String,
    /// Schedule group (service default when unset)
    pub group_name: Option<String>,
    /// Timezone for trigger times that carry no offset
    pub timezone: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let table_name =
            var("TABLE_NAME").ok_or_else(|| Error::Config("TABLE_NAME not set".to_string()))?;

        let require_entry_count = match var("REQUIRE_ENTRY_COUNT") {
            Some(value) => parse_flag("REQUIRE_ENTRY_COUNT", &value)?,
            None => false,
        };

        let schedule = match (var("SCHEDULE_TARGET_ARN"), var("SCHEDULE_ROLE_ARN")) {
            (Some(target_arn), Some(role_arn)) => Some(ScheduleConfig {
                target_arn,
                role_arn,
                group_name: var("SCHEDULE_GROUP_NAME"),
                timezone: var("SCHEDULE_TIMEZONE").unwrap_or_else(|| "UTC".to_string()),
            }),
            (None, None) => None,
            (Some(_), None) => {
                return Err(Error::Config(
                    "SCHEDULE_TARGET_ARN is set but SCHEDULE_ROLE_ARN is not".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(Error::Config(
                    "SCHEDULE_ROLE_ARN is set but SCHEDULE_TARGET_ARN is not".to_string(),
                ))
            }
        };

        Ok(Self {
            table_name,
            aws_region: var("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            require_entry_count,
            schedule,
        })
    }

    /// Load the AWS SDK configuration for the configured region.
    pub async fn sdk_config(&self) -> SdkConfig {
        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.aws_region.clone()))
            .load()
            .await
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(Error::Config(format!("{} has invalid value '{}'", key, other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_minimal_config() {
        let config = config_from(&[("TABLE_NAME", "events")]).unwrap();
        assert_eq!(config.table_name, "events");
        assert_eq!(config.aws_region, "us-east-1");
        assert!(!config.require_entry_count);
        assert!(config.schedule.is_none());
    }

    #[test]
    fn test_missing_table_name() {
        let err = config_from(&[("AWS_REGION", "eu-west-1")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_schedule_enabled_with_target_and_role() {
        let config = config_from(&[
            ("TABLE_NAME", "events"),
            ("SCHEDULE_TARGET_ARN", "arn:aws:lambda:us-east-1:123:function:updater"),
            ("SCHEDULE_ROLE_ARN", "arn:aws:iam::123:role/scheduler"),
            ("SCHEDULE_TIMEZONE", "America/Bogota"),
        ])
        .unwrap();

        let schedule = config.schedule.unwrap();
        assert_eq!(schedule.target_arn, "arn:aws:lambda:us-east-1:123:function:updater");
        assert_eq!(schedule.timezone, "America/Bogota");
        assert_eq!(schedule.group_name, None);
    }

    #[test]
    fn test_schedule_half_configured_is_an_error() {
        let err = config_from(&[
            ("TABLE_NAME", "events"),
            ("SCHEDULE_TARGET_ARN", "arn:aws:lambda:us-east-1:123:function:updater"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_require_entry_count_flag() {
        let config = config_from(&[("TABLE_NAME", "events"), ("REQUIRE_ENTRY_COUNT", "True")]).unwrap();
        assert!(config.require_entry_count);

        let err = config_from(&[("TABLE_NAME", "events"), ("REQUIRE_ENTRY_COUNT", "maybe")]).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
