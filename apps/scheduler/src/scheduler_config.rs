use std::collections::BTreeMap;
use std::env;
use std::fmt::Display;
use std::str::FromStr;

use tempora_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub redis_key_prefix: String,
    pub node_id: String,
    pub lease_seconds: u32,
    pub lease_renew_interval_ms: u64,
    pub inbox_poll_interval_ms: u64,
    pub immediate_run_workers: usize,
    pub trigger_workers: usize,
    pub orchestrator_url: Url,
    pub orchestrator_max_attempts: u8,
    pub orchestrator_retry_backoff_ms: u64,
    pub job_properties: BTreeMap<String, String>,
}

impl SchedulerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let optional = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let orchestrator_url = optional("ORCHESTRATOR_URL")
            .ok_or_else(|| AppError::Validation("ORCHESTRATOR_URL is required".to_owned()))?;
        let orchestrator_url = Url::parse(orchestrator_url.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid ORCHESTRATOR_URL '{orchestrator_url}': {error}"
            ))
        })?;
        if !matches!(orchestrator_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "ORCHESTRATOR_URL must use http or https, got '{}'",
                orchestrator_url.scheme()
            )));
        }

        let node_id = optional("SCHEDULER_NODE_ID")
            .unwrap_or_else(|| format!("scheduler-{}", std::process::id()));
        let lease_seconds = parse_or(&optional, "SCHEDULER_LEASE_SECONDS", 30_u32)?;
        let lease_renew_interval_ms =
            parse_or(&optional, "SCHEDULER_LEASE_RENEW_INTERVAL_MS", 10_000_u64)?;
        let inbox_poll_interval_ms =
            parse_or(&optional, "SCHEDULER_INBOX_POLL_INTERVAL_MS", 1_000_u64)?;
        let immediate_run_workers =
            parse_or(&optional, "SCHEDULER_IMMEDIATE_RUN_WORKERS", 4_usize)?;
        let trigger_workers = parse_or(&optional, "SCHEDULER_TRIGGER_WORKERS", 8_usize)?;
        let orchestrator_max_attempts = parse_or(&optional, "ORCHESTRATOR_MAX_ATTEMPTS", 3_u8)?;
        let orchestrator_retry_backoff_ms =
            parse_or(&optional, "ORCHESTRATOR_RETRY_BACKOFF_MS", 250_u64)?;

        for (name, value) in [
            ("SCHEDULER_LEASE_SECONDS", u64::from(lease_seconds)),
            ("SCHEDULER_LEASE_RENEW_INTERVAL_MS", lease_renew_interval_ms),
            ("SCHEDULER_INBOX_POLL_INTERVAL_MS", inbox_poll_interval_ms),
            ("SCHEDULER_IMMEDIATE_RUN_WORKERS", immediate_run_workers as u64),
            ("SCHEDULER_TRIGGER_WORKERS", trigger_workers as u64),
            ("ORCHESTRATOR_MAX_ATTEMPTS", u64::from(orchestrator_max_attempts)),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        if lease_renew_interval_ms >= u64::from(lease_seconds).saturating_mul(1_000) {
            return Err(AppError::Validation(
                "SCHEDULER_LEASE_RENEW_INTERVAL_MS must be shorter than the lease".to_owned(),
            ));
        }

        let job_properties = match optional("SCHEDULER_JOB_PROPERTIES") {
            Some(raw) => parse_job_properties(raw.as_str())?,
            None => BTreeMap::new(),
        };

        Ok(Self {
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            redis_key_prefix: optional("SCHEDULER_REDIS_KEY_PREFIX")
                .unwrap_or_else(|| "tempora:scheduler".to_owned()),
            node_id,
            lease_seconds,
            lease_renew_interval_ms,
            inbox_poll_interval_ms,
            immediate_run_workers,
            trigger_workers,
            orchestrator_url,
            orchestrator_max_attempts,
            orchestrator_retry_backoff_ms,
            job_properties,
        })
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parse_or<T>(optional: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(name) {
        Some(value) => value.parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}

/// Parses `key=value;key=value` pairs. Blank segments are skipped.
fn parse_job_properties(raw: &str) -> AppResult<BTreeMap<String, String>> {
    let mut properties = BTreeMap::new();

    for segment in raw.split(';').map(str::trim).filter(|segment| !segment.is_empty()) {
        let Some((key, value)) = segment.split_once('=') else {
            return Err(AppError::Validation(format!(
                "SCHEDULER_JOB_PROPERTIES entry '{segment}' must be key=value"
            )));
        };

        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::Validation(format!(
                "SCHEDULER_JOB_PROPERTIES entry '{segment}' has an empty key"
            )));
        }

        properties.insert(key.to_owned(), value.trim().to_owned());
    }

    Ok(properties)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tempora_core::AppError;

    use super::{SchedulerConfig, parse_job_properties};

    fn load(pairs: &[(&str, &str)]) -> Result<SchedulerConfig, AppError> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        SchedulerConfig::from_lookup(|name| values.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_orchestrator_is_set() {
        let config = load(&[("ORCHESTRATOR_URL", "http://127.0.0.1:8080/runs")])
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.database_url, None);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.lease_seconds, 30);
        assert_eq!(config.lease_renew_interval_ms, 10_000);
        assert_eq!(config.inbox_poll_interval_ms, 1_000);
        assert_eq!(config.immediate_run_workers, 4);
        assert_eq!(config.trigger_workers, 8);
        assert_eq!(config.redis_key_prefix, "tempora:scheduler");
        assert!(config.node_id.starts_with("scheduler-"));
        assert!(config.job_properties.is_empty());
    }

    #[test]
    fn orchestrator_url_is_required_and_validated() {
        assert!(matches!(load(&[]), Err(AppError::Validation(_))));
        assert!(matches!(
            load(&[("ORCHESTRATOR_URL", "not a url")]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            load(&[("ORCHESTRATOR_URL", "ftp://engine/runs")]),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn blank_optional_values_count_as_unset() {
        let config = load(&[
            ("ORCHESTRATOR_URL", "https://engine.internal/runs"),
            ("REDIS_URL", "  "),
            ("SCHEDULER_NODE_ID", " node-a "),
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(config.redis_url, None);
        assert_eq!(config.node_id, "node-a");
    }

    #[test]
    fn zero_sizes_and_long_renew_intervals_are_rejected() {
        let zero_workers = load(&[
            ("ORCHESTRATOR_URL", "http://engine/runs"),
            ("SCHEDULER_IMMEDIATE_RUN_WORKERS", "0"),
        ]);
        assert!(matches!(zero_workers, Err(AppError::Validation(_))));

        let slow_renew = load(&[
            ("ORCHESTRATOR_URL", "http://engine/runs"),
            ("SCHEDULER_LEASE_SECONDS", "5"),
            ("SCHEDULER_LEASE_RENEW_INTERVAL_MS", "5000"),
        ]);
        assert!(matches!(slow_renew, Err(AppError::Validation(_))));

        let not_a_number = load(&[
            ("ORCHESTRATOR_URL", "http://engine/runs"),
            ("SCHEDULER_TRIGGER_WORKERS", "many"),
        ]);
        assert!(matches!(not_a_number, Err(AppError::Validation(_))));
    }

    #[test]
    fn job_properties_parse_key_value_pairs() {
        let properties = parse_job_properties(" owner = platform ;; retries=2;")
            .unwrap_or_else(|_| unreachable!());

        assert_eq!(properties.len(), 2);
        assert_eq!(properties.get("owner").map(String::as_str), Some("platform"));
        assert_eq!(properties.get("retries").map(String::as_str), Some("2"));

        assert!(parse_job_properties("owner").is_err());
        assert!(parse_job_properties("=value").is_err());
    }
}
