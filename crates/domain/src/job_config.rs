use std::collections::BTreeMap;

use tempora_core::{AppError, AppResult};

use crate::schedule::CronSchedule;
use crate::spec::FlowSpec;

/// Property key carrying the job name.
pub const JOB_NAME_KEY: &str = "job.name";
/// Property key carrying the recurring cron expression.
pub const JOB_SCHEDULE_KEY: &str = "job.schedule";
/// Property key requesting one immediate run next to the recurring trigger.
pub const FLOW_RUN_IMMEDIATELY_KEY: &str = "flow.runImmediately";

/// Merged key/value configuration for one scheduled or one-off job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobConfig {
    properties: BTreeMap<String, String>,
    flow_spec: Option<FlowSpec>,
}

impl JobConfig {
    /// Creates a job config from raw properties.
    #[must_use]
    pub fn new(properties: BTreeMap<String, String>) -> Self {
        Self {
            properties,
            flow_spec: None,
        }
    }

    /// Builds the job config for one flow: base service properties, then the
    /// flow's own properties, then the job name pinned to the flow uri.
    #[must_use]
    pub fn for_flow(base_properties: &BTreeMap<String, String>, flow_spec: &FlowSpec) -> Self {
        let mut properties = base_properties.clone();
        properties.extend(
            flow_spec
                .properties()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        properties.insert(JOB_NAME_KEY.to_owned(), flow_spec.uri().to_owned());

        Self {
            properties,
            flow_spec: None,
        }
    }

    /// Attaches a snapshot of the flow spec this config was built from.
    #[must_use]
    pub fn with_flow_spec(mut self, flow_spec: FlowSpec) -> Self {
        self.flow_spec = Some(flow_spec);
        self
    }

    /// Returns the attached flow spec snapshot.
    #[must_use]
    pub fn flow_spec(&self) -> Option<&FlowSpec> {
        self.flow_spec.as_ref()
    }

    /// Returns the job name, or an empty string when missing.
    #[must_use]
    pub fn job_name(&self) -> &str {
        self.get(JOB_NAME_KEY).unwrap_or_default()
    }

    /// Returns true when a cron expression is configured.
    #[must_use]
    pub fn has_schedule(&self) -> bool {
        self.get(JOB_SCHEDULE_KEY)
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Parses the configured cron expression, if any.
    pub fn schedule(&self) -> AppResult<Option<CronSchedule>> {
        match self.get(JOB_SCHEDULE_KEY) {
            Some(expression) if !expression.trim().is_empty() => {
                CronSchedule::parse(expression).map(Some).map_err(|error| {
                    AppError::Validation(format!(
                        "job '{}' has an unusable schedule: {error}",
                        self.job_name()
                    ))
                })
            }
            _ => Ok(None),
        }
    }

    /// Returns true when an immediate run is requested. Presence of the key is
    /// enough unless its value is literally `false`.
    #[must_use]
    pub fn run_immediately(&self) -> bool {
        self.get(FLOW_RUN_IMMEDIATELY_KEY)
            .is_some_and(|value| !value.trim().eq_ignore_ascii_case("false"))
    }

    /// Returns one property value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// Returns all properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{FLOW_RUN_IMMEDIATELY_KEY, JOB_NAME_KEY, JOB_SCHEDULE_KEY, JobConfig};
    use crate::spec::{FlowSpec, FlowSpecInput};

    fn flow(properties: &[(&str, &str)]) -> FlowSpec {
        FlowSpec::new(FlowSpecInput {
            uri: "flow://A".to_owned(),
            version: "1".to_owned(),
            description: None,
            properties: properties
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        })
        .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn flow_properties_override_base_and_job_name_is_pinned() {
        let base = BTreeMap::from([
            ("owner".to_owned(), "platform".to_owned()),
            (JOB_NAME_KEY.to_owned(), "ignored".to_owned()),
            ("retries".to_owned(), "1".to_owned()),
        ]);
        let config = JobConfig::for_flow(&base, &flow(&[("retries", "5")]));

        assert_eq!(config.job_name(), "flow://A");
        assert_eq!(config.get("owner"), Some("platform"));
        assert_eq!(config.get("retries"), Some("5"));
        assert!(!config.has_schedule());
    }

    #[test]
    fn run_immediately_follows_key_presence() {
        let requested = JobConfig::for_flow(&BTreeMap::new(), &flow(&[(FLOW_RUN_IMMEDIATELY_KEY, "")]));
        let disabled =
            JobConfig::for_flow(&BTreeMap::new(), &flow(&[(FLOW_RUN_IMMEDIATELY_KEY, "FALSE")]));
        let absent = JobConfig::for_flow(&BTreeMap::new(), &flow(&[]));

        assert!(requested.run_immediately());
        assert!(!disabled.run_immediately());
        assert!(!absent.run_immediately());
    }

    #[test]
    fn schedule_is_parsed_when_present() {
        let config = JobConfig::for_flow(&BTreeMap::new(), &flow(&[(JOB_SCHEDULE_KEY, "0 0 * * *")]));
        let schedule = config.schedule();

        assert!(config.has_schedule());
        assert_eq!(
            schedule
                .ok()
                .flatten()
                .map(|schedule| schedule.expression().to_owned()),
            Some("0 0 * * *".to_owned())
        );
    }

    #[test]
    fn invalid_schedule_names_the_job() {
        let config = JobConfig::for_flow(&BTreeMap::new(), &flow(&[(JOB_SCHEDULE_KEY, "nope")]));
        let error = config.schedule().err().map(|error| error.to_string());

        assert!(error.is_some_and(|message| message.contains("flow://A")));
    }
}
