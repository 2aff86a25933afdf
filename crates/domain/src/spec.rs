use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tempora_core::{AppResult, NonEmptyString};

/// Discriminates spec variants without borrowing their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecKind {
    /// Schedulable flow spec.
    Flow,
    /// Executor topology spec, never scheduled.
    Topology,
}

impl SpecKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flow => "flow",
            Self::Topology => "topology",
        }
    }
}

/// Identified, versioned configuration object published by a catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Spec {
    /// A flow that can be scheduled and run.
    Flow(FlowSpec),
    /// An executor topology description.
    Topology(TopologySpec),
}

impl Spec {
    /// Returns the stable spec identifier.
    #[must_use]
    pub fn uri(&self) -> &str {
        match self {
            Self::Flow(spec) => spec.uri(),
            Self::Topology(spec) => spec.uri(),
        }
    }

    /// Returns the catalog-assigned version.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Flow(spec) => spec.version(),
            Self::Topology(spec) => spec.version(),
        }
    }

    /// Returns the spec kind.
    #[must_use]
    pub fn kind(&self) -> SpecKind {
        match self {
            Self::Flow(_) => SpecKind::Flow,
            Self::Topology(_) => SpecKind::Topology,
        }
    }

    /// Returns the flow payload when this is a flow spec.
    #[must_use]
    pub fn as_flow(&self) -> Option<&FlowSpec> {
        match self {
            Self::Flow(spec) => Some(spec),
            Self::Topology(_) => None,
        }
    }
}

impl Display for Spec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{}:{}/{}",
            self.kind().as_str(),
            self.uri(),
            self.version()
        )
    }
}

/// Named, versioned, schedulable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSpec {
    uri: NonEmptyString,
    version: NonEmptyString,
    description: Option<String>,
    properties: BTreeMap<String, String>,
}

/// Input payload used to construct a validated flow spec.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FlowSpecInput {
    /// Stable flow identifier.
    pub uri: String,
    /// Catalog-assigned version.
    pub version: String,
    /// Optional human-readable description.
    pub description: Option<String>,
    /// Key/value configuration, including the optional schedule.
    pub properties: BTreeMap<String, String>,
}

impl FlowSpec {
    /// Creates a validated flow spec.
    pub fn new(input: FlowSpecInput) -> AppResult<Self> {
        let FlowSpecInput {
            uri,
            version,
            description,
            properties,
        } = input;

        Ok(Self {
            uri: NonEmptyString::new(uri)?,
            version: NonEmptyString::new(version)?,
            description: description.filter(|value| !value.trim().is_empty()),
            properties,
        })
    }

    /// Returns the stable flow identifier.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri.as_str()
    }

    /// Returns the catalog-assigned version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the flow configuration properties.
    #[must_use]
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// Executor topology description. Carried through catalogs, ignored by scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySpec {
    uri: NonEmptyString,
    version: NonEmptyString,
    description: Option<String>,
}

impl TopologySpec {
    /// Creates a validated topology spec.
    pub fn new(
        uri: impl Into<String>,
        version: impl Into<String>,
        description: Option<String>,
    ) -> AppResult<Self> {
        Ok(Self {
            uri: NonEmptyString::new(uri)?,
            version: NonEmptyString::new(version)?,
            description,
        })
    }

    /// Returns the stable topology identifier.
    #[must_use]
    pub fn uri(&self) -> &str {
        self.uri.as_str()
    }

    /// Returns the catalog-assigned version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}
