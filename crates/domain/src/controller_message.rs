use serde::{Deserialize, Serialize};
use tempora_core::{AppError, AppResult};
use uuid::Uuid;

/// Message category forwarded by standby nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMessageType {
    /// A flow spec was added; payload is the flow uri.
    FlowSpecAdd,
    /// A flow spec was removed; payload is `{uri}:{version}`.
    FlowSpecRemove,
}

impl ControllerMessageType {
    /// Returns stable wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FlowSpecAdd => "flow_spec_add",
            Self::FlowSpecRemove => "flow_spec_remove",
        }
    }
}

/// Cluster role a forwarded message is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetRole {
    /// The elected controller (leader).
    Controller,
}

/// Best-effort notice forwarded from a standby node to the controller role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerMessage {
    /// Message category.
    pub message_type: ControllerMessageType,
    /// Category-specific payload.
    pub payload: String,
    /// Random correlation identifier for tracing one notice across nodes.
    pub correlation_id: Uuid,
    /// Addressed role.
    pub target_role: TargetRole,
}

impl ControllerMessage {
    /// Builds an "add" notice for one flow.
    #[must_use]
    pub fn flow_spec_add(uri: &str) -> Self {
        Self {
            message_type: ControllerMessageType::FlowSpecAdd,
            payload: uri.to_owned(),
            correlation_id: Uuid::new_v4(),
            target_role: TargetRole::Controller,
        }
    }

    /// Builds a "remove" notice for one flow version.
    #[must_use]
    pub fn flow_spec_remove(uri: &str, version: &str) -> Self {
        Self {
            message_type: ControllerMessageType::FlowSpecRemove,
            payload: format!("{uri}:{version}"),
            correlation_id: Uuid::new_v4(),
            target_role: TargetRole::Controller,
        }
    }

    /// Splits a remove payload into uri and version. The version is everything
    /// after the last `:` since flow uris carry their own scheme separator.
    pub fn removed_uri_and_version(&self) -> AppResult<(&str, &str)> {
        if self.message_type != ControllerMessageType::FlowSpecRemove {
            return Err(AppError::Validation(format!(
                "message '{}' is not a flow spec removal",
                self.correlation_id
            )));
        }

        match self.payload.rsplit_once(':') {
            Some((uri, version)) if !uri.trim().is_empty() && !version.trim().is_empty() => {
                Ok((uri, version))
            }
            _ => Err(AppError::Validation(format!(
                "flow spec removal payload '{}' must be '<uri>:<version>'",
                self.payload
            ))),
        }
    }
}
