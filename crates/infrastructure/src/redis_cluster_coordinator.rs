//! Redis list used as the standby-to-controller notice channel.

use std::num::NonZeroUsize;

use async_trait::async_trait;
use redis::AsyncCommands;
use tempora_application::{ClusterCoordinator, ControllerInbox};
use tempora_core::{AppError, AppResult};
use tempora_domain::ControllerMessage;
use tracing::warn;

/// Redis implementation of both ends of the controller notice channel.
#[derive(Clone)]
pub struct RedisClusterCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisClusterCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn inbox_key(&self) -> String {
        format!("{}:controller:inbox", self.key_prefix)
    }
}

#[async_trait]
impl ClusterCoordinator for RedisClusterCoordinator {
    async fn try_send(&self, message: ControllerMessage) -> AppResult<()> {
        let encoded = serde_json::to_string(&message).map_err(|error| {
            AppError::Internal(format!("failed to encode controller message: {error}"))
        })?;

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))?;

        connection
            .rpush::<_, _, ()>(self.inbox_key(), encoded)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to push controller message: {error}"))
            })
    }
}

#[async_trait]
impl ControllerInbox for RedisClusterCoordinator {
    async fn receive(&self, limit: usize) -> AppResult<Vec<ControllerMessage>> {
        let Some(count) = NonZeroUsize::new(limit) else {
            return Ok(Vec::new());
        };

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))?;

        let raw: Option<Vec<String>> = connection
            .lpop(self.inbox_key(), Some(count))
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to pop controller messages: {error}"))
            })?;

        Ok(raw
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| decode_message(value.as_str()))
            .collect())
    }
}

fn decode_message(value: &str) -> Option<ControllerMessage> {
    match serde_json::from_str(value) {
        Ok(message) => Some(message),
        Err(error) => {
            warn!(error = %error, "dropping malformed controller message");
            None
        }
    }
}
