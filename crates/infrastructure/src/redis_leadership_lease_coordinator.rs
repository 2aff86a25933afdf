//! Redis-backed leadership lease used to elect the controller node.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use tempora_application::{LeadershipLease, LeadershipLeaseCoordinator};
use tempora_core::{AppError, AppResult};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const RENEW_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of leadership lease coordination.
#[derive(Clone)]
pub struct RedisLeadershipLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisLeadershipLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:leader:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

fn validate_lease_seconds(lease_seconds: u32) -> AppResult<()> {
    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "leadership lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

#[async_trait]
impl LeadershipLeaseCoordinator for RedisLeadershipLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<LeadershipLease>> {
        if scope_key.trim().is_empty() {
            return Err(AppError::Validation(
                "leadership lease scope_key must not be empty".to_owned(),
            ));
        }

        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "leadership lease holder_id must not be empty".to_owned(),
            ));
        }

        validate_lease_seconds(lease_seconds)?;

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        let acquired: bool = connection
            .set_nx(key.as_str(), token.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire leadership lease: {error}"))
            })?;
        if !acquired {
            return Ok(None);
        }

        connection
            .expire::<_, ()>(key.as_str(), i64::from(lease_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to set leadership lease ttl: {error}"))
            })?;

        Ok(Some(LeadershipLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &LeadershipLease) -> AppResult<()> {
        let mut connection = self.connection().await?;

        Script::new(RELEASE_LEASE_SCRIPT)
            .key(self.key_for(lease.scope_key.as_str()))
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release leadership lease: {error}"))
            })?;

        Ok(())
    }

    async fn renew_lease(&self, lease: &LeadershipLease, lease_seconds: u32) -> AppResult<bool> {
        validate_lease_seconds(lease_seconds)?;
        let mut connection = self.connection().await?;

        let renewed = Script::new(RENEW_LEASE_SCRIPT)
            .key(self.key_for(lease.scope_key.as_str()))
            .arg(lease.token.as_str())
            .arg(i64::from(lease_seconds))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to renew leadership lease: {error}"))
            })?;

        Ok(renewed > 0)
    }
}
