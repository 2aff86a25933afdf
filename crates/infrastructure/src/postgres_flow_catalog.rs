use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tempora_application::{FlowCatalog, SpecCatalogListener};
use tempora_core::{AppError, AppResult};
use tempora_domain::{FlowSpec, FlowSpecInput, Spec, SpecKind, TopologySpec};

use crate::spec_listener_registry::SpecListenerRegistry;


/// PostgreSQL-backed spec catalog.
#[derive(Clone)]
pub struct PostgresFlowCatalog {
    pool: PgPool,
    listeners: Arc<SpecListenerRegistry>,
}

impl PostgresFlowCatalog {
    /// Creates a catalog with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            listeners: Arc::new(SpecListenerRegistry::default()),
        }
    }

    /// Registers a listener for subsequent changes made through this catalog.
    pub async fn register_listener(&self, listener: Arc<dyn SpecCatalogListener>) {
        self.listeners.register(listener).await;
    }

    /// Upserts one spec, then notifies listeners with an add or an update.
    pub async fn put_spec(&self, spec: Spec) -> AppResult<()> {
        let (description, properties) = match &spec {
            Spec::Flow(flow) => (
                flow.description(),
                serde_json::to_value(flow.properties()).map_err(|error| {
                    AppError::Internal(format!(
                        "failed to encode properties for flow '{}': {error}",
                        flow.uri()
                    ))
                })?,
            ),
            Spec::Topology(topology) => (topology.description(), Value::Object(Default::default())),
        };

        let inserted = sqlx::query_scalar::<_, bool>(
            r#"
            INSERT INTO flow_specs (uri, version, kind, description, properties, updated_at)
            VALUES ($1, $2, $3, $4, $5, now())
            ON CONFLICT (uri)
            DO UPDATE SET
                version = EXCLUDED.version,
                kind = EXCLUDED.kind,
                description = EXCLUDED.description,
                properties = EXCLUDED.properties,
                updated_at = now()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(spec.uri())
        .bind(spec.version())
        .bind(spec.kind().as_str())
        .bind(description)
        .bind(properties)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to save spec '{}': {error}", spec.uri()))
        })?;

        if inserted {
            self.listeners.notify_added(&spec).await;
        } else {
            self.listeners.notify_updated(&spec).await;
        }

        Ok(())
    }

    /// Deletes one spec and notifies listeners when a row existed.
    pub async fn delete_spec(&self, uri: &str) -> AppResult<bool> {
        let removed_version = sqlx::query_scalar::<_, String>(
            r#"
            DELETE FROM flow_specs
            WHERE uri = $1
            RETURNING version
            "#,
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete spec '{uri}': {error}")))?;

        match removed_version {
            Some(version) => {
                self.listeners.notify_deleted(uri, version.as_str()).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Debug, FromRow)]
struct FlowSpecRow {
    uri: String,
    version: String,
    kind: String,
    description: Option<String>,
    properties: Value,
}

impl FlowSpecRow {
    fn into_spec(self) -> AppResult<Spec> {
        match spec_kind_from_str(self.kind.as_str())? {
            SpecKind::Flow => {
                let properties: BTreeMap<String, String> =
                    serde_json::from_value(self.properties).map_err(|error| {
                        AppError::Internal(format!(
                            "stored properties for flow '{}' are invalid: {error}",
                            self.uri
                        ))
                    })?;

                Ok(Spec::Flow(FlowSpec::new(FlowSpecInput {
                    uri: self.uri,
                    version: self.version,
                    description: self.description,
                    properties,
                })?))
            }
            SpecKind::Topology => Ok(Spec::Topology(TopologySpec::new(
                self.uri,
                self.version,
                self.description,
            )?)),
        }
    }
}

fn spec_kind_from_str(value: &str) -> AppResult<SpecKind> {
    match value {
        "flow" => Ok(SpecKind::Flow),
        "topology" => Ok(SpecKind::Topology),
        _ => Err(AppError::Internal(format!(
            "unknown stored spec kind '{value}'"
        ))),
    }
}

#[async_trait]
impl FlowCatalog for PostgresFlowCatalog {
    async fn list_specs(&self) -> AppResult<Vec<Spec>> {
        let rows = sqlx::query_as::<_, FlowSpecRow>(
            r#"
            SELECT uri, version, kind, description, properties
            FROM flow_specs
            ORDER BY uri
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list specs: {error}")))?;

        rows.into_iter().map(FlowSpecRow::into_spec).collect()
    }

    async fn get_spec(&self, uri: &str) -> AppResult<Option<Spec>> {
        let row = sqlx::query_as::<_, FlowSpecRow>(
            r#"
            SELECT uri, version, kind, description, properties
            FROM flow_specs
            WHERE uri = $1
            "#,
        )
        .bind(uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find spec '{uri}': {error}")))?;

        row.map(FlowSpecRow::into_spec).transpose()
    }

    async fn remove_spec(&self, uri: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM flow_specs
            WHERE uri = $1
            "#,
        )
        .bind(uri)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove spec '{uri}': {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
