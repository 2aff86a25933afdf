//! Tempora flow scheduler runtime.

#![forbid(unsafe_code)]

mod runtime;
mod scheduler_config;

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tempora_application::{
    ControllerInbox, FlowCatalog, FlowSchedulerService, ImmediateRunDispatcher,
    LeadershipLeaseCoordinator, SpecCatalogListener,
};
use tempora_core::{AppError, AppResult};
use tempora_infrastructure::{
    HttpFlowOrchestrator, InMemoryFlowCatalog, PostgresFlowCatalog, RedisClusterCoordinator,
    RedisLeadershipLeaseCoordinator, TokioCronSchedulingEngine,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::runtime::{LeadershipSettings, run_inbox_loop, run_leadership_loop};
use crate::scheduler_config::{SchedulerConfig, init_tracing};

enum CatalogBackend {
    InMemory(Arc<InMemoryFlowCatalog>),
    Postgres(Arc<PostgresFlowCatalog>),
}

impl CatalogBackend {
    fn as_flow_catalog(&self) -> Arc<dyn FlowCatalog> {
        match self {
            Self::InMemory(catalog) => catalog.clone(),
            Self::Postgres(catalog) => catalog.clone(),
        }
    }

    async fn register_listener(&self, listener: Arc<dyn SpecCatalogListener>) {
        match self {
            Self::InMemory(catalog) => catalog.register_listener(listener).await,
            Self::Postgres(catalog) => catalog.register_listener(listener).await,
        }
    }
}

struct ClusterWiring {
    coordinator: Arc<RedisClusterCoordinator>,
    leases: Arc<dyn LeadershipLeaseCoordinator>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = SchedulerConfig::load()?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let engine = Arc::new(TokioCronSchedulingEngine::new(config.trigger_workers));
    let orchestrator = Arc::new(HttpFlowOrchestrator::new(
        http_client,
        config.orchestrator_url.as_str(),
        config.orchestrator_max_attempts,
        config.orchestrator_retry_backoff_ms,
    ));
    let catalog = build_catalog(&config).await?;
    let cluster = build_cluster(&config)?;

    let mut service = FlowSchedulerService::new(engine.clone(), orchestrator)
        .with_catalog(catalog.as_flow_catalog())
        .with_base_properties(config.job_properties.clone())
        .with_immediate_run_dispatcher(ImmediateRunDispatcher::new(
            config.immediate_run_workers,
        ));
    if let Some(cluster) = &cluster {
        service = service.with_cluster_coordinator(cluster.coordinator.clone());
    }
    catalog.register_listener(Arc::new(service.clone())).await;

    let (shutdown_sender, shutdown) = watch::channel(false);
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    match cluster {
        Some(cluster) => {
            let inbox: Arc<dyn ControllerInbox> = cluster.coordinator;
            tasks.push(tokio::spawn(run_leadership_loop(
                service.clone(),
                cluster.leases,
                LeadershipSettings {
                    holder_id: config.node_id.clone(),
                    lease_seconds: config.lease_seconds,
                    renew_interval: Duration::from_millis(config.lease_renew_interval_ms),
                },
                shutdown.clone(),
            )));
            tasks.push(tokio::spawn(run_inbox_loop(
                service.clone(),
                inbox,
                Duration::from_millis(config.inbox_poll_interval_ms),
                shutdown,
            )));
        }
        None => {
            info!(node_id = %config.node_id, "no REDIS_URL configured, running single-node");
            service.set_leadership(true).await;
        }
    }

    info!(
        node_id = %config.node_id,
        cluster_mode = service.is_cluster_mode(),
        orchestrator_url = %config.orchestrator_url,
        trigger_workers = config.trigger_workers,
        immediate_run_workers = config.immediate_run_workers,
        "tempora-scheduler started"
    );

    tokio::signal::ctrl_c()
        .await
        .map_err(|error| AppError::Internal(format!("failed to listen for shutdown: {error}")))?;
    info!(node_id = %config.node_id, "shutdown requested");

    if shutdown_sender.send(true).is_err() {
        warn!("runtime loops already stopped");
    }
    for task in tasks {
        if let Err(error) = task.await {
            warn!(error = %error, "runtime loop ended abnormally");
        }
    }

    service.set_leadership(false).await;
    engine.shutdown().await;
    info!(node_id = %config.node_id, "tempora-scheduler stopped");

    Ok(())
}

async fn build_catalog(config: &SchedulerConfig) -> AppResult<CatalogBackend> {
    match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = connect_and_migrate(database_url).await?;
            Ok(CatalogBackend::Postgres(Arc::new(PostgresFlowCatalog::new(
                pool,
            ))))
        }
        None => {
            warn!("no DATABASE_URL configured, using an in-memory flow catalog");
            Ok(CatalogBackend::InMemory(Arc::new(InMemoryFlowCatalog::new())))
        }
    }
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_cluster(config: &SchedulerConfig) -> AppResult<Option<ClusterWiring>> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        return Ok(None);
    };

    let client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    Ok(Some(ClusterWiring {
        coordinator: Arc::new(RedisClusterCoordinator::new(
            client.clone(),
            config.redis_key_prefix.as_str(),
        )),
        leases: Arc::new(RedisLeadershipLeaseCoordinator::new(
            client,
            config.redis_key_prefix.as_str(),
        )),
    }))
}
