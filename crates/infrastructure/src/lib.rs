//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_flow_orchestrator;
mod in_memory_flow_catalog;
mod postgres_flow_catalog;
mod redis_cluster_coordinator;
mod redis_leadership_lease_coordinator;
mod spec_listener_registry;
mod tokio_cron_scheduling_engine;

pub use http_flow_orchestrator::HttpFlowOrchestrator;
pub use in_memory_flow_catalog::InMemoryFlowCatalog;
pub use postgres_flow_catalog::PostgresFlowCatalog;
pub use redis_cluster_coordinator::RedisClusterCoordinator;
pub use redis_leadership_lease_coordinator::RedisLeadershipLeaseCoordinator;
pub use tokio_cron_scheduling_engine::TokioCronSchedulingEngine;
