use std::sync::Arc;
use std::time::Duration;

use tempora_application::{
    ControllerInbox, FlowSchedulerService, LeadershipLease, LeadershipLeaseCoordinator,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

const LEADERSHIP_SCOPE_KEY: &str = "flow-scheduler";
const INBOX_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct LeadershipSettings {
    pub holder_id: String,
    pub lease_seconds: u32,
    pub renew_interval: Duration,
}

/// Acquires or renews the controller lease on every tick and mirrors the
/// outcome into the scheduler. A held lease is released on shutdown.
pub async fn run_leadership_loop(
    service: FlowSchedulerService,
    coordinator: Arc<dyn LeadershipLeaseCoordinator>,
    settings: LeadershipSettings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut lease: Option<LeadershipLease> = None;

    loop {
        lease = match lease.take() {
            None => acquire(&service, coordinator.as_ref(), &settings).await,
            Some(held) => renew(&service, coordinator.as_ref(), &settings, held).await,
        };

        tokio::select! {
            _ = tokio::time::sleep(settings.renew_interval) => {}
            _ = shutdown.changed() => break,
        }
    }

    if let Some(held) = lease {
        service.set_leadership(false).await;
        if let Err(error) = coordinator.release_lease(&held).await {
            warn!(holder_id = %held.holder_id, error = %error, "failed to release leadership lease");
        } else {
            info!(holder_id = %held.holder_id, "leadership lease released");
        }
    }
}

async fn acquire(
    service: &FlowSchedulerService,
    coordinator: &dyn LeadershipLeaseCoordinator,
    settings: &LeadershipSettings,
) -> Option<LeadershipLease> {
    match coordinator
        .try_acquire_lease(
            LEADERSHIP_SCOPE_KEY,
            settings.holder_id.as_str(),
            settings.lease_seconds,
        )
        .await
    {
        Ok(Some(lease)) => {
            info!(holder_id = %lease.holder_id, "acquired leadership lease");
            service.set_leadership(true).await;
            Some(lease)
        }
        Ok(None) => {
            debug!(holder_id = %settings.holder_id, "leadership held elsewhere");
            None
        }
        Err(error) => {
            warn!(holder_id = %settings.holder_id, error = %error, "failed to acquire leadership lease");
            None
        }
    }
}

async fn renew(
    service: &FlowSchedulerService,
    coordinator: &dyn LeadershipLeaseCoordinator,
    settings: &LeadershipSettings,
    lease: LeadershipLease,
) -> Option<LeadershipLease> {
    match coordinator.renew_lease(&lease, settings.lease_seconds).await {
        Ok(true) => Some(lease),
        Ok(false) => {
            warn!(holder_id = %lease.holder_id, "leadership lease lost");
            service.set_leadership(false).await;
            None
        }
        Err(error) => {
            warn!(holder_id = %lease.holder_id, error = %error, "failed to renew leadership lease, stepping down");
            service.set_leadership(false).await;
            None
        }
    }
}

/// Drains forwarded notices while this node leads.
pub async fn run_inbox_loop(
    service: FlowSchedulerService,
    inbox: Arc<dyn ControllerInbox>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if service.is_active().await {
            match inbox.receive(INBOX_BATCH_SIZE).await {
                Ok(messages) => {
                    for message in messages {
                        service.handle_controller_message(message).await;
                    }
                }
                Err(error) => warn!(error = %error, "failed to read controller inbox"),
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(poll_interval) => {}
            _ = shutdown.changed() => break,
        }
    }
}
