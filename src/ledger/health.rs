use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::prelude::*;

pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

async fn probe<R: ContainerRuntime>(
    runtime: &R,
    container: &ContainerHandle,
) -> Result<String, RuntimeError> {
    runtime
        .list()
        .await?
        .into_iter()
        .find(|x| x.id == container.id)
        .map(|x| x.status)
        .ok_or_else(|| RuntimeError::NotFound(format!("{} is not listed", container.short_id())))
}

/// Polls the runtime until the container reports healthy or `timeout`
/// elapses.
///
/// The health state is derived fresh from each listing. A probe that
/// cannot find the container, or a listing that fails outright, counts as
/// unreachable and polling continues. The last sleep is cut short so the
/// final probe lands on the deadline rather than up to one interval past
/// it.
pub async fn wait_for_healthy<R: ContainerRuntime>(
    runtime: &R,
    container: &ContainerHandle,
    timeout: Duration,
) -> Result<(), Error> {
    let started = Instant::now();

    loop {
        let (state, detail) = match probe(runtime, container).await {
            Ok(status) => (HealthState::from_status(&status), status),
            Err(error) => (HealthState::Unreachable, error.to_string()),
        };

        if state.is_healthy() {
            info!(
                %container,
                elapsed = ?started.elapsed(),
                "ledger container is healthy"
            );

            return Ok(());
        }

        debug!(%container, %state, detail, "waiting for ledger container");
        let elapsed = started.elapsed();

        if elapsed >= timeout {
            return Err(Error::HealthCheckTimeout {
                timeout,
                last_failure: format!("{state} ({detail})"),
            });
        }

        tokio::time::sleep(HEALTH_POLL_INTERVAL.min(timeout - elapsed)).await;
    }
}
