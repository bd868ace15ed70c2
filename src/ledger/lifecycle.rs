use futures_util::{Stream, StreamExt as _};
use tracing::{debug, error, info, trace, warn};

use super::{wait_for_healthy, FabricTestLedger, LedgerState};
use crate::prelude::*;

const CONTAINER_LOG_TARGET: &str = "fabric_testnet::container";

fn emit_container_line(level: LogLevel, image: &str, text: &str) {
    match level {
        LogLevel::Trace => trace!(target: CONTAINER_LOG_TARGET, image, "{text}"),
        LogLevel::Debug => debug!(target: CONTAINER_LOG_TARGET, image, "{text}"),
        LogLevel::Info => info!(target: CONTAINER_LOG_TARGET, image, "{text}"),
        LogLevel::Warn => warn!(target: CONTAINER_LOG_TARGET, image, "{text}"),
        LogLevel::Error => error!(target: CONTAINER_LOG_TARGET, image, "{text}"),
    }
}

async fn forward_logs<S>(mut lines: S, image: String, level: LogLevel)
where
    S: Stream<Item = Result<LogLine, RuntimeError>> + Unpin,
{
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                for text in line.text().lines().filter(|x| !x.trim().is_empty()) {
                    emit_container_line(level, &image, text);
                }
            }
            Err(error) => {
                debug!(image, %error, "container log stream ended");
                break;
            }
        }
    }
}

fn tolerate_stopped(result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Err(RuntimeError::AlreadyStopped) => Ok(()),
        x => x,
    }
}

/// Maps a `NotFound` from the runtime to `Ok(false)`: the container was
/// removed behind our back and there is nothing left to act on.
fn tolerate_gone(result: Result<(), RuntimeError>) -> Result<bool, RuntimeError> {
    match result {
        Ok(()) => Ok(true),
        Err(RuntimeError::NotFound(_)) => Ok(false),
        Err(x) => Err(x),
    }
}

impl<R, C> FabricTestLedger<R, C>
where
    R: ContainerRuntime,
    C: CaConnector,
{
    fn run_request(&self) -> RunRequest {
        let publish_all_ports = self.config.publish_all_ports();

        let port_bindings = if publish_all_ports {
            Default::default()
        } else {
            FIXED_PORT_BINDINGS.into_iter().collect()
        };

        RunRequest {
            image: self.image_reference(),
            exposed_ports: EXPOSED_PORTS.to_vec(),
            env: self.config.env_list(),
            publish_all_ports,
            port_bindings,
            privileged: true,
        }
    }

    async fn ensure_image(&self, image: &str) -> Result<(), Error> {
        let present = self
            .runtime
            .image_exists(image)
            .await
            .map_err(|e| Error::container_start(image, e))?;

        if present {
            debug!(image, "image already present locally");
            return Ok(());
        }

        info!(image, "pulling ledger image");

        self.runtime
            .pull_image(image)
            .await
            .map_err(|e| Error::container_start(image, e))
    }

    fn release(&mut self) {
        if let Some(forwarder) = self.log_forwarder.take() {
            forwarder.abort();
        }

        self.container = None;
        self.state = LedgerState::Destroyed;
    }

    /// Stops and removes whatever container a previous `start` left behind,
    /// so that two live handles never coexist.
    async fn teardown(&mut self) -> Result<(), Error> {
        let Some(previous) = self.container.clone() else {
            return Ok(());
        };

        info!(container = %previous, "tearing down previous ledger container");

        let stopped = tolerate_stopped(self.runtime.stop(&previous.id).await);
        let present = tolerate_gone(stopped).map_err(|e| Error::runtime("stop", &previous, e))?;

        if present {
            tolerate_gone(self.runtime.remove(&previous.id).await)
                .map_err(|e| Error::runtime("remove", &previous, e))?;
        } else {
            warn!(container = %previous, "previous ledger container already gone");
        }

        self.release();

        Ok(())
    }

    /// Launches a fresh ledger container and waits until it is connectable.
    ///
    /// When the health check times out the handle is kept, so the caller
    /// can still `stop` or `destroy` the half-started container.
    pub async fn start(&mut self, skip_image_pull: bool) -> Result<ContainerHandle, Error> {
        self.teardown().await?;

        let image = self.image_reference();

        if !skip_image_pull {
            self.ensure_image(&image).await?;
        }

        let request = self.run_request();

        info!(
            image,
            publish_all_ports = request.publish_all_ports,
            ledger_version = %self.config.ledger_version(),
            "starting ledger container"
        );

        let id = self
            .runtime
            .run(request)
            .await
            .map_err(|e| Error::container_start(&image, e))?;

        let container = ContainerHandle { id, image };

        self.container = Some(container.clone());
        self.state = LedgerState::Starting;

        if self.config.emit_container_logs() {
            let lines = self.runtime.logs(&container.id);
            let task = forward_logs(lines, container.image.clone(), self.config.log_level());
            self.log_forwarder = Some(tokio::spawn(task));
        }

        wait_for_healthy(&self.runtime, &container, self.config.health_timeout()).await?;

        self.state = LedgerState::Connectable;

        Ok(container)
    }

    /// Stopping an already stopped container is not an error.
    pub async fn stop(&mut self) -> Result<(), Error> {
        let container = self
            .container
            .clone()
            .ok_or(Error::NoContainer { operation: "stop" })?;

        tolerate_stopped(self.runtime.stop(&container.id).await)
            .map_err(|e| Error::runtime("stop", &container, e))?;

        info!(%container, "ledger container stopped");
        self.state = LedgerState::Stopped;

        Ok(())
    }

    pub async fn destroy(&mut self) -> Result<(), Error> {
        let container = self
            .container
            .clone()
            .ok_or(Error::NoContainer {
                operation: "destroy",
            })?;

        let removed = tolerate_gone(self.runtime.remove(&container.id).await)
            .map_err(|e| Error::runtime("remove", &container, e))?;

        if removed {
            info!(%container, "ledger container removed");
        } else {
            warn!(%container, "ledger container was already removed");
        }

        self.release();

        Ok(())
    }
}
