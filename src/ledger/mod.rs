//! The test ledger manager.
//!
//! A [`FabricTestLedger`] owns at most one container at a time and walks it
//! through `Configured -> Starting -> Connectable -> Stopped / Destroyed`.
//! Profile patching and identity enrollment are only available once the
//! instance is connectable; calling them earlier fails fast instead of
//! waiting.

use tokio::task::JoinHandle;

use crate::prelude::*;

mod endpoints;
mod enroll;
mod health;
mod lifecycle;
mod profile;

pub use health::{wait_for_healthy, HEALTH_POLL_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerState {
    Configured,
    Starting,
    Connectable,
    Stopped,
    Destroyed,
}

pub struct FabricTestLedger<R, C> {
    runtime: R,
    connector: C,
    config: LedgerInstanceConfig,
    container: Option<ContainerHandle>,
    state: LedgerState,
    log_forwarder: Option<JoinHandle<()>>,
}

impl<R, C> FabricTestLedger<R, C>
where
    R: ContainerRuntime,
    C: CaConnector,
{
    /// Validates `options` before anything touches the runtime.
    pub fn new(options: LedgerInstanceOptions, runtime: R, connector: C) -> Result<Self, Error> {
        let config = options.validate()?;

        Ok(Self::from_config(config, runtime, connector))
    }

    pub fn from_config(config: LedgerInstanceConfig, runtime: R, connector: C) -> Self {
        Self {
            runtime,
            connector,
            config,
            container: None,
            state: LedgerState::Configured,
            log_forwarder: None,
        }
    }

    pub fn config(&self) -> &LedgerInstanceConfig {
        &self.config
    }

    pub fn image_reference(&self) -> String {
        self.config.image_reference()
    }

    pub fn state(&self) -> LedgerState {
        self.state
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn container(&self) -> Result<&ContainerHandle, Error> {
        self.require_container("container")
    }

    fn require_container(&self, operation: &'static str) -> Result<&ContainerHandle, Error> {
        self.container
            .as_ref()
            .ok_or(Error::ContainerNotStarted { operation })
    }

    /// Like [`Self::require_container`], but also insists the instance made
    /// it through the health check.
    fn require_connectable(&self, operation: &'static str) -> Result<&ContainerHandle, Error> {
        let container = self.require_container(operation)?;

        match self.state {
            LedgerState::Connectable => Ok(container),
            _ => Err(Error::ContainerNotStarted { operation }),
        }
    }
}

impl<R, C> Drop for FabricTestLedger<R, C> {
    fn drop(&mut self) {
        if let Some(forwarder) = self.log_forwarder.take() {
            forwarder.abort();
        }
    }
}
