pub mod ca;
pub mod docker;
pub mod ledger;
pub mod prelude;

pub use fabric_testnet_core as core;

pub use ledger::{FabricTestLedger, LedgerState};

/// Ledger manager wired to the local Docker daemon and a Fabric CA over
/// HTTPS.
pub type DockerTestLedger = FabricTestLedger<docker::DockerRuntime, ca::FabricCaConnector>;

impl DockerTestLedger {
    pub async fn with_docker(options: prelude::LedgerInstanceOptions) -> Result<Self, prelude::Error> {
        let config = options.validate()?;

        let runtime = docker::DockerRuntime::connect()
            .await
            .map_err(prelude::Error::RuntimeUnavailable)?;

        Ok(FabricTestLedger::from_config(config, runtime, ca::FabricCaConnector))
    }
}
