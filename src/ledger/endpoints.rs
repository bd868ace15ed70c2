use tracing::debug;

use super::FabricTestLedger;
use crate::prelude::*;

impl<R, C> FabricTestLedger<R, C>
where
    R: ContainerRuntime,
    C: CaConnector,
{
    async fn inspect(&self, container: &ContainerHandle) -> Result<ContainerDetails, Error> {
        self.runtime
            .inspect(&container.id)
            .await
            .map_err(|e| Error::runtime("inspect", container, e))
    }

    pub(super) async fn resolve_public_port(
        &self,
        container: &ContainerHandle,
        private: PrivatePort,
    ) -> Result<HostPort, Error> {
        let details = self.inspect(container).await?;

        let host = details
            .ports
            .get(&private)
            .copied()
            .ok_or_else(|| Error::PortNotPublished {
                container: container.short_id().to_owned(),
                port: private,
            })?;

        debug!(%container, private, host, "resolved public port");

        Ok(host)
    }

    pub(super) async fn pull_file_from(
        &self,
        container: &ContainerHandle,
        path: &str,
    ) -> Result<Vec<u8>, Error> {
        self.runtime
            .get_file(&container.id, path)
            .await
            .map_err(|source| Error::FileRetrieval {
                container: container.short_id().to_owned(),
                path: path.to_owned(),
                source,
            })
    }

    /// Host port the runtime bound to `private`. Looked up live on every
    /// call, never cached.
    pub async fn public_port(&self, private: PrivatePort) -> Result<HostPort, Error> {
        let container = self.require_container("public_port")?;
        self.resolve_public_port(container, private).await
    }

    pub async fn pull_file(&self, path: &str) -> Result<Vec<u8>, Error> {
        let container = self.require_container("pull_file")?;
        self.pull_file_from(container, path).await
    }

    /// Address of the container on the runtime's bridge network.
    pub async fn container_ip_address(&self) -> Result<String, Error> {
        let container = self.require_container("container_ip_address")?;
        let details = self.inspect(container).await?;

        details.ip_address.ok_or_else(|| {
            Error::runtime(
                "inspect",
                container,
                RuntimeError::NotFound("container has no bridge network address".into()),
            )
        })
    }

    pub async fn ssh_config(&self) -> Result<SshConfig, Error> {
        let container = self.require_connectable("ssh_config")?;

        let port = self.resolve_public_port(container, SSH_PORT).await?;
        let key = self.pull_file_from(container, SSH_PRIVATE_KEY_PATH).await?;

        Ok(SshConfig {
            host: "localhost".to_owned(),
            port,
            username: SSH_USERNAME.to_owned(),
            private_key: pem_from_bytes("ssh private key", key)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use fabric_testnet_testing::fixtures::SSH_PRIVATE_KEY_PEM;
    use fabric_testnet_testing::{FakeRuntime, RuntimeFault, StubCa};

    use super::*;

    async fn started(runtime: &FakeRuntime, publish_all_ports: bool) -> FabricTestLedger<FakeRuntime, StubCa> {
        let mut ledger = FabricTestLedger::new(
            LedgerInstanceOptions::new(publish_all_ports),
            runtime.clone(),
            StubCa::new(),
        )
        .unwrap();

        ledger.start(true).await.unwrap();
        ledger
    }

    #[tokio::test]
    async fn fixed_ssh_binding_resolves_to_fixed_host_port() {
        let runtime = FakeRuntime::with_ledger_files();
        let ledger = started(&runtime, false).await;

        let ssh = ledger.ssh_config().await.unwrap();

        assert_eq!(ssh.port, SSH_FIXED_HOST_PORT);
        assert_eq!(ssh.host, "localhost");
        assert_eq!(ssh.username, "root");
        assert_eq!(ssh.private_key, SSH_PRIVATE_KEY_PEM);
    }

    #[tokio::test]
    async fn unpublished_port_is_reported() {
        let runtime = FakeRuntime::new().with_random_ports([(PEER0_ORG1_PORT, 40001)]);
        let ledger = started(&runtime, true).await;

        assert_eq!(ledger.public_port(PEER0_ORG1_PORT).await.unwrap(), 40001);

        let err = ledger.public_port(CA_ORG1_PORT).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PortNotPublished { port: CA_ORG1_PORT, .. }
        ));
    }

    #[tokio::test]
    async fn port_lookup_is_live() {
        let runtime = FakeRuntime::new().with_random_ports([(SSH_PORT, 40022)]);
        let ledger = started(&runtime, true).await;

        assert_eq!(ledger.public_port(SSH_PORT).await.unwrap(), 40022);

        runtime.kill(&ledger.container().unwrap().id);

        assert!(matches!(
            ledger.public_port(SSH_PORT).await,
            Err(Error::PortNotPublished { .. })
        ));
    }

    #[tokio::test]
    async fn inspect_failure_is_a_runtime_error() {
        let runtime = FakeRuntime::new().with_fault(RuntimeFault::InspectFailed);
        let ledger = started(&runtime, true).await;

        assert!(matches!(
            ledger.container_ip_address().await,
            Err(Error::Runtime { operation: "inspect", .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_a_retrieval_error() {
        let runtime = FakeRuntime::new();
        let ledger = started(&runtime, true).await;

        let err = ledger.pull_file("/no/such/file").await.unwrap_err();

        let Error::FileRetrieval { path, .. } = err else {
            panic!("unexpected error {err:?}");
        };

        assert_eq!(path, "/no/such/file");
    }

    #[tokio::test]
    async fn endpoints_require_a_container() {
        let ledger = FabricTestLedger::new(
            LedgerInstanceOptions::new(true),
            FakeRuntime::new(),
            StubCa::new(),
        )
        .unwrap();

        assert!(matches!(
            ledger.public_port(SSH_PORT).await,
            Err(Error::ContainerNotStarted { operation: "public_port" })
        ));
        assert!(matches!(
            ledger.container_ip_address().await,
            Err(Error::ContainerNotStarted { .. })
        ));
    }
}
