use tracing::{debug, info};

use super::FabricTestLedger;
use crate::prelude::*;

impl<R, C> FabricTestLedger<R, C>
where
    R: ContainerRuntime,
    C: CaConnector,
{
    /// Reads the connection profile baked into the image and rewrites its
    /// endpoints so a client on the host can reach the ledger.
    ///
    /// The first peer and the CA are always re-pointed at their public
    /// ports. The secondary peer is only touched when the profile declares
    /// it. When every port is published, an orderer entry and the default
    /// channel are added as well, since the baked profile has neither.
    pub async fn connection_profile(&self) -> Result<ConnectionProfile, Error> {
        let container = self.require_connectable("connection_profile")?;

        let layout = TopologyLayout::for_version(self.config.ledger_version());
        let raw = self.pull_file_from(container, layout.profile_path()).await?;
        let mut profile = ConnectionProfile::parse(layout, &raw)?;

        debug!(%container, ?layout, "patching connection profile");

        let peer0 = self.resolve_public_port(container, PEER0_ORG1_PORT).await?;
        profile
            .topology_mut()
            .set_peer_url(PEER0_ORG1, format!("grpcs://localhost:{peer0}"))?;

        if profile.topology().has_peer(PEER1_ORG1) {
            let peer1 = self.resolve_public_port(container, PEER1_ORG1_PORT).await?;
            profile
                .topology_mut()
                .set_peer_url(PEER1_ORG1, format!("grpcs://localhost:{peer1}"))?;
        }

        let ca = self.resolve_public_port(container, CA_ORG1_PORT).await?;
        profile
            .topology_mut()
            .set_ca_url(CA_ORG1, format!("https://localhost:{ca}"))?;

        if self.config.publish_all_ports() {
            let orderer = self.resolve_public_port(container, ORDERER_PORT).await?;
            let raw = self
                .pull_file_from(container, layout.orderer_tls_ca_path())
                .await?;
            let tls_ca_pem = pem_from_bytes("orderer tls ca certificate", raw)?;

            let topology = profile.topology_mut();
            topology.insert_orderer(ORDERER, format!("grpcs://localhost:{orderer}"), tls_ca_pem);
            topology.insert_channel(DEFAULT_CHANNEL, ORDERER, PEER0_ORG1);
        }

        info!(%container, ?layout, "connection profile ready");

        Ok(profile)
    }
}
