//! Well-known service ports exposed by the all-in-one ledger image.

/// A container-internal TCP port.
pub type PrivatePort = u16;

/// A host-side TCP port the runtime bound a private port to.
pub type HostPort = u16;

pub const SSH_PORT: PrivatePort = 22;

pub const COUCHDB_ORG1_PORT: PrivatePort = 5984;
pub const COUCHDB_ORG1_PEER1_PORT: PrivatePort = 6984;
pub const COUCHDB_ORG2_PORT: PrivatePort = 7984;
pub const COUCHDB_ORG2_PEER1_PORT: PrivatePort = 8984;

pub const ORDERER_PORT: PrivatePort = 7050;
pub const PEER0_ORG1_PORT: PrivatePort = 7051;
pub const CA_ORG1_PORT: PrivatePort = 7054;
pub const PEER1_ORG1_PORT: PrivatePort = 8051;
pub const CA_ORG2_PORT: PrivatePort = 8054;
pub const PEER0_ORG2_PORT: PrivatePort = 9051;
pub const PEER1_ORG2_PORT: PrivatePort = 10051;

/// Management dashboard of the in-image service supervisor.
pub const SUPERVISOR_DASHBOARD_PORT: PrivatePort = 9001;

/// SSH is published on a non-privileged host port when bindings are fixed.
pub const SSH_FIXED_HOST_PORT: HostPort = 30022;

pub const EXPOSED_PORTS: [PrivatePort; 13] = [
    SSH_PORT,
    COUCHDB_ORG1_PORT,
    COUCHDB_ORG1_PEER1_PORT,
    COUCHDB_ORG2_PORT,
    COUCHDB_ORG2_PEER1_PORT,
    ORDERER_PORT,
    PEER0_ORG1_PORT,
    CA_ORG1_PORT,
    PEER1_ORG1_PORT,
    CA_ORG2_PORT,
    PEER0_ORG2_PORT,
    PEER1_ORG2_PORT,
    SUPERVISOR_DASHBOARD_PORT,
];

/// Host bindings used when the instance is not publishing all ports. The
/// document-store ports and the dashboard stay unbound.
pub const FIXED_PORT_BINDINGS: [(PrivatePort, HostPort); 8] = [
    (SSH_PORT, SSH_FIXED_HOST_PORT),
    (ORDERER_PORT, ORDERER_PORT),
    (PEER0_ORG1_PORT, PEER0_ORG1_PORT),
    (CA_ORG1_PORT, CA_ORG1_PORT),
    (PEER1_ORG1_PORT, PEER1_ORG1_PORT),
    (CA_ORG2_PORT, CA_ORG2_PORT),
    (PEER0_ORG2_PORT, PEER0_ORG2_PORT),
    (PEER1_ORG2_PORT, PEER1_ORG2_PORT),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_bindings_are_subset_of_exposed() {
        for (private, _) in FIXED_PORT_BINDINGS {
            assert!(EXPOSED_PORTS.contains(&private), "{private} not exposed");
        }
    }

    #[test]
    fn dashboard_and_couchdb_stay_unbound() {
        let bound: Vec<_> = FIXED_PORT_BINDINGS.iter().map(|(p, _)| *p).collect();

        for port in [
            COUCHDB_ORG1_PORT,
            COUCHDB_ORG1_PEER1_PORT,
            COUCHDB_ORG2_PORT,
            COUCHDB_ORG2_PEER1_PORT,
            SUPERVISOR_DASHBOARD_PORT,
        ] {
            assert!(!bound.contains(&port));
        }
    }
}
