//! Connection profiles: the topology documents clients use to locate peers,
//! orderers and certificate authorities.
//!
//! The all-in-one image ships two structurally different documents depending
//! on the ledger release it boots. Both are parsed into the same
//! [`ProfileDocument`] model but kept apart as [`ConnectionProfile::Legacy`]
//! and [`ConnectionProfile::Modern`] so that layout-specific details (where
//! files live, how certificates are listed, which gRPC overrides are
//! expected) are decided in one place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{ca::CaEndpoint, version::LedgerVersion};

pub const PEER0_ORG1: &str = "peer0.org1.example.com";
pub const PEER1_ORG1: &str = "peer1.org1.example.com";
pub const CA_ORG1: &str = "ca.org1.example.com";
pub const ORDERER: &str = "orderer.example.com";
pub const DEFAULT_CHANNEL: &str = "mychannel";

/// First ledger release that uses the modern test-network layout.
pub const MODERN_LAYOUT_SINCE: LedgerVersion = LedgerVersion::new(2, 0, 0);

const SSL_TARGET_NAME_OVERRIDE: &str = "ssl-target-name-override";
const HOSTNAME_OVERRIDE: &str = "hostnameOverride";

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("malformed connection profile: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("connection profile has no {kind} entry named {name:?}")]
    MissingEntry { kind: &'static str, name: String },

    #[error("{what} is not valid utf-8")]
    InvalidText { what: String },
}

impl ProfileError {
    fn missing(kind: &'static str, name: &str) -> Self {
        Self::MissingEntry {
            kind,
            name: name.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopologyLayout {
    /// Multi-organization sample network of the 1.x releases.
    Legacy,
    /// Test network of the 2.x releases.
    Modern,
}

impl TopologyLayout {
    pub fn for_version(version: &LedgerVersion) -> Self {
        if *version < MODERN_LAYOUT_SINCE {
            Self::Legacy
        } else {
            Self::Modern
        }
    }

    pub fn profile_path(&self) -> &'static str {
        match self {
            Self::Legacy => "/fabric-samples/first-network/connection-org1.json",
            Self::Modern => {
                "/fabric-samples/test-network/organizations/peerOrganizations/org1.example.com/connection-org1.json"
            }
        }
    }

    pub fn orderer_tls_ca_path(&self) -> &'static str {
        match self {
            Self::Legacy => {
                "/fabric-samples/first-network/crypto-config/ordererOrganizations/example.com/tlsca/tlsca.example.com-cert.pem"
            }
            Self::Modern => {
                "/fabric-samples/test-network/organizations/ordererOrganizations/example.com/tlsca/tlsca.example.com-cert.pem"
            }
        }
    }
}

/// Either one PEM blob or a list of them; the layouts disagree.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum PemSource {
    One(String),
    Many(Vec<String>),
}

impl PemSource {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(x) => vec![x.clone()],
            Self::Many(x) => x.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TlsCaCerts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pem: Option<PemSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeerEntry {
    pub url: String,

    #[serde(rename = "tlsCACerts", default)]
    pub tls_ca_certs: TlsCaCerts,

    #[serde(default)]
    pub grpc_options: Map<String, Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify: Option<bool>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaEntry {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,

    #[serde(rename = "tlsCACerts", default)]
    pub tls_ca_certs: TlsCaCerts,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_options: Option<HttpOptions>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrdererEntry {
    pub url: String,

    #[serde(default)]
    pub grpc_options: Map<String, Value>,

    #[serde(rename = "tlsCACerts", default)]
    pub tls_ca_certs: TlsCaCerts,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPeer {
    pub endorsing_peer: bool,
    pub chaincode_query: bool,
    pub ledger_query: bool,
    pub event_source: bool,
}

impl ChannelPeer {
    pub fn all_roles() -> Self {
        Self {
            endorsing_peer: true,
            chaincode_query: true,
            ledger_query: true,
            event_source: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ChannelEntry {
    #[serde(default)]
    pub orderers: Vec<String>,

    #[serde(default)]
    pub peers: BTreeMap<String, ChannelPeer>,
}

/// Fields shared by both layouts. Anything not modeled is carried through
/// untouched in `extra`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub peers: BTreeMap<String, PeerEntry>,

    #[serde(default)]
    pub certificate_authorities: BTreeMap<String, CaEntry>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub orderers: BTreeMap<String, OrdererEntry>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub channels: BTreeMap<String, ChannelEntry>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Accessors shared by both topology layouts.
pub trait Topology {
    fn layout(&self) -> TopologyLayout;

    fn document(&self) -> &ProfileDocument;

    fn document_mut(&mut self) -> &mut ProfileDocument;

    /// gRPC overrides the layout's clients expect on an orderer entry.
    fn orderer_grpc_options(&self, orderer: &str) -> Map<String, Value>;

    fn has_peer(&self, peer: &str) -> bool {
        self.document().peers.contains_key(peer)
    }

    fn peer_url(&self, peer: &str) -> Option<&str> {
        self.document().peers.get(peer).map(|x| x.url.as_str())
    }

    fn set_peer_url(&mut self, peer: &str, url: String) -> Result<(), ProfileError> {
        let entry = self
            .document_mut()
            .peers
            .get_mut(peer)
            .ok_or_else(|| ProfileError::missing("peer", peer))?;

        entry.url = url;

        Ok(())
    }

    fn ca_url(&self, ca: &str) -> Option<&str> {
        self.document()
            .certificate_authorities
            .get(ca)
            .map(|x| x.url.as_str())
    }

    fn set_ca_url(&mut self, ca: &str, url: String) -> Result<(), ProfileError> {
        let entry = self
            .document_mut()
            .certificate_authorities
            .get_mut(ca)
            .ok_or_else(|| ProfileError::missing("certificate authority", ca))?;

        entry.url = url;

        Ok(())
    }

    fn ca_endpoint(&self, ca: &str) -> Result<CaEndpoint, ProfileError> {
        let entry = self
            .document()
            .certificate_authorities
            .get(ca)
            .ok_or_else(|| ProfileError::missing("certificate authority", ca))?;

        Ok(CaEndpoint {
            url: entry.url.clone(),
            ca_name: entry.ca_name.clone(),
            tls_ca_certs: entry
                .tls_ca_certs
                .pem
                .as_ref()
                .map(PemSource::to_vec)
                .unwrap_or_default(),
            verify_tls: entry
                .http_options
                .as_ref()
                .and_then(|x| x.verify)
                .unwrap_or(true),
        })
    }

    fn insert_orderer(&mut self, orderer: &str, url: String, tls_ca_pem: String) {
        let entry = OrdererEntry {
            url,
            grpc_options: self.orderer_grpc_options(orderer),
            tls_ca_certs: TlsCaCerts {
                pem: Some(PemSource::One(tls_ca_pem)),
                path: None,
            },
        };

        self.document_mut()
            .orderers
            .insert(orderer.to_owned(), entry);
    }

    /// Declares a channel served by a single orderer with one peer acting in
    /// every role.
    fn insert_channel(&mut self, channel: &str, orderer: &str, peer: &str) {
        let entry = ChannelEntry {
            orderers: vec![orderer.to_owned()],
            peers: BTreeMap::from([(peer.to_owned(), ChannelPeer::all_roles())]),
        };

        self.document_mut()
            .channels
            .insert(channel.to_owned(), entry);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegacyTopology(ProfileDocument);

impl Topology for LegacyTopology {
    fn layout(&self) -> TopologyLayout {
        TopologyLayout::Legacy
    }

    fn document(&self) -> &ProfileDocument {
        &self.0
    }

    fn document_mut(&mut self) -> &mut ProfileDocument {
        &mut self.0
    }

    fn orderer_grpc_options(&self, orderer: &str) -> Map<String, Value> {
        Map::from_iter([(SSL_TARGET_NAME_OVERRIDE.to_owned(), Value::from(orderer))])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModernTopology(ProfileDocument);

impl Topology for ModernTopology {
    fn layout(&self) -> TopologyLayout {
        TopologyLayout::Modern
    }

    fn document(&self) -> &ProfileDocument {
        &self.0
    }

    fn document_mut(&mut self) -> &mut ProfileDocument {
        &mut self.0
    }

    fn orderer_grpc_options(&self, orderer: &str) -> Map<String, Value> {
        Map::from_iter([
            (SSL_TARGET_NAME_OVERRIDE.to_owned(), Value::from(orderer)),
            (HOSTNAME_OVERRIDE.to_owned(), Value::from(orderer)),
        ])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionProfile {
    Legacy(LegacyTopology),
    Modern(ModernTopology),
}

impl ConnectionProfile {
    pub fn parse(layout: TopologyLayout, raw: &[u8]) -> Result<Self, ProfileError> {
        let document: ProfileDocument = serde_json::from_slice(raw)?;

        let profile = match layout {
            TopologyLayout::Legacy => Self::Legacy(LegacyTopology(document)),
            TopologyLayout::Modern => Self::Modern(ModernTopology(document)),
        };

        Ok(profile)
    }

    pub fn topology(&self) -> &dyn Topology {
        match self {
            Self::Legacy(x) => x,
            Self::Modern(x) => x,
        }
    }

    pub fn topology_mut(&mut self) -> &mut dyn Topology {
        match self {
            Self::Legacy(x) => x,
            Self::Modern(x) => x,
        }
    }

    pub fn to_json(&self) -> Result<Value, ProfileError> {
        Ok(serde_json::to_value(self.topology().document())?)
    }
}

impl Serialize for ConnectionProfile {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.topology().document().serialize(serializer)
    }
}

/// Helper for callers holding raw file contents pulled out of a container.
pub fn pem_from_bytes(what: &str, raw: Vec<u8>) -> Result<String, ProfileError> {
    String::from_utf8(raw).map_err(|_| ProfileError::InvalidText {
        what: what.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use fabric_testnet_testing::fixtures::{LEGACY_PROFILE_JSON, MODERN_PROFILE_JSON};

    fn legacy() -> ConnectionProfile {
        ConnectionProfile::parse(TopologyLayout::Legacy, LEGACY_PROFILE_JSON.as_bytes()).unwrap()
    }

    fn modern() -> ConnectionProfile {
        ConnectionProfile::parse(TopologyLayout::Modern, MODERN_PROFILE_JSON.as_bytes()).unwrap()
    }

    #[test]
    fn layout_boundary() {
        let pick = |v: &str| TopologyLayout::for_version(&v.parse().unwrap());

        assert_eq!(pick("1.4.8"), TopologyLayout::Legacy);
        assert_eq!(pick("1.99.99"), TopologyLayout::Legacy);
        assert_eq!(pick("2.0.0"), TopologyLayout::Modern);
        assert_eq!(pick("2.0"), TopologyLayout::Modern);
        assert_eq!(pick("2.3.0"), TopologyLayout::Modern);
    }

    #[test]
    fn layouts_use_distinct_paths() {
        assert_ne!(
            TopologyLayout::Legacy.profile_path(),
            TopologyLayout::Modern.profile_path()
        );
        assert_ne!(
            TopologyLayout::Legacy.orderer_tls_ca_path(),
            TopologyLayout::Modern.orderer_tls_ca_path()
        );
    }

    #[test]
    fn legacy_fixture_has_no_secondary_peer() {
        let profile = legacy();

        assert!(profile.topology().has_peer(PEER0_ORG1));
        assert!(!profile.topology().has_peer(PEER1_ORG1));
    }

    #[test]
    fn set_missing_peer_fails() {
        let mut profile = legacy();

        let err = profile
            .topology_mut()
            .set_peer_url("peer9.org1.example.com", "grpcs://localhost:1".into())
            .unwrap_err();

        assert!(matches!(err, ProfileError::MissingEntry { kind: "peer", .. }));
    }

    #[test]
    fn ca_endpoint_reads_pem_list_and_verify_flag() {
        let profile = modern();
        let endpoint = profile.topology().ca_endpoint(CA_ORG1).unwrap();

        assert_eq!(endpoint.ca_name.as_deref(), Some("ca-org1"));
        assert_eq!(endpoint.tls_ca_certs.len(), 1);
        assert!(!endpoint.verify_tls);
    }

    #[test]
    fn ca_endpoint_missing_entry() {
        let profile = legacy();
        let err = profile.topology().ca_endpoint("ca.org9.example.com").unwrap_err();

        assert!(err.to_string().contains("ca.org9.example.com"));
    }

    #[test]
    fn unknown_fields_survive_round_trip() {
        let profile = modern();
        let json = profile.to_json().unwrap();

        assert_eq!(json["client"]["organization"], "Org1");
        assert_eq!(json["organizations"]["Org1"]["mspid"], "Org1MSP");
        assert!(json.get("orderers").is_none());
    }

    #[test]
    fn orderer_overrides_differ_by_layout() {
        let mut legacy = legacy();
        let mut modern = modern();

        for profile in [&mut legacy, &mut modern] {
            let topology = profile.topology_mut();
            topology.insert_orderer(ORDERER, "grpcs://localhost:1".into(), "pem".into());
            topology.insert_channel(DEFAULT_CHANNEL, ORDERER, PEER0_ORG1);
        }

        let legacy = legacy.to_json().unwrap();
        let modern = modern.to_json().unwrap();

        assert!(legacy["orderers"][ORDERER]["grpcOptions"]
            .get(HOSTNAME_OVERRIDE)
            .is_none());
        assert_eq!(
            modern["orderers"][ORDERER]["grpcOptions"][HOSTNAME_OVERRIDE],
            ORDERER
        );
        assert_eq!(
            modern["channels"][DEFAULT_CHANNEL]["peers"][PEER0_ORG1]["eventSource"],
            true
        );
    }
}
