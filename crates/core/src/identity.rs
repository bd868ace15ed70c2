use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ca::Enrollment;

pub const X509_IDENTITY_TYPE: &str = "X.509";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    pub certificate: String,
    pub private_key: String,
}

/// A signed identity issued by the certificate authority.
///
/// Serializes to the wallet entry layout ledger SDKs exchange:
/// `{ credentials: { certificate, privateKey }, mspId, type, version }`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    credentials: Credentials,
    msp_id: String,
    #[serde(rename = "type")]
    identity_type: String,
    version: u32,
}

impl Identity {
    pub fn x509(msp_id: impl Into<String>, enrollment: Enrollment) -> Self {
        Self {
            credentials: Credentials {
                certificate: enrollment.certificate,
                private_key: enrollment.key,
            },
            msp_id: msp_id.into(),
            identity_type: X509_IDENTITY_TYPE.to_owned(),
            version: 1,
        }
    }

    pub fn certificate(&self) -> &str {
        &self.credentials.certificate
    }

    pub fn private_key(&self) -> &str {
        &self.credentials.private_key
    }

    pub fn msp_id(&self) -> &str {
        &self.msp_id
    }

    pub fn identity_type(&self) -> &str {
        &self.identity_type
    }
}

/// In-memory identity store keyed by principal name.
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    identities: HashMap<String, Identity>,
}

impl Wallet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `identity` under `label`, returning whatever was there before.
    pub fn put(&mut self, label: impl Into<String>, identity: Identity) -> Option<Identity> {
        self.identities.insert(label.into(), identity)
    }

    pub fn get(&self, label: &str) -> Option<&Identity> {
        self.identities.get(label)
    }

    pub fn remove(&mut self, label: &str) -> Option<Identity> {
        self.identities.remove(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.identities.contains_key(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.identities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment(tag: &str) -> Enrollment {
        Enrollment {
            certificate: format!("cert-{tag}"),
            key: format!("key-{tag}"),
        }
    }

    #[test]
    fn x509_identity_carries_type_tag() {
        let identity = Identity::x509("Org1MSP", enrollment("a"));

        assert_eq!(identity.msp_id(), "Org1MSP");
        assert_eq!(identity.identity_type(), "X.509");
        assert_eq!(identity.certificate(), "cert-a");
        assert_eq!(identity.private_key(), "key-a");
    }

    #[test]
    fn wallet_keys_are_unique() {
        let mut wallet = Wallet::new();

        assert!(wallet.put("admin", Identity::x509("Org1MSP", enrollment("a"))).is_none());
        let previous = wallet.put("admin", Identity::x509("Org1MSP", enrollment("b")));

        assert_eq!(previous.unwrap().certificate(), "cert-a");
        assert_eq!(wallet.len(), 1);
        assert_eq!(wallet.get("admin").unwrap().certificate(), "cert-b");
    }

    #[test]
    fn serializes_as_sdk_wallet_entry() {
        let identity = Identity::x509("Org1MSP", enrollment("a"));
        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(json["mspId"], "Org1MSP");
        assert_eq!(json["type"], "X.509");
        assert_eq!(json["credentials"]["privateKey"], "key-a");
        assert_eq!(json["version"], 1);
    }
}
