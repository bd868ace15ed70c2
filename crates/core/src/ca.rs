//! The certificate-authority seam: register-then-enroll.

use thiserror::Error;

use crate::identity::Identity;

#[derive(Debug, Error)]
pub enum CaError {
    #[error("certificate authority unreachable: {0}")]
    Unreachable(String),

    #[error("certificate authority rejected the request: {0}")]
    Rejected(String),

    #[error("malformed certificate authority response: {0}")]
    Malformed(String),

    #[error("no authenticated session: {0}")]
    Unauthenticated(String),

    #[error("key material error: {0}")]
    Crypto(String),
}

impl CaError {
    pub fn unreachable(error: impl std::fmt::Display) -> Self {
        Self::Unreachable(error.to_string())
    }

    pub fn malformed(error: impl std::fmt::Display) -> Self {
        Self::Malformed(error.to_string())
    }

    pub fn crypto(error: impl std::fmt::Display) -> Self {
        Self::Crypto(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentRequest {
    pub enrollment_id: String,
    pub enrollment_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub enrollment_id: String,
    pub affiliation: String,
    pub role: String,
    pub max_enrollments: Option<u32>,
}

/// Signed certificate and matching private key, both PEM encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrollment {
    pub certificate: String,
    pub key: String,
}

/// Where and how to reach a certificate authority, as described by a
/// connection profile entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaEndpoint {
    pub url: String,
    pub ca_name: Option<String>,
    pub tls_ca_certs: Vec<String>,
    pub verify_tls: bool,
}

#[trait_variant::make(Send)]
pub trait CertificateAuthority: Send + Sync {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<Enrollment, CaError>;

    /// Creates a one-time enrollment secret for a new principal. The
    /// registrar must hold registration privileges on the authority.
    async fn register(
        &self,
        request: &RegistrationRequest,
        registrar: &Identity,
    ) -> Result<String, CaError>;
}

/// Builds certificate-authority clients from profile endpoints.
pub trait CaConnector: Send + Sync + 'static {
    type Client: CertificateAuthority;

    fn connect(&self, endpoint: &CaEndpoint) -> Result<Self::Client, CaError>;
}
