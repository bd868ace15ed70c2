use tracing::info;

use super::FabricTestLedger;
use crate::prelude::*;

impl<R, C> FabricTestLedger<R, C>
where
    R: ContainerRuntime,
    C: CaConnector,
{
    /// Connects to the first organization's certificate authority. Profile
    /// failures surface directly, the connector's own failure is left for
    /// the caller to attribute.
    async fn connect_ca(&self) -> Result<Result<C::Client, CaError>, Error> {
        let profile = self.connection_profile().await?;
        let endpoint = profile.topology().ca_endpoint(CA_ORG1)?;

        Ok(self.connector.connect(&endpoint))
    }

    /// Client for the first organization's certificate authority, built
    /// from the patched connection profile.
    pub async fn create_ca_client(&self) -> Result<C::Client, Error> {
        self.connect_ca().await?.map_err(|source| Error::CaClient {
            ca: CA_ORG1.to_owned(),
            source,
        })
    }

    /// Enrolls the bootstrap administrator and returns its identity along
    /// with a fresh wallet holding it under the admin label.
    pub async fn enroll_admin(&self) -> Result<(Identity, Wallet), Error> {
        let phase = EnrollmentPhase::AdminBootstrap;
        let ca = self
            .connect_ca()
            .await?
            .map_err(|e| Error::enrollment(phase, ADMIN_ENROLLMENT_ID, e))?;

        let request = EnrollmentRequest {
            enrollment_id: ADMIN_ENROLLMENT_ID.to_owned(),
            enrollment_secret: ADMIN_ENROLLMENT_SECRET.to_owned(),
        };

        let enrollment = ca
            .enroll(&request)
            .await
            .map_err(|e| Error::enrollment(phase, ADMIN_ENROLLMENT_ID, e))?;

        let identity = Identity::x509(DEFAULT_MSP_ID, enrollment);

        let mut wallet = Wallet::new();
        wallet.put(ADMIN_ENROLLMENT_ID, identity.clone());

        info!(
            principal = ADMIN_ENROLLMENT_ID,
            msp_id = DEFAULT_MSP_ID,
            "enrolled admin identity"
        );

        Ok((identity, wallet))
    }

    /// Registers the secondary principal using the admin identity found in
    /// `wallet`, enrolls it with the one-time secret the CA hands back and
    /// stores the result under the user label.
    ///
    /// `wallet` is only written once every step has succeeded.
    pub async fn enroll_user(&self, wallet: &mut Wallet) -> Result<Identity, Error> {
        let registrar = wallet.get(ADMIN_ENROLLMENT_ID).cloned().ok_or_else(|| {
            Error::enrollment(
                EnrollmentPhase::Registration,
                USER_ENROLLMENT_ID,
                CaError::Unauthenticated(format!(
                    "wallet holds no {ADMIN_ENROLLMENT_ID} identity to register with"
                )),
            )
        })?;

        let ca = self.connect_ca().await?.map_err(|e| {
            Error::enrollment(EnrollmentPhase::Registration, USER_ENROLLMENT_ID, e)
        })?;

        let registration = RegistrationRequest {
            enrollment_id: USER_ENROLLMENT_ID.to_owned(),
            affiliation: USER_AFFILIATION.to_owned(),
            role: USER_ROLE.to_owned(),
            max_enrollments: None,
        };

        let secret = ca.register(&registration, &registrar).await.map_err(|e| {
            Error::enrollment(EnrollmentPhase::Registration, USER_ENROLLMENT_ID, e)
        })?;

        let request = EnrollmentRequest {
            enrollment_id: USER_ENROLLMENT_ID.to_owned(),
            enrollment_secret: secret,
        };

        let enrollment = ca.enroll(&request).await.map_err(|e| {
            Error::enrollment(EnrollmentPhase::UserEnrollment, USER_ENROLLMENT_ID, e)
        })?;

        let identity = Identity::x509(DEFAULT_MSP_ID, enrollment);
        wallet.put(USER_ENROLLMENT_ID, identity.clone());

        info!(
            principal = USER_ENROLLMENT_ID,
            affiliation = USER_AFFILIATION,
            "enrolled user identity"
        );

        Ok(identity)
    }
}
