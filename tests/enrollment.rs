//! Integration tests for identity bootstrap against the stub certificate
//! authority.

use fabric_testnet::prelude::*;
use fabric_testnet::FabricTestLedger;
use fabric_testnet_testing::fixtures::PROFILE_WITHOUT_CA_JSON;
use fabric_testnet_testing::{FakeRuntime, StubCa};

async fn started_ledger(runtime: FakeRuntime, ca: &StubCa) -> FabricTestLedger<FakeRuntime, StubCa> {
    let mut ledger =
        FabricTestLedger::new(LedgerInstanceOptions::new(false), runtime, ca.clone()).unwrap();

    ledger.start(true).await.unwrap();
    ledger
}

#[tokio::test]
async fn admin_enrollment_yields_single_identity_wallet() {
    let ca = StubCa::new();
    let ledger = started_ledger(FakeRuntime::with_ledger_files(), &ca).await;

    let (identity, wallet) = ledger.enroll_admin().await.unwrap();

    assert_eq!(identity.msp_id(), DEFAULT_MSP_ID);
    assert_eq!(identity.identity_type(), X509_IDENTITY_TYPE);
    assert_eq!(wallet.len(), 1);
    assert_eq!(wallet.get(ADMIN_ENROLLMENT_ID), Some(&identity));
    assert_eq!(ca.enrollments(), vec![ADMIN_ENROLLMENT_ID]);
}

#[tokio::test]
async fn user_enrollment_needs_admin_in_wallet() {
    let ca = StubCa::new();
    let ledger = started_ledger(FakeRuntime::with_ledger_files(), &ca).await;

    let mut wallet = Wallet::new();
    let err = ledger.enroll_user(&mut wallet).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Enrollment {
            phase: EnrollmentPhase::Registration,
            source: CaError::Unauthenticated(_),
            ..
        }
    ));
    assert!(wallet.is_empty());
    assert!(ca.registrations().is_empty());
}

#[tokio::test]
async fn user_is_registered_then_enrolled() {
    let ca = StubCa::new();
    let ledger = started_ledger(FakeRuntime::with_ledger_files(), &ca).await;

    let (admin, mut wallet) = ledger.enroll_admin().await.unwrap();
    let user = ledger.enroll_user(&mut wallet).await.unwrap();

    let registrations = ca.registrations();

    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].enrollment_id, USER_ENROLLMENT_ID);
    assert_eq!(registrations[0].affiliation, USER_AFFILIATION);
    assert_eq!(registrations[0].role, USER_ROLE);

    assert_eq!(ca.enrollments(), vec![ADMIN_ENROLLMENT_ID, USER_ENROLLMENT_ID]);
    assert_eq!(wallet.len(), 2);
    assert_eq!(wallet.get(USER_ENROLLMENT_ID), Some(&user));
    assert_eq!(user.msp_id(), DEFAULT_MSP_ID);
    assert_ne!(user.certificate(), admin.certificate());
}

#[tokio::test]
async fn unreachable_ca_fails_admin_bootstrap() {
    let ca = StubCa::new().unreachable();
    let ledger = started_ledger(FakeRuntime::with_ledger_files(), &ca).await;

    let err = ledger.enroll_admin().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Enrollment {
            phase: EnrollmentPhase::AdminBootstrap,
            source: CaError::Unreachable(_),
            ..
        }
    ));
}

#[tokio::test]
async fn profile_without_ca_entry_is_reported() {
    let runtime = FakeRuntime::with_ledger_files()
        .with_file(TopologyLayout::Legacy.profile_path(), PROFILE_WITHOUT_CA_JSON);

    let ca = StubCa::new();
    let ledger = started_ledger(runtime, &ca).await;

    let err = ledger.enroll_admin().await.unwrap_err();

    assert!(matches!(err, Error::Profile(_)));
    assert!(ca.endpoints().is_empty());
}

#[tokio::test]
async fn enrollment_requires_started_ledger() {
    let ledger = FabricTestLedger::new(
        LedgerInstanceOptions::new(true),
        FakeRuntime::with_ledger_files(),
        StubCa::new(),
    )
    .unwrap();

    assert!(matches!(
        ledger.enroll_admin().await,
        Err(Error::ContainerNotStarted { .. })
    ));
}
