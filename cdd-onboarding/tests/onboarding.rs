use cdd_onboarding::{
    CoordinatorConfig, ConfidentialIdentityPrimitive, ErrorKind, IdentityId, IdentityLedger,
    InMemoryLedger, InMemoryRegistry, NewUserOutcome, OnboardingCoordinator, Operation,
    PiiRecord, PiiRecordBuilder, RegistryMatch, Scope, SigningKey, Step, StepJournal,
    StepOutcome, UniqueId, UniquenessPrimitive, UniquenessRegistry,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{sync::Arc, time::Duration};

const SEED: [u8; 32] = [21u8; 32];

struct Harness {
    ledger: Arc<InMemoryLedger>,
    registry: Arc<InMemoryRegistry>,
    journal: Arc<StepJournal>,
    coordinator: OnboardingCoordinator,
    rng: StdRng,
}

fn provider(name: &str) -> RegistryMatch {
    RegistryMatch {
        provider_name: name.into(),
        provider_url: format!("https://{}.example", name),
    }
}

fn harness_with(
    config: CoordinatorConfig,
    ledger: InMemoryLedger,
    registry: InMemoryRegistry,
) -> Harness {
    let _ = env_logger::try_init();

    let ledger = Arc::new(ledger);
    let registry = Arc::new(registry);
    let journal = Arc::new(StepJournal::new());
    let coordinator = OnboardingCoordinator::new(
        ledger.clone(),
        registry.clone(),
        Arc::new(ConfidentialIdentityPrimitive),
        config,
    )
    .with_observer(journal.clone());

    Harness {
        ledger,
        registry,
        journal,
        coordinator,
        rng: StdRng::from_seed(SEED),
    }
}

fn harness() -> Harness {
    harness_with(
        CoordinatorConfig::default(),
        InMemoryLedger::new(Arc::new(ConfidentialIdentityPrimitive)),
        InMemoryRegistry::new(provider("local")),
    )
}

impl Harness {
    fn key(&mut self) -> SigningKey {
        SigningKey::random(&mut self.rng)
    }

    fn pii(&mut self) -> PiiRecord {
        PiiRecord::dummy(&mut self.rng)
    }

    /// Onboards a new user and returns `(key, pii, identity id, unique id)`.
    async fn issued(&mut self) -> (SigningKey, PiiRecord, IdentityId, UniqueId) {
        let key = self.key();
        let pii = self.pii();
        match self.coordinator.onboard_new_user(&key, &pii).await.unwrap() {
            NewUserOutcome::Issued(issued) => (key, pii, issued.identity_id, issued.unique_id),
            other => panic!("expected Issued, got {:?}", other),
        }
    }
}

fn passport(document_number: &str) -> PiiRecord {
    PiiRecordBuilder::new()
        .first_name("Grace")
        .last_name("Hopper")
        .birth_date("1906-12-09")
        .country_code("US")
        .document("PASSPORT", document_number, "2032-02-29")
        .build()
        .unwrap()
}

#[tokio::test]
async fn fresh_key_and_pii_are_issued() {
    let mut h = harness();
    let key = h.key();
    let pii = h.pii();

    let issued = match h.coordinator.onboard_new_user(&key, &pii).await.unwrap() {
        NewUserOutcome::Issued(issued) => issued,
        other => panic!("expected Issued, got {:?}", other),
    };

    assert_ne!(issued.identity_id, IdentityId::zero());
    assert_eq!(
        h.registry
            .check_unique_id(&pii, &issued.unique_id)
            .await
            .unwrap(),
        Some(provider("local"))
    );

    let expected_cdd_id = ConfidentialIdentityPrimitive
        .derive(issued.identity_id.as_ref(), issued.unique_id.as_bytes())
        .unwrap();
    assert_eq!(issued.cdd_id, expected_cdd_id);

    let identity = h.ledger.identity(&issued.identity_id).unwrap();
    assert_eq!(identity.primary_key, key);
    assert!(identity.has_cdd_claim(&expected_cdd_id));
}

#[tokio::test]
async fn checks_run_before_any_mutation() {
    let mut h = harness();
    h.issued().await;

    let steps = h.journal.steps(Operation::NewUser);
    assert_eq!(
        steps,
        vec![
            Step::CheckKeyUnused,
            Step::ValidatePii,
            Step::SearchPrimaryPii,
            Step::IssueUniqueId,
            Step::NormalizeUniqueId,
            Step::CreateIdentity,
            Step::DeriveCommitment,
            Step::AttestCddClaim,
        ]
    );

    let first_mutation = steps.iter().position(Step::is_mutation).unwrap();
    let key_check = steps.iter().position(|s| *s == Step::CheckKeyUnused).unwrap();
    let pii_check = steps.iter().position(|s| *s == Step::SearchPrimaryPii).unwrap();
    assert!(key_check < first_mutation && pii_check < first_mutation);
    assert!(h
        .journal
        .events()
        .iter()
        .all(|event| event.outcome == StepOutcome::Completed));
}

#[tokio::test]
async fn used_key_fails_without_registry_calls() {
    let mut h = harness();
    let key = h.key();
    h.ledger.register_identity(&key).await.unwrap();

    for _ in 0..3 {
        let pii = h.pii();
        assert_eq!(
            h.coordinator
                .onboard_new_user(&key, &pii)
                .await
                .unwrap_err()
                .kind(),
            &ErrorKind::KeyInUse { key }
        );

        let unique_id = UniqueId::from_bytes([9u8; 16]);
        assert_eq!(
            h.coordinator
                .onboard_new_identity_for_known_person(&key, &pii, &unique_id)
                .await
                .unwrap_err()
                .kind(),
            &ErrorKind::KeyInUse { key }
        );
    }

    assert_eq!(h.registry.calls().total(), 0);
    assert_eq!(h.ledger.identity_count(), 1);
}

#[tokio::test]
async fn key_checks_win_over_malformed_pii() {
    let mut h = harness();
    let key = h.key();
    let owned = h.ledger.register_identity(&key).await.unwrap();
    let empty = PiiRecord::new(Vec::new());
    let unique_id = UniqueId::from_bytes([9u8; 16]);

    assert_eq!(
        h.coordinator
            .onboard_new_user(&key, &empty)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyInUse { key }
    );
    assert_eq!(
        h.coordinator
            .onboard_new_identity_for_known_person(&key, &empty, &unique_id)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyInUse { key }
    );

    let other_identity = IdentityId::new([4u8; 32]);
    assert_eq!(
        h.coordinator
            .onboard_existing_identity(&key, &empty, &unique_id, &other_identity)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyIdentityMismatch {
            expected: other_identity,
            found: Some(owned.id),
        }
    );

    // Validation is still reached once the key checks pass.
    let fresh = h.key();
    assert!(matches!(
        h.coordinator
            .onboard_new_user(&fresh, &empty)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::InvalidPii { .. }
    ));

    assert_eq!(
        h.journal.steps(Operation::NewUser).first(),
        Some(&Step::CheckKeyUnused)
    );
    assert_eq!(h.registry.calls().total(), 0);
    assert_eq!(h.ledger.identity_count(), 1);
}

#[tokio::test]
async fn matching_primary_pii_redirects_without_side_effects() {
    let mut h = harness();
    h.registry
        .insert_record(
            &passport("A1"),
            UniqueId::from_bytes([3u8; 16]),
            provider("elsewhere"),
        )
        .unwrap();

    // Another document of the same person still matches.
    let key = h.key();
    let outcome = h
        .coordinator
        .onboard_new_user(&key, &passport("B2"))
        .await
        .unwrap();
    assert_eq!(outcome, NewUserOutcome::Redirect(provider("elsewhere")));

    assert_eq!(h.ledger.calls().mutations(), 0);
    assert_eq!(h.ledger.identity_count(), 0);
    assert_eq!(h.registry.calls().issue_unique_id, 0);
    assert_eq!(h.registry.record_count(), 1);

    let last = h.journal.events().pop().unwrap();
    assert_eq!(last.step, Step::SearchPrimaryPii);
    assert_eq!(last.outcome, StepOutcome::Redirected);
}

#[tokio::test]
async fn inconsistent_unique_id_is_not_attested() {
    let mut h = harness();
    let (key, pii, identity_id, _) = h.issued().await;
    let claims_before = h.ledger.calls().add_claim;

    let other_unique_id = UniqueId::from_bytes([1u8; 16]);
    assert_eq!(
        h.coordinator
            .onboard_existing_identity(&key, &pii, &other_unique_id, &identity_id)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::PiiUniqueIdMismatch {
            unique_id: other_unique_id
        }
    );
    assert_eq!(h.ledger.calls().add_claim, claims_before);

    let fresh_key = h.key();
    assert!(h
        .coordinator
        .onboard_new_identity_for_known_person(&fresh_key, &pii, &other_unique_id)
        .await
        .is_err());
    assert_eq!(h.ledger.calls().register_identity, 1);
}

#[tokio::test]
async fn foreign_key_cannot_attest() {
    let mut h = harness();
    let (_, pii, identity_id, unique_id) = h.issued().await;
    let (other_key, _, other_identity_id, _) = h.issued().await;

    let unknown_key = h.key();
    assert_eq!(
        h.coordinator
            .onboard_existing_identity(&unknown_key, &pii, &unique_id, &identity_id)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyIdentityMismatch {
            expected: identity_id,
            found: None
        }
    );
    assert_eq!(
        h.coordinator
            .onboard_existing_identity(&other_key, &pii, &unique_id, &identity_id)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyIdentityMismatch {
            expected: identity_id,
            found: Some(other_identity_id)
        }
    );
}

#[tokio::test]
async fn repeated_attestation_is_a_no_op() {
    let mut h = harness();
    let (key, pii, identity_id, unique_id) = h.issued().await;

    let first = h
        .coordinator
        .onboard_existing_identity(&key, &pii, &unique_id, &identity_id)
        .await
        .unwrap();
    let second = h
        .coordinator
        .onboard_existing_identity(&key, &pii, &unique_id, &identity_id)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(h.ledger.identity(&identity_id).unwrap().claims.len(), 1);
}

#[tokio::test]
async fn end_to_end_scenario() {
    let mut h = harness();
    let k1 = h.key();
    let k2 = h.key();
    let p1 = h.pii();

    let (d1, u1) = match h.coordinator.onboard_new_user(&k1, &p1).await.unwrap() {
        NewUserOutcome::Issued(issued) => (issued.identity_id, issued.unique_id),
        other => panic!("expected Issued, got {:?}", other),
    };

    assert_eq!(
        h.coordinator.onboard_new_user(&k2, &p1).await.unwrap(),
        NewUserOutcome::Redirect(provider("local"))
    );

    let attestation = h
        .coordinator
        .onboard_existing_identity(&k1, &p1, &u1, &d1)
        .await
        .unwrap();
    assert_eq!(attestation.identity_id, d1);

    let second = h
        .coordinator
        .onboard_new_identity_for_known_person(&k2, &p1, &u1)
        .await
        .unwrap();
    assert_ne!(second.identity_id, d1);
    assert_ne!(second.cdd_id, attestation.cdd_id);
    assert_eq!(h.ledger.identity_of(&k2).await.unwrap().unwrap().id, second.identity_id);
    assert_eq!(h.registry.record_count(), 1);
}

#[tokio::test]
async fn claim_failure_after_identity_creation_is_partial() {
    let mut h = harness();
    let key = h.key();
    let pii = h.pii();

    h.ledger.fail_next_claim();
    let error = h.coordinator.onboard_new_user(&key, &pii).await.unwrap_err();
    let (identity_id, unique_id) = match error.kind() {
        ErrorKind::PartialAttestationFailure {
            identity_id: Some(identity_id),
            unique_id: Some(unique_id),
            cause,
        } => {
            assert!(matches!(**cause, ErrorKind::TransportError { .. }));
            (*identity_id, *unique_id)
        }
        other => panic!("expected a partial failure, got {:?}", other),
    };
    assert!(!error.is_retryable());
    assert!(h.ledger.identity(&identity_id).unwrap().claims.is_empty());

    // Creating the identity again is refused; retrying the attestation is not.
    assert_eq!(
        h.coordinator
            .onboard_new_user(&key, &pii)
            .await
            .unwrap_err()
            .kind(),
        &ErrorKind::KeyInUse { key }
    );
    h.coordinator
        .onboard_existing_identity(&key, &pii, &unique_id, &identity_id)
        .await
        .unwrap();
    assert_eq!(h.ledger.identity(&identity_id).unwrap().claims.len(), 1);
}

#[tokio::test]
async fn claim_failure_for_known_person_is_partial() {
    let mut h = harness();
    let (_, pii, _, unique_id) = h.issued().await;
    let key = h.key();

    h.ledger.fail_next_claim();
    let error = h
        .coordinator
        .onboard_new_identity_for_known_person(&key, &pii, &unique_id)
        .await
        .unwrap_err();
    match error.kind() {
        ErrorKind::PartialAttestationFailure {
            identity_id: Some(_),
            unique_id: Some(partial_unique_id),
            ..
        } => assert_eq!(*partial_unique_id, unique_id),
        other => panic!("expected a partial failure, got {:?}", other),
    }
}

#[tokio::test]
async fn failure_without_mutation_is_not_partial() {
    let mut h = harness();
    let (key, pii, identity_id, unique_id) = h.issued().await;

    h.ledger.fail_next_claim();
    let error = h
        .coordinator
        .onboard_existing_identity(&key, &pii, &unique_id, &identity_id)
        .await
        .unwrap_err();
    assert!(error.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn slow_registry_is_a_transport_error() {
    let mut h = harness_with(
        CoordinatorConfig {
            call_timeout_ms: 100,
            ..CoordinatorConfig::default()
        },
        InMemoryLedger::new(Arc::new(ConfidentialIdentityPrimitive)),
        InMemoryRegistry::new(provider("local")).with_latency(Duration::from_secs(60)),
    );
    let key = h.key();
    let pii = h.pii();

    let error = h.coordinator.onboard_new_user(&key, &pii).await.unwrap_err();
    assert!(error.is_retryable());
    assert!(matches!(
        error.kind(),
        ErrorKind::TransportError { call, .. } if call == Step::SearchPrimaryPii.as_str()
    ));
    assert_eq!(h.ledger.calls().mutations(), 0);

    let last = h.journal.events().pop().unwrap();
    assert_eq!(last.outcome, StepOutcome::Failed);
}

#[tokio::test(start_paused = true)]
async fn concurrent_registration_of_one_key_creates_one_identity() {
    let mut h = harness_with(
        CoordinatorConfig::default(),
        InMemoryLedger::new(Arc::new(ConfidentialIdentityPrimitive))
            .with_latency(Duration::from_millis(10)),
        InMemoryRegistry::new(provider("local")),
    );
    let key = h.key();
    let pii = h.pii();
    let unique_id = h.registry.issue_unique_id(&pii).await.unwrap();

    // Both requests pass the key check before either one registers.
    let (first, second) = tokio::join!(
        h.coordinator
            .onboard_new_identity_for_known_person(&key, &pii, &unique_id),
        h.coordinator
            .onboard_new_identity_for_known_person(&key, &pii, &unique_id)
    );
    let (attested, failed) = match (first, second) {
        (Ok(attested), Err(failed)) | (Err(failed), Ok(attested)) => (attested, failed),
        other => panic!("expected exactly one success, got {:?}", other),
    };

    assert_eq!(failed.kind(), &ErrorKind::KeyInUse { key });
    assert_eq!(h.ledger.identity_count(), 1);
    assert_eq!(
        h.ledger.identity_of(&key).await.unwrap().unwrap().id,
        attested.identity_id
    );
}

#[tokio::test]
async fn investor_uniqueness_claim() {
    let mut h = harness_with(
        CoordinatorConfig {
            fee_allowance: 10,
            ..CoordinatorConfig::default()
        },
        InMemoryLedger::new(Arc::new(ConfidentialIdentityPrimitive)),
        InMemoryRegistry::new(provider("local")),
    );
    let (k1, pii, d1, unique_id) = h.issued().await;
    let cdd_id = h.ledger.identity(&d1).unwrap().claims[0].clone();
    let cdd_id = match cdd_id {
        cdd_onboarding::Claim::CustomerDueDiligence { cdd_id } => cdd_id,
        other => panic!("expected a CDD claim, got {:?}", other),
    };
    let scope = Scope::padded(b"ACME").unwrap();

    let proof = h
        .coordinator
        .claim_investor_uniqueness(&k1, &d1, &unique_id, &cdd_id, &scope)
        .await
        .unwrap();
    assert_eq!(proof.scope, scope);
    assert_eq!(h.ledger.identity(&d1).unwrap().claims.len(), 2);
    assert_eq!(h.ledger.balance_of(&k1).await.unwrap(), 10);

    // A second identity of the same person ends up with the same SCOPE_ID.
    let k2 = h.key();
    let second = h
        .coordinator
        .onboard_new_identity_for_known_person(&k2, &pii, &unique_id)
        .await
        .unwrap();
    let second_proof = h
        .coordinator
        .claim_investor_uniqueness(&k2, &second.identity_id, &unique_id, &second.cdd_id, &scope)
        .await
        .unwrap();
    assert_eq!(second_proof.scope_id, proof.scope_id);
}

#[tokio::test]
async fn investor_uniqueness_needs_the_attested_cdd_id() {
    let mut h = harness();
    let (k1, _, d1, unique_id) = h.issued().await;
    let scope = Scope::padded(b"ACME").unwrap();
    let claims_before = h.ledger.calls().add_claim;

    let forged = ConfidentialIdentityPrimitive
        .derive(d1.as_ref(), &[0u8; 16])
        .unwrap();
    let error = h
        .coordinator
        .claim_investor_uniqueness(&k1, &d1, &unique_id, &forged, &scope)
        .await
        .unwrap_err();
    assert!(matches!(error.kind(), ErrorKind::CddIdMismatch { expected, .. } if *expected == forged));

    let stranger = h.key();
    let cdd_id = ConfidentialIdentityPrimitive
        .derive(d1.as_ref(), unique_id.as_bytes())
        .unwrap();
    assert!(matches!(
        h.coordinator
            .claim_investor_uniqueness(&stranger, &d1, &unique_id, &cdd_id, &scope)
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::KeyIdentityMismatch { .. }
    ));

    assert_eq!(h.ledger.calls().add_claim, claims_before);
    assert_eq!(h.ledger.calls().transfer, 0);
}
