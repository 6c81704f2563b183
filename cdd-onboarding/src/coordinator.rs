//! The onboarding coordinator.
//!
//! Each operation is a fixed sequence of steps over the ledger, the registry and
//! the uniqueness primitive. Read-only checks hand out tokens (`UnusedKey`,
//! `UnmatchedPii`, `OwnedIdentity`, and the person bindings `IssuedUniqueId` and
//! `ConsistentPii`) and the mutating steps take them as arguments, so a mutation
//! cannot be reached before the checks that gate it.
//!
//! Key resolution always comes first, so a key that is already in use (or owned by
//! another identity) is reported as such whatever the PII looks like.
//!
//! The coordinator keeps no state between requests and never rolls back. A
//! failure after a mutation is reported as `PartialAttestationFailure`, carrying
//! whatever was already created so the caller can retry the attestation alone.

use crate::{
    bytes::{CddId, IdentityId, Scope, UniqueIdBytes},
    config::CoordinatorConfig,
    errors::{Error, ErrorKind, Fallible},
    events::{LogObserver, OnboardingObserver, Operation, Step, StepEvent, StepOutcome},
    ledger::IdentityLedger,
    pii::PiiRecord,
    primitive::{UniquenessPrimitive, UniquenessProof},
    registry::{RegistryMatch, UniquenessRegistry},
    types::{Claim, Identity, SigningKey},
    unique_id::{normalize, UniqueId},
};
use log::{info, warn};
use metrics::{counter, timing};
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Instant};

/// An identity created for a new person.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedIdentity {
    pub identity_id: IdentityId,
    pub unique_id: UniqueId,
    pub cdd_id: CddId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewUserOutcome {
    Issued(IssuedIdentity),
    /// The person is already onboarded by the provider in the match.
    Redirect(RegistryMatch),
}

/// A CDD claim attested on an identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CddAttestation {
    pub identity_id: IdentityId,
    pub cdd_id: CddId,
}

// ------------------------------------------------------------------------
// Step tokens
// ------------------------------------------------------------------------

/// The key resolved to no identity.
struct UnusedKey<'a>(&'a SigningKey);

/// No record matches the primary attributes.
struct UnmatchedPii<'a>(&'a PiiRecord);

/// The key resolves to the identity.
struct OwnedIdentity(IdentityId);

/// A unique id freshly issued by the registry.
struct IssuedUniqueId(UniqueId);

/// The registry confirmed that the PII is on record under the unique id.
struct ConsistentPii(UniqueId);

/// A unique id the registry vouches for.
trait PersonBinding {
    fn unique_id(&self) -> UniqueId;
}

impl PersonBinding for IssuedUniqueId {
    fn unique_id(&self) -> UniqueId {
        self.0
    }
}

impl PersonBinding for ConsistentPii {
    fn unique_id(&self) -> UniqueId {
        self.0
    }
}

enum PrimarySearch<'a> {
    Unmatched(UnmatchedPii<'a>),
    Matched(RegistryMatch),
}

/// Wraps a failure that happened after `identity_id` or `unique_id` was persisted.
fn partial(
    identity_id: Option<IdentityId>,
    unique_id: Option<UniqueId>,
) -> impl FnOnce(Error) -> Error {
    move |error| {
        ErrorKind::PartialAttestationFailure {
            identity_id,
            unique_id,
            cause: Box::new(error.kind().clone()),
        }
        .into()
    }
}

pub struct OnboardingCoordinator {
    ledger: Arc<dyn IdentityLedger>,
    registry: Arc<dyn UniquenessRegistry>,
    primitive: Arc<dyn UniquenessPrimitive>,
    observer: Arc<dyn OnboardingObserver>,
    config: CoordinatorConfig,
}

impl OnboardingCoordinator {
    pub fn new(
        ledger: Arc<dyn IdentityLedger>,
        registry: Arc<dyn UniquenessRegistry>,
        primitive: Arc<dyn UniquenessPrimitive>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            ledger,
            registry,
            primitive,
            observer: Arc::new(LogObserver),
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn OnboardingObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Onboards a person with a fresh key.
    ///
    /// Returns `Redirect` without side effects when the primary PII is already on
    /// record with some provider.
    pub async fn onboard_new_user(
        &self,
        key: &SigningKey,
        pii: &PiiRecord,
    ) -> Fallible<NewUserOutcome> {
        let op = Operation::NewUser;
        let unused = self.check_key_unused(op, key).await?;
        self.local(op, Step::ValidatePii, || pii.validate())?;
        let primary = pii.primary();
        let unmatched = match self.search_primary_pii(op, &primary).await? {
            PrimarySearch::Unmatched(unmatched) => unmatched,
            PrimarySearch::Matched(found) => {
                info!(
                    "PII already onboarded by {} ({}), redirecting",
                    found.provider_name, found.provider_url
                );
                counter!("onboarding.outcome", 1, "operation" => op.as_str(), "outcome" => "redirect");
                return Ok(NewUserOutcome::Redirect(found));
            }
        };

        let issued = self.issue_unique_id(op, &unused, unmatched, pii).await?;
        let unique_id = issued.unique_id();

        let unique_id_bytes = self
            .normalize_unique_id(op, &unique_id)
            .map_err(partial(None, Some(unique_id)))?;
        let identity = self
            .create_identity(op, unused, &issued)
            .await
            .map_err(partial(None, Some(unique_id)))?;
        let cdd_id = self
            .attest_cdd(op, &identity.id, &unique_id_bytes)
            .await
            .map_err(partial(Some(identity.id), Some(unique_id)))?;

        info!("Issued identity {} for a new person", identity.id);
        counter!("onboarding.outcome", 1, "operation" => op.as_str(), "outcome" => "issued");
        Ok(NewUserOutcome::Issued(IssuedIdentity {
            identity_id: identity.id,
            unique_id,
            cdd_id,
        }))
    }

    /// Attests a CDD claim on an identity the key already owns.
    pub async fn onboard_existing_identity(
        &self,
        key: &SigningKey,
        pii: &PiiRecord,
        unique_id: &UniqueId,
        identity_id: &IdentityId,
    ) -> Fallible<CddAttestation> {
        let op = Operation::ExistingIdentity;
        let owned = self.check_key_owns_identity(op, key, identity_id).await?;
        self.local(op, Step::ValidatePii, || pii.validate())?;
        let consistent = self.check_pii_matches_unique_id(op, pii, unique_id).await?;

        let unique_id_bytes = self.normalize_unique_id(op, &consistent.unique_id())?;
        let cdd_id = self.attest_cdd(op, &owned.0, &unique_id_bytes).await?;

        info!("Attested CDD claim on existing identity {}", owned.0);
        counter!("onboarding.outcome", 1, "operation" => op.as_str(), "outcome" => "attested");
        Ok(CddAttestation {
            identity_id: owned.0,
            cdd_id,
        })
    }

    /// Creates a new identity for a person who already holds a unique id.
    pub async fn onboard_new_identity_for_known_person(
        &self,
        key: &SigningKey,
        pii: &PiiRecord,
        unique_id: &UniqueId,
    ) -> Fallible<CddAttestation> {
        let op = Operation::NewIdentityForKnownPerson;
        let unused = self.check_key_unused(op, key).await?;
        self.local(op, Step::ValidatePii, || pii.validate())?;
        let consistent = self.check_pii_matches_unique_id(op, pii, unique_id).await?;

        let unique_id_bytes = self.normalize_unique_id(op, &consistent.unique_id())?;
        let identity = self.create_identity(op, unused, &consistent).await?;
        let cdd_id = self
            .attest_cdd(op, &identity.id, &unique_id_bytes)
            .await
            .map_err(partial(Some(identity.id), Some(*unique_id)))?;

        info!("Issued identity {} for a known person", identity.id);
        counter!("onboarding.outcome", 1, "operation" => op.as_str(), "outcome" => "issued");
        Ok(CddAttestation {
            identity_id: identity.id,
            cdd_id,
        })
    }

    /// Proves the uniqueness of the owner's identity within `scope` and submits the
    /// proof as a claim.
    ///
    /// Only the owner can do this, since the proof needs the unique id as a witness.
    pub async fn claim_investor_uniqueness(
        &self,
        owner_key: &SigningKey,
        identity_id: &IdentityId,
        unique_id: &UniqueId,
        cdd_id: &CddId,
        scope: &Scope,
    ) -> Fallible<UniquenessProof> {
        let op = Operation::InvestorUniqueness;

        let owned = self
            .check_key_owns_identity(op, owner_key, identity_id)
            .await?;
        let unique_id_bytes = self.normalize_unique_id(op, unique_id)?;

        self.local(op, Step::VerifyCommitment, || {
            let derived = self
                .primitive
                .derive(owned.0.as_ref(), unique_id_bytes.as_ref())?;
            ensure!(
                derived == *cdd_id,
                ErrorKind::CddIdMismatch {
                    expected: *cdd_id,
                    found: derived,
                }
            );
            Ok(())
        })?;

        let proof = self.local(op, Step::DeriveProof, || {
            self.primitive.derive_proof(
                owned.0.as_ref(),
                unique_id_bytes.as_ref(),
                scope.as_ref(),
                unique_id_bytes.as_ref(),
            )
        })?;

        if self.config.fee_allowance > 0 {
            let amount = self.config.fee_allowance;
            self.call(op, Step::FundFees, self.ledger.transfer(owner_key, amount))
                .await?;
        }

        let claim = Claim::InvestorUniqueness {
            scope: proof.scope,
            scope_id: proof.scope_id,
            cdd_id: *cdd_id,
            proof: proof.proof.clone(),
        };
        self.call(
            op,
            Step::AttestUniquenessClaim,
            self.ledger.add_claim(&owned.0, claim),
        )
        .await?;

        info!(
            "Attested uniqueness of {} within scope {}",
            owned.0, proof.scope
        );
        counter!("onboarding.outcome", 1, "operation" => op.as_str(), "outcome" => "attested");
        Ok(proof)
    }

    // ------------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------------

    async fn check_key_unused<'a>(
        &self,
        op: Operation,
        key: &'a SigningKey,
    ) -> Fallible<UnusedKey<'a>> {
        self.call_then(
            op,
            Step::CheckKeyUnused,
            self.ledger.identity_of(key),
            |identity| {
                ensure!(identity.is_none(), ErrorKind::KeyInUse { key: *key });
                Ok(UnusedKey(key))
            },
        )
        .await
    }

    async fn check_key_owns_identity(
        &self,
        op: Operation,
        key: &SigningKey,
        identity_id: &IdentityId,
    ) -> Fallible<OwnedIdentity> {
        self.call_then(
            op,
            Step::CheckKeyOwnsIdentity,
            self.ledger.identity_of(key),
            |identity| {
                let found = identity.map(|identity| identity.id);
                ensure!(
                    found.as_ref() == Some(identity_id),
                    ErrorKind::KeyIdentityMismatch {
                        expected: *identity_id,
                        found,
                    }
                );
                Ok(OwnedIdentity(*identity_id))
            },
        )
        .await
    }

    async fn search_primary_pii<'a>(
        &self,
        op: Operation,
        primary: &'a PiiRecord,
    ) -> Fallible<PrimarySearch<'a>> {
        let start = Instant::now();
        let result = self
            .with_timeout(Step::SearchPrimaryPii, self.registry.search_primary(primary))
            .await;
        let outcome = match &result {
            Ok(Some(_)) => StepOutcome::Redirected,
            Ok(None) => StepOutcome::Completed,
            Err(_) => StepOutcome::Failed,
        };
        self.record(op, Step::SearchPrimaryPii, outcome, start);

        Ok(match result? {
            Some(found) => PrimarySearch::Matched(found),
            None => PrimarySearch::Unmatched(UnmatchedPii(primary)),
        })
    }

    /// The first mutation of a new-user onboarding.
    async fn issue_unique_id(
        &self,
        op: Operation,
        _key: &UnusedKey<'_>,
        _unmatched: UnmatchedPii<'_>,
        pii: &PiiRecord,
    ) -> Fallible<IssuedUniqueId> {
        let unique_id = self
            .call(op, Step::IssueUniqueId, self.registry.issue_unique_id(pii))
            .await?;
        Ok(IssuedUniqueId(unique_id))
    }

    async fn check_pii_matches_unique_id(
        &self,
        op: Operation,
        pii: &PiiRecord,
        unique_id: &UniqueId,
    ) -> Fallible<ConsistentPii> {
        self.call_then(
            op,
            Step::CheckPiiMatchesUniqueId,
            self.registry.check_unique_id(pii, unique_id),
            |found| {
                ensure!(
                    found.is_some(),
                    ErrorKind::PiiUniqueIdMismatch {
                        unique_id: *unique_id
                    }
                );
                Ok(ConsistentPii(*unique_id))
            },
        )
        .await
    }

    /// Textual form to packed hex, then to the bytes fed to the primitive.
    fn normalize_unique_id(&self, op: Operation, unique_id: &UniqueId) -> Fallible<UniqueIdBytes> {
        self.local(op, Step::NormalizeUniqueId, || {
            let packed = normalize(&unique_id.to_textual())?;
            UniqueIdBytes::from_hex(&packed)
        })
    }

    async fn create_identity<P: PersonBinding>(
        &self,
        op: Operation,
        key: UnusedKey<'_>,
        _person: &P,
    ) -> Fallible<Identity> {
        self.call(op, Step::CreateIdentity, self.ledger.register_identity(key.0))
            .await
    }

    async fn attest_cdd(
        &self,
        op: Operation,
        identity_id: &IdentityId,
        unique_id: &UniqueIdBytes,
    ) -> Fallible<CddId> {
        let cdd_id = self.local(op, Step::DeriveCommitment, || {
            self.primitive
                .derive(identity_id.as_ref(), unique_id.as_ref())
        })?;
        self.call(
            op,
            Step::AttestCddClaim,
            self.ledger
                .add_claim(identity_id, Claim::CustomerDueDiligence { cdd_id }),
        )
        .await?;
        Ok(cdd_id)
    }

    // ------------------------------------------------------------------------
    // Step plumbing
    // ------------------------------------------------------------------------

    /// Runs a collaborator call under the call timeout and records the step.
    async fn call<T, F>(&self, op: Operation, step: Step, call: F) -> Fallible<T>
    where
        F: Future<Output = Fallible<T>>,
    {
        self.call_then(op, step, call, Ok).await
    }

    /// Like `call`, with `check` applied to the response before the step is recorded.
    async fn call_then<T, U, F, C>(&self, op: Operation, step: Step, call: F, check: C) -> Fallible<U>
    where
        F: Future<Output = Fallible<T>>,
        C: FnOnce(T) -> Fallible<U>,
    {
        let start = Instant::now();
        let result = self.with_timeout(step, call).await.and_then(check);
        self.record(op, step, outcome_of(&result), start);
        result
    }

    /// Runs a local computation and records the step.
    fn local<T, F>(&self, op: Operation, step: Step, f: F) -> Fallible<T>
    where
        F: FnOnce() -> Fallible<T>,
    {
        let start = Instant::now();
        let result = f();
        self.record(op, step, outcome_of(&result), start);
        result
    }

    async fn with_timeout<T, F>(&self, step: Step, call: F) -> Fallible<T>
    where
        F: Future<Output = Fallible<T>>,
    {
        match tokio::time::timeout(self.config.call_timeout(), call).await {
            Ok(result) => result,
            Err(_) => Err(ErrorKind::TransportError {
                call: step.as_str().to_string(),
                reason: format!("no response within {} ms", self.config.call_timeout_ms),
            }
            .into()),
        }
    }

    fn record(&self, op: Operation, step: Step, outcome: StepOutcome, start: Instant) {
        let end = Instant::now();
        timing!("onboarding.step", start, end, "operation" => op.as_str(), "step" => step.as_str(), "outcome" => outcome.as_str());
        if outcome == StepOutcome::Failed {
            warn!("{} failed at {}", op.as_str(), step.as_str());
        }
        self.observer.on_step(&StepEvent {
            operation: op,
            step,
            outcome,
            elapsed: end.duration_since(start),
        });
    }
}

fn outcome_of<T>(result: &Fallible<T>) -> StepOutcome {
    match result {
        Ok(_) => StepOutcome::Completed,
        Err(_) => StepOutcome::Failed,
    }
}
