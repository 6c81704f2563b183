//! Step events emitted by the onboarding coordinator.
//!
//! Every step of an operation ends with one `StepEvent`, handed to the configured
//! `OnboardingObserver` and recorded as a `timing!` metric.

use log::{debug, warn};
use serde::Serialize;
use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    NewUser,
    ExistingIdentity,
    NewIdentityForKnownPerson,
    InvestorUniqueness,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::NewUser => "new_user",
            Operation::ExistingIdentity => "existing_identity",
            Operation::NewIdentityForKnownPerson => "new_identity_for_known_person",
            Operation::InvestorUniqueness => "investor_uniqueness",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    CheckKeyUnused,
    CheckKeyOwnsIdentity,
    ValidatePii,
    SearchPrimaryPii,
    IssueUniqueId,
    CheckPiiMatchesUniqueId,
    NormalizeUniqueId,
    CreateIdentity,
    DeriveCommitment,
    VerifyCommitment,
    DeriveProof,
    FundFees,
    AttestCddClaim,
    AttestUniquenessClaim,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::CheckKeyUnused => "check_key_unused",
            Step::CheckKeyOwnsIdentity => "check_key_owns_identity",
            Step::ValidatePii => "validate_pii",
            Step::SearchPrimaryPii => "search_primary_pii",
            Step::IssueUniqueId => "issue_unique_id",
            Step::CheckPiiMatchesUniqueId => "check_pii_matches_unique_id",
            Step::NormalizeUniqueId => "normalize_unique_id",
            Step::CreateIdentity => "create_identity",
            Step::DeriveCommitment => "derive_commitment",
            Step::VerifyCommitment => "verify_commitment",
            Step::DeriveProof => "derive_proof",
            Step::FundFees => "fund_fees",
            Step::AttestCddClaim => "attest_cdd_claim",
            Step::AttestUniquenessClaim => "attest_uniqueness_claim",
        }
    }

    /// Steps that change ledger or registry state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Step::IssueUniqueId
                | Step::CreateIdentity
                | Step::FundFees
                | Step::AttestCddClaim
                | Step::AttestUniquenessClaim
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Completed,
    /// The PII is on record with some provider; the operation stops here.
    Redirected,
    Failed,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepOutcome::Completed => "completed",
            StepOutcome::Redirected => "redirected",
            StepOutcome::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepEvent {
    pub operation: Operation,
    pub step: Step,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

pub trait OnboardingObserver: Send + Sync {
    fn on_step(&self, event: &StepEvent);
}

/// Writes each event as a JSON line through `log`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl OnboardingObserver for LogObserver {
    fn on_step(&self, event: &StepEvent) {
        let line = serde_json::to_string(event).unwrap_or_else(|_| format!("{:?}", event));
        match event.outcome {
            StepOutcome::Failed => warn!("step: {}", line),
            _ => debug!("step: {}", line),
        }
    }
}

/// Keeps every event in memory, in order.
#[derive(Debug, Default)]
pub struct StepJournal {
    events: Mutex<Vec<StepEvent>>,
}

impl StepJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<StepEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The steps of `operation`, in order.
    pub fn steps(&self, operation: Operation) -> Vec<Step> {
        self.events()
            .into_iter()
            .filter(|event| event.operation == operation)
            .map(|event| event.step)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl OnboardingObserver for StepJournal {
    fn on_step(&self, event: &StepEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
