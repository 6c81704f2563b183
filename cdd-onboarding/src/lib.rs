//! Customer-due-diligence onboarding.
//!
//! A CDD provider onboards a user from their signing key and a pre-hashed PII
//! record. The `OnboardingCoordinator` decides whether the user is new or
//! returning, makes sure one real person never ends up with two unique ids, and
//! attests a CDD_ID (a commitment to the identity and the person's unique id) on
//! the user's identity.
//!
//! The ledger, the uniqueness registry and the uniqueness primitive are injected
//! as trait objects. In-memory implementations of the first two are provided.
//!
//! ```
//! use cdd_onboarding::{
//!     CoordinatorConfig, ConfidentialIdentityPrimitive, InMemoryLedger, InMemoryRegistry,
//!     NewUserOutcome, OnboardingCoordinator, PiiRecordBuilder, RegistryMatch, SigningKey,
//! };
//! use std::sync::Arc;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let primitive = Arc::new(ConfidentialIdentityPrimitive);
//! let coordinator = OnboardingCoordinator::new(
//!     Arc::new(InMemoryLedger::new(primitive.clone())),
//!     Arc::new(InMemoryRegistry::new(RegistryMatch {
//!         provider_name: "Acme KYC".into(),
//!         provider_url: "https://kyc.acme.example".into(),
//!     })),
//!     primitive,
//!     CoordinatorConfig::default(),
//! );
//!
//! let pii = PiiRecordBuilder::new()
//!     .first_name("Ada")
//!     .last_name("Lovelace")
//!     .birth_date("1815-12-10")
//!     .country_code("GB")
//!     .build()
//!     .unwrap();
//!
//! let outcome = coordinator
//!     .onboard_new_user(&SigningKey::new([1u8; 32]), &pii)
//!     .await
//!     .unwrap();
//! assert!(matches!(outcome, NewUserOutcome::Issued(_)));
//! # });
//! ```

/// That `ensure` does not transform into a string representation like `failure::ensure` is doing.
#[allow(unused_macros)]
macro_rules! ensure {
    ($predicate:expr, $context_selector:expr) => {
        if !$predicate {
            return Err($context_selector.into());
        }
    };
}

/// Helper macro to assert that `predicate` is an `Error::from( $err)`.
#[allow(unused_macros)]
macro_rules! assert_err {
    ($predicate:expr, $err:expr) => {
        assert_eq!($predicate.expect_err("Error expected").kind(), &$err);
    };
}

pub mod bytes;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod ledger;
pub mod pii;
pub mod primitive;
pub mod registry;
pub mod types;
pub mod unique_id;

pub use bytes::{CddId, FixedBytes, IdentityId, Scope, ScopeId, UniqueIdBytes};
pub use config::{load_config, save_config, CoordinatorConfig};
pub use coordinator::{CddAttestation, IssuedIdentity, NewUserOutcome, OnboardingCoordinator};
pub use errors::{Error, ErrorKind, Fallible};
pub use events::{LogObserver, OnboardingObserver, Operation, Step, StepEvent, StepJournal, StepOutcome};
pub use ledger::{IdentityLedger, InMemoryLedger, LedgerCallCounts};
pub use pii::{PiiCheck, PiiPayload, PiiRecord, PiiRecordBuilder};
pub use primitive::{ConfidentialIdentityPrimitive, UniquenessPrimitive, UniquenessProof};
pub use registry::{InMemoryRegistry, MatchPolicy, RegistryCallCounts, RegistryMatch, UniquenessRegistry};
pub use types::{Balance, Claim, Identity, SigningKey};
pub use unique_id::{denormalize, normalize, UniqueId};

use log::{info, warn};
use metrics::Recorder;
use metrics_core::Key;

// -------------------------------------- Metric recording ------------------------------------------------

/// Writes every metric as a JSON-like line through `log`.
#[derive(Default)]
pub struct PrintRecorder;

impl Recorder for PrintRecorder {
    fn increment_counter(&self, key: Key, value: u64) {
        info!(
            "metrics: {{ \"counter\": {{ \"name\": \"{}\", \"value\": {} }} }}",
            key, value
        );
    }

    fn update_gauge(&self, key: Key, value: i64) {
        info!(
            "metrics: {{ \"gauge\": {{ \"name\": \"{}\", \"value\": {} }} }}",
            key, value
        );
    }

    fn record_histogram(&self, key: Key, value: u64) {
        info!(
            "metrics: {{ \"histogram\": {{ \"name\": \"{}\", \"value\": {} }} }}",
            key, value
        );
    }
}

/// Installs `PrintRecorder` as the global metrics recorder. Only the first call wins.
pub fn init_print_recorder() {
    if let Err(error) = metrics::set_boxed_recorder(Box::new(PrintRecorder::default())) {
        warn!("Metrics recorder already installed: {}", error);
    }
}
