//! The `confidential_identity` library contains the API for generating CDD_IDs
//! and scope claim proofs, and for verifying them.
//!
//! A CDD provider attests a CDD_ID on the identity of an investor. The CDD_ID is a
//! Pedersen commitment to the investor's DID and unique id, so it reveals neither.
//! An investor later proves, for a scope (e.g. an asset ticker), that the
//! SCOPE_ID they publish is derived from the unique id inside their CDD_ID.

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

pub mod claim_proofs;
pub mod codec_wrapper;
pub mod errors;
pub mod mocked;
pub mod pedersen_commitments;
pub mod sign;

pub use claim_proofs::{CddClaimData, CddId, ScopeClaimData, ScopeClaimProof};
pub use curve25519_dalek::{self, ristretto::CompressedRistretto, scalar::Scalar};
pub use errors::{Error, ErrorKind, Fallible};

pub trait ProviderTrait {
    /// Compute the CDD_ID. \
    /// CDD_ID = PedersenCommitment(INVESTOR_DID, INVESTOR_UNIQUE_ID, [INVESTOR_DID | INVESTOR_UNIQUE_ID]) \
    ///
    /// # Inputs
    /// * `cdd_claim` is the CDD claim from which to generate the CDD_ID
    ///
    /// # Output
    /// The Pedersen commitment result.
    fn create_cdd_id(cdd_claim: &CddClaimData) -> CddId;
}

pub trait InvestorTrait {
    /// Create the SCOPE_ID of `scope_claim` and prove that it is wellformed and
    /// that it matches the CDD_ID of `cdd_claim`.
    ///
    /// # Errors
    /// * `UniqueIdMismatch` if the two claims carry different unique ids.
    fn create_scope_claim_proof(
        cdd_claim: &CddClaimData,
        scope_claim: &ScopeClaimData,
    ) -> Fallible<ScopeClaimProof>;
}

pub trait VerifierTrait {
    /// Verify a scope claim proof against the public data of the claim.
    fn verify_scope_claim_proof(
        proof: &ScopeClaimProof,
        investor_did: &Scalar,
        scope_did: &Scalar,
        cdd_id: &CddId,
    ) -> Fallible<()>;
}
