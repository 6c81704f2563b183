//! Typed adapter over the uniqueness primitive of `confidential_identity`.
//!
//! Inputs are raw byte slices whose widths are checked, never adjusted: an identity
//! id is 32 bytes, a unique id 16 bytes and a scope 12 bytes. Callers pad short
//! values with `FixedBytes::padded` before calling. All operations are pure and
//! deterministic.

use crate::{
    bytes::{CddId, FixedBytes, IdentityId, Scope, ScopeId, UniqueIdBytes},
    errors::{ErrorKind, Fallible},
};
use codec::{Decode, Encode};
use confidential_identity::{
    claim_proofs::{slice_to_scalar, Investor, Provider, Verifier},
    CddClaimData, CddId as CddCommitment, InvestorTrait, ProviderTrait, ScopeClaimData,
    ScopeClaimProof, VerifierTrait,
};
use serde::{Deserialize, Serialize};

/// A scoped uniqueness proof, ready to be submitted as a claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniquenessProof {
    pub scope: Scope,
    pub scope_id: ScopeId,
    #[serde(with = "crate::bytes::hex_bytes")]
    pub proof: Vec<u8>,
}

pub trait UniquenessPrimitive: Send + Sync {
    /// `CDD_ID = Derive(identity_id, unique_id)`.
    fn derive(&self, identity_id: &[u8], unique_id: &[u8]) -> Fallible<CddId>;

    /// Derives a proof that the SCOPE_ID of `scope_unique_id` under `scope` matches the
    /// CDD_ID of `(identity_id, cdd_unique_id)`.
    fn derive_proof(
        &self,
        identity_id: &[u8],
        cdd_unique_id: &[u8],
        scope: &[u8],
        scope_unique_id: &[u8],
    ) -> Fallible<UniquenessProof>;

    /// Checks `proof` against the CDD_ID attested on `identity_id`.
    fn verify_proof(
        &self,
        identity_id: &IdentityId,
        cdd_id: &CddId,
        proof: &UniquenessProof,
    ) -> Fallible<()>;
}

/// The Pedersen commitment and scope claim proofs of `confidential_identity`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfidentialIdentityPrimitive;

impl UniquenessPrimitive for ConfidentialIdentityPrimitive {
    fn derive(&self, identity_id: &[u8], unique_id: &[u8]) -> Fallible<CddId> {
        let identity_id = IdentityId::from_slice(identity_id)?;
        let unique_id = UniqueIdBytes::from_slice(unique_id)?;

        let cdd_claim = CddClaimData::new(identity_id.as_ref(), unique_id.as_ref());
        Ok(CddId::new(Provider::create_cdd_id(&cdd_claim).to_bytes()))
    }

    fn derive_proof(
        &self,
        identity_id: &[u8],
        cdd_unique_id: &[u8],
        scope: &[u8],
        scope_unique_id: &[u8],
    ) -> Fallible<UniquenessProof> {
        let identity_id = IdentityId::from_slice(identity_id)?;
        let cdd_unique_id = UniqueIdBytes::from_slice(cdd_unique_id)?;
        let scope = Scope::from_slice(scope)?;
        let scope_unique_id = UniqueIdBytes::from_slice(scope_unique_id)?;

        let cdd_claim = CddClaimData::new(identity_id.as_ref(), cdd_unique_id.as_ref());
        let scope_claim = ScopeClaimData::new(scope.as_ref(), scope_unique_id.as_ref());
        let proof = Investor::create_scope_claim_proof(&cdd_claim, &scope_claim).map_err(
            |error| ErrorKind::PrimitiveError {
                reason: error.to_string(),
            },
        )?;

        Ok(UniquenessProof {
            scope,
            scope_id: ScopeId::new(proof.scope_id().compress().to_bytes()),
            proof: proof.encode(),
        })
    }

    fn verify_proof(
        &self,
        identity_id: &IdentityId,
        cdd_id: &CddId,
        proof: &UniquenessProof,
    ) -> Fallible<()> {
        let rejected = |reason: String| ErrorKind::ClaimRejected { reason };

        let cdd_commitment = CddCommitment::decode(&mut &cdd_id.as_bytes()[..])
            .map_err(|error| rejected(format!("malformed CDD_ID: {}", error)))?;
        let scope_proof = ScopeClaimProof::decode(&mut &proof.proof[..])
            .map_err(|error| rejected(format!("malformed proof: {}", error)))?;
        let proven_scope_id: ScopeId = FixedBytes::new(scope_proof.scope_id().compress().to_bytes());
        ensure!(
            proven_scope_id == proof.scope_id,
            rejected(format!(
                "proof is for SCOPE_ID {}, not {}",
                proven_scope_id, proof.scope_id
            ))
        );

        Verifier::verify_scope_claim_proof(
            &scope_proof,
            &slice_to_scalar(identity_id.as_ref()),
            &slice_to_scalar(proof.scope.as_ref()),
            &cdd_commitment,
        )
        .map_err(|error| rejected(error.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DID: [u8; 32] = [1u8; 32];
    const OTHER_DID: [u8; 32] = [2u8; 32];
    const UID: [u8; 16] = [3u8; 16];
    const OTHER_UID: [u8; 16] = [4u8; 16];

    fn scope() -> Scope {
        Scope::padded(b"ACME").unwrap()
    }

    #[test]
    fn derive_is_deterministic() {
        let primitive = ConfidentialIdentityPrimitive;
        let first = primitive.derive(&DID, &UID).unwrap();
        assert_eq!(first, primitive.derive(&DID, &UID).unwrap());
        assert_ne!(first, primitive.derive(&DID, &OTHER_UID).unwrap());
        assert_ne!(first, primitive.derive(&OTHER_DID, &UID).unwrap());
    }

    #[test]
    fn reject_wrong_widths() {
        let primitive = ConfidentialIdentityPrimitive;
        assert_err!(
            primitive.derive(&DID[..31], &UID),
            ErrorKind::WidthMismatch {
                expected: 32,
                found: 31
            }
        );
        assert_err!(
            primitive.derive(&[1u8; 33], &UID),
            ErrorKind::WidthMismatch {
                expected: 32,
                found: 33
            }
        );
        assert_err!(
            primitive.derive(&DID, &UID[..15]),
            ErrorKind::WidthMismatch {
                expected: 16,
                found: 15
            }
        );
        assert_err!(
            primitive.derive_proof(&DID, &UID, b"ACME", &UID),
            ErrorKind::WidthMismatch {
                expected: 12,
                found: 4
            }
        );
    }

    #[test]
    fn derived_proofs_verify() {
        let primitive = ConfidentialIdentityPrimitive;
        let identity_id = IdentityId::new(DID);
        let cdd_id = primitive.derive(&DID, &UID).unwrap();

        let proof = primitive
            .derive_proof(&DID, &UID, scope().as_ref(), &UID)
            .unwrap();
        assert_eq!(proof.scope, scope());
        assert_eq!(
            proof,
            primitive
                .derive_proof(&DID, &UID, scope().as_ref(), &UID)
                .unwrap()
        );
        assert!(primitive.verify_proof(&identity_id, &cdd_id, &proof).is_ok());

        // Same person, another identity: same SCOPE_ID.
        let other = primitive
            .derive_proof(&OTHER_DID, &UID, scope().as_ref(), &UID)
            .unwrap();
        assert_eq!(other.scope_id, proof.scope_id);
    }

    #[test]
    fn reject_inconsistent_proofs() {
        let primitive = ConfidentialIdentityPrimitive;
        let identity_id = IdentityId::new(DID);
        let cdd_id = primitive.derive(&DID, &UID).unwrap();
        let proof = primitive
            .derive_proof(&DID, &UID, scope().as_ref(), &UID)
            .unwrap();

        assert!(primitive
            .derive_proof(&DID, &UID, scope().as_ref(), &OTHER_UID)
            .is_err());

        let other_cdd_id = primitive.derive(&DID, &OTHER_UID).unwrap();
        assert!(primitive
            .verify_proof(&identity_id, &other_cdd_id, &proof)
            .is_err());
        assert!(primitive
            .verify_proof(&IdentityId::new(OTHER_DID), &cdd_id, &proof)
            .is_err());

        let mut relabeled = proof.clone();
        relabeled.scope = Scope::padded(b"OTHER").unwrap();
        assert!(primitive.verify_proof(&identity_id, &cdd_id, &relabeled).is_err());

        let mut truncated = proof;
        truncated.proof.truncate(100);
        assert!(primitive.verify_proof(&identity_id, &cdd_id, &truncated).is_err());
    }
}
