//! The `claim_proofs` module contains the API for generating CDD_IDs and scope
//! claim proofs, and for verifying the proofs.
//!
//! The CDD provider uses `Provider` to compute the CDD_ID of an investor from
//! their DID and unique id, and attests that CDD_ID on chain.
//!
//! The investor uses `Investor` to prove, for a given scope, that the SCOPE_ID
//! they publish is derived from the same unique id as the CDD_ID attested on their
//! identity. Since SCOPE_ID depends only on the unique id and the scope, two
//! identities of the same person always end up with the same SCOPE_ID.
//!
//! The chain uses `Verifier` to check these proofs.
//!
//! ```
//! use confidential_identity::{
//!     claim_proofs::{Investor, Provider, Verifier},
//!     CddClaimData, InvestorTrait, ProviderTrait, ScopeClaimData, VerifierTrait,
//! };
//!
//! // Investor side:
//! let investor_did = [1u8; 32];
//! let investor_unique_id = [2u8; 16];
//! let scope_did = *b"ACME\0\0\0\0\0\0\0\0";
//!
//! let cdd_claim = CddClaimData::new(&investor_did, &investor_unique_id);
//! let scope_claim = ScopeClaimData::new(&scope_did, &investor_unique_id);
//! let proof = Investor::create_scope_claim_proof(&cdd_claim, &scope_claim).unwrap();
//!
//! // CDD provider side:
//! let cdd_id = Provider::create_cdd_id(&cdd_claim);
//!
//! // Verifier side:
//! Verifier::verify_scope_claim_proof(
//!     &proof,
//!     &cdd_claim.investor_did,
//!     &scope_claim.scope_did,
//!     &cdd_id,
//! )
//! .unwrap();
//! ```

use crate::{
    codec_wrapper::{RistrettoPointDecoder, RistrettoPointEncoder, ScalarDecoder, ScalarEncoder},
    errors::{ErrorKind, Fallible},
    pedersen_commitments::{generate_blinding_factor, generate_pedersen_commit, PedersenGenerators},
    sign::{PublicKey, SecretKey, Signature},
    InvestorTrait, ProviderTrait, VerifierTrait,
};
use codec::{Decode, Encode, Error as CodecError, Input, Output};
use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};

/// Create a scalar from a slice of data.
pub fn slice_to_scalar(data: &[u8]) -> Scalar {
    use blake2::{Blake2b512, Digest};
    let mut hash = [0u8; 64];
    hash.copy_from_slice(Blake2b512::digest(data).as_slice());
    Scalar::from_bytes_mod_order_wide(&hash)
}

/// Hash a slice of data to a Ristretto point.
pub fn slice_to_ristretto_point(data: &[u8]) -> RistrettoPoint {
    use blake2::{Blake2b512, Digest};
    let mut hash = [0u8; 64];
    hash.copy_from_slice(Blake2b512::digest(data).as_slice());
    RistrettoPoint::from_uniform_bytes(&hash)
}

/// The message signed by the SCOPE_ID wellformedness proof.
pub fn make_message(investor_did: &Scalar, scope_did: &Scalar) -> [u8; 32] {
    use blake2::{Blake2s256, Digest};
    Blake2s256::new()
        .chain_update(investor_did.as_bytes())
        .chain_update(scope_did.as_bytes())
        .finalize()
        .into()
}

/// The data needed to generate a CDD ID.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CddClaimData {
    pub investor_did: Scalar,
    pub investor_unique_id: Scalar,
}

impl CddClaimData {
    /// Create a CDD Claim Data object from slices of data.
    pub fn new(investor_did: &[u8], investor_unique_id: &[u8]) -> Self {
        CddClaimData {
            investor_did: slice_to_scalar(investor_did),
            investor_unique_id: slice_to_scalar(investor_unique_id),
        }
    }
}

impl Encode for CddClaimData {
    #[inline]
    fn size_hint(&self) -> usize {
        ScalarEncoder(&self.investor_did).size_hint()
            + ScalarEncoder(&self.investor_unique_id).size_hint()
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        ScalarEncoder(&self.investor_did).encode_to(dest);
        ScalarEncoder(&self.investor_unique_id).encode_to(dest);
    }
}

impl Decode for CddClaimData {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let investor_did = <ScalarDecoder>::decode(input)?.0;
        let investor_unique_id = <ScalarDecoder>::decode(input)?.0;

        Ok(CddClaimData {
            investor_did,
            investor_unique_id,
        })
    }
}

/// The CDD ID: a Pedersen commitment to the investor's DID and unique id.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CddId(pub RistrettoPoint);

impl CddId {
    /// The compressed form of the commitment, as it is attested on chain.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.compress().to_bytes()
    }
}

impl Encode for CddId {
    #[inline]
    fn size_hint(&self) -> usize {
        RistrettoPointEncoder(&self.0).size_hint()
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        RistrettoPointEncoder(&self.0).encode_to(dest);
    }
}

impl Decode for CddId {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let inner = <RistrettoPointDecoder>::decode(input)?.0;
        Ok(CddId(inner))
    }
}

/// Compute the CDD_ID. \
/// CDD_ID = PedersenCommitment(INVESTOR_DID, INVESTOR_UNIQUE_ID, [INVESTOR_DID | INVESTOR_UNIQUE_ID]) \
///
/// # Inputs
/// * `cdd_claim` is the CDD claim from which to generate the CDD_ID
///
/// # Output
/// The Pedersen commitment result.
pub fn compute_cdd_id(cdd_claim: &CddClaimData) -> CddId {
    CddId(generate_pedersen_commit(
        cdd_claim.investor_did,
        cdd_claim.investor_unique_id,
    ))
}

/// The data needed to generate a SCOPE ID.
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScopeClaimData {
    pub scope_did: Scalar,
    pub investor_unique_id: Scalar,
}

impl ScopeClaimData {
    /// Create a Scope Claim Data object from slices of data.
    pub fn new(scope_did: &[u8], investor_unique_id: &[u8]) -> Self {
        ScopeClaimData {
            scope_did: slice_to_scalar(scope_did),
            investor_unique_id: slice_to_scalar(investor_unique_id),
        }
    }
}

/// Compute the SCOPE_ID. \
/// SCOPE_ID = INVESTOR_UNIQUE_ID * Hash(SCOPE_DID)
pub fn compute_scope_id(scope_claim: &ScopeClaimData) -> RistrettoPoint {
    scope_claim.investor_unique_id * slice_to_ristretto_point(scope_claim.scope_did.as_bytes())
}

/// Proof of knowledge of `(uid, blind)` such that
/// `label_prime(CDD_ID, DID) - SCOPE_ID = uid * (G1 - Hash(SCOPE_DID)) + blind * G2`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZkProofData {
    commitment: RistrettoPoint,
    response_unique_id: Scalar,
    response_blind: Scalar,
}

impl Encode for ZkProofData {
    #[inline]
    fn size_hint(&self) -> usize {
        RistrettoPointEncoder(&self.commitment).size_hint()
            + ScalarEncoder(&self.response_unique_id).size_hint()
            + ScalarEncoder(&self.response_blind).size_hint()
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        RistrettoPointEncoder(&self.commitment).encode_to(dest);
        ScalarEncoder(&self.response_unique_id).encode_to(dest);
        ScalarEncoder(&self.response_blind).encode_to(dest);
    }
}

impl Decode for ZkProofData {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let commitment = <RistrettoPointDecoder>::decode(input)?.0;
        let response_unique_id = <ScalarDecoder>::decode(input)?.0;
        let response_blind = <ScalarDecoder>::decode(input)?.0;

        Ok(Self {
            commitment,
            response_unique_id,
            response_blind,
        })
    }
}

/// Contains the SCOPE_ID together with the proof of its wellformedness and the
/// proof that it was derived from the unique id inside the CDD_ID.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ScopeClaimProof {
    scope_id: RistrettoPoint,
    proof_scope_id_wellformed: Signature,
    proof_scope_id_cdd_id_match: ZkProofData,
}

impl ScopeClaimProof {
    pub fn scope_id(&self) -> RistrettoPoint {
        self.scope_id
    }
}

impl Encode for ScopeClaimProof {
    #[inline]
    fn size_hint(&self) -> usize {
        RistrettoPointEncoder(&self.scope_id).size_hint()
            + self.proof_scope_id_wellformed.size_hint()
            + self.proof_scope_id_cdd_id_match.size_hint()
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        RistrettoPointEncoder(&self.scope_id).encode_to(dest);
        self.proof_scope_id_wellformed.encode_to(dest);
        self.proof_scope_id_cdd_id_match.encode_to(dest);
    }
}

impl Decode for ScopeClaimProof {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let scope_id = <RistrettoPointDecoder>::decode(input)?.0;
        let proof_scope_id_wellformed = Signature::decode(input)?;
        let proof_scope_id_cdd_id_match = ZkProofData::decode(input)?;

        Ok(Self {
            scope_id,
            proof_scope_id_wellformed,
            proof_scope_id_cdd_id_match,
        })
    }
}

// -------------------------------------------------------------------------------------------
// -                                Trait Implementations                                    -
// -------------------------------------------------------------------------------------------

pub struct Provider;

impl ProviderTrait for Provider {
    fn create_cdd_id(cdd_claim: &CddClaimData) -> CddId {
        compute_cdd_id(cdd_claim)
    }
}

pub struct Investor;

impl InvestorTrait for Investor {
    fn create_scope_claim_proof(
        cdd_claim: &CddClaimData,
        scope_claim: &ScopeClaimData,
    ) -> Fallible<ScopeClaimProof> {
        ensure!(
            cdd_claim.investor_unique_id == scope_claim.investor_unique_id,
            ErrorKind::UniqueIdMismatch
        );
        let unique_id = scope_claim.investor_unique_id;
        let scope_did_hash = slice_to_ristretto_point(scope_claim.scope_did.as_bytes());
        let scope_id = compute_scope_id(scope_claim);

        let message = make_message(&cdd_claim.investor_did, &scope_claim.scope_did);
        let proof_scope_id_wellformed = SecretKey::new(unique_id).sign(
            &message,
            &PublicKey::new(scope_id),
            &scope_did_hash,
        );

        let pg = PedersenGenerators::default();
        let blind = generate_blinding_factor(cdd_claim.investor_did, unique_id);
        let cdd_id = compute_cdd_id(cdd_claim);
        let cdd_id_second_half = pg.label_prime(cdd_id.0, cdd_claim.investor_did);

        let nonce_unique_id = witness_nonce(b"unique_id", &unique_id, &blind, &scope_id, &cdd_id_second_half);
        let nonce_blind = witness_nonce(b"blind", &unique_id, &blind, &scope_id, &cdd_id_second_half);
        let commitment = nonce_unique_id * (pg.generator(1) - scope_did_hash)
            + nonce_blind * pg.generator(2);

        let c = zkp_challenge(&commitment, &scope_id, &cdd_id_second_half);

        Ok(ScopeClaimProof {
            scope_id,
            proof_scope_id_wellformed,
            proof_scope_id_cdd_id_match: ZkProofData {
                commitment,
                response_unique_id: unique_id * c + nonce_unique_id,
                response_blind: blind * c + nonce_blind,
            },
        })
    }
}

pub struct Verifier;

impl VerifierTrait for Verifier {
    fn verify_scope_claim_proof(
        proof: &ScopeClaimProof,
        investor_did: &Scalar,
        scope_did: &Scalar,
        cdd_id: &CddId,
    ) -> Fallible<()> {
        let scope_did_hash = slice_to_ristretto_point(scope_did.as_bytes());

        let message = make_message(investor_did, scope_did);
        PublicKey::new(proof.scope_id).verify(
            &message,
            &proof.proof_scope_id_wellformed,
            &scope_did_hash,
        )?;

        let pg = PedersenGenerators::default();
        let zkp = &proof.proof_scope_id_cdd_id_match;
        let cdd_id_second_half = pg.label_prime(cdd_id.0, *investor_did);
        let statement = cdd_id_second_half - proof.scope_id;

        let c = zkp_challenge(&zkp.commitment, &proof.scope_id, &cdd_id_second_half);
        let lhs = zkp.response_unique_id * (pg.generator(1) - scope_did_hash)
            + zkp.response_blind * pg.generator(2);
        let rhs = c * statement + zkp.commitment;

        ensure!(lhs == rhs, ErrorKind::ZkpError);

        Ok(())
    }
}

// -------------------------------------------------------------------------------------------
// -                                  Internal Functions                                     -
// -------------------------------------------------------------------------------------------

/// Deterministic ZKP nonce, bound to both witnesses and the statement.
fn witness_nonce(
    label: &[u8],
    unique_id: &Scalar,
    blind: &Scalar,
    scope_id: &RistrettoPoint,
    cdd_id_second_half: &RistrettoPoint,
) -> Scalar {
    Scalar::from_hash(
        Sha3_512::default()
            .chain(label)
            .chain(unique_id.as_bytes())
            .chain(blind.as_bytes())
            .chain(scope_id.compress().as_bytes())
            .chain(cdd_id_second_half.compress().as_bytes()),
    )
}

fn zkp_challenge(
    commitment: &RistrettoPoint,
    scope_id: &RistrettoPoint,
    cdd_id_second_half: &RistrettoPoint,
) -> Scalar {
    use blake2::{Blake2s256, Digest};
    let c: [u8; 32] = Blake2s256::new()
        .chain_update(commitment.compress().as_bytes())
        .chain_update(scope_id.compress().as_bytes())
        .chain_update(cdd_id_second_half.compress().as_bytes())
        .finalize()
        .into();
    slice_to_scalar(&c)
}

// ------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------
