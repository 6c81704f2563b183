//! Pedersen commitments over the Ristretto group, used to bind an identity to the
//! unique id of the person behind it.
//!
//! The whole system shares one set of three generators `G0, G1, G2`:
//! ```
//! use confidential_identity::pedersen_commitments::PedersenGenerators;
//!
//! let pg = PedersenGenerators::default();
//! ```
//!
//! A CDD_ID is the commitment
//! `CDD_ID = DID * G0 + UNIQUE_ID * G1 + BLIND * G2`, where the blinding factor is
//! itself derived from `DID` and `UNIQUE_ID`, which makes the commitment a pure
//! function of its two inputs:
//! ```
//! use curve25519_dalek::scalar::Scalar;
//! use confidential_identity::pedersen_commitments::{
//!     generate_blinding_factor, generate_pedersen_commit, PedersenGenerators,
//! };
//!
//! let did = Scalar::from(111u64);
//! let unique_id = Scalar::from(222u64);
//! let blind = generate_blinding_factor(did, unique_id);
//!
//! let pg = PedersenGenerators::default();
//! assert_eq!(
//!     generate_pedersen_commit(did, unique_id),
//!     pg.commit(&[did, unique_id, blind])
//! );
//! ```
//!
//! A verifier who knows the DID strips it from a CDD_ID with `label_prime`:
//! `label_prime(CDD_ID, DID) = CDD_ID - DID * G0`.

use curve25519_dalek::{
    constants::RISTRETTO_BASEPOINT_COMPRESSED, constants::RISTRETTO_BASEPOINT_POINT,
    ristretto::RistrettoPoint, scalar::Scalar, traits::MultiscalarMul,
};
use sha3::{Digest, Sha3_512};

/// Domain label of the generators. Changing it changes every CDD_ID ever attested.
const PEDERSEN_COMMITMENT_LABEL: &[u8; 16] = b"PolymathIdentity";
pub const PEDERSEN_COMMITMENT_NUM_GENERATORS: usize = 3;

#[derive(Debug, Copy, Clone)]
pub struct PedersenGenerators {
    /// Bases for the Pedersen commitment.
    ///
    /// G2 is the Ristretto base point. G0 is the hash of the label followed by
    /// the compressed G2, and G1 is the hash of the compressed G0.
    pub(crate) generators: [RistrettoPoint; PEDERSEN_COMMITMENT_NUM_GENERATORS],
}

impl Default for PedersenGenerators {
    fn default() -> Self {
        let mut generators = [RistrettoPoint::default(); PEDERSEN_COMMITMENT_NUM_GENERATORS];

        let mut seed = Vec::with_capacity(
            PEDERSEN_COMMITMENT_LABEL.len() + RISTRETTO_BASEPOINT_COMPRESSED.as_bytes().len(),
        );
        seed.extend_from_slice(PEDERSEN_COMMITMENT_LABEL);
        seed.extend_from_slice(RISTRETTO_BASEPOINT_COMPRESSED.as_bytes());

        for generator in generators
            .iter_mut()
            .take(PEDERSEN_COMMITMENT_NUM_GENERATORS - 1)
        {
            *generator = RistrettoPoint::hash_from_bytes::<Sha3_512>(&seed);
            seed = generator.compress().as_bytes().to_vec();
        }

        generators[PEDERSEN_COMMITMENT_NUM_GENERATORS - 1] = RISTRETTO_BASEPOINT_POINT;

        PedersenGenerators { generators }
    }
}

impl PedersenGenerators {
    /// Commit to `PEDERSEN_COMMITMENT_NUM_GENERATORS` scalars.
    pub fn commit(&self, values: &[Scalar; PEDERSEN_COMMITMENT_NUM_GENERATORS]) -> RistrettoPoint {
        RistrettoPoint::multiscalar_mul(values, &self.generators)
    }

    /// Remove the `id` component from a commitment: `label - id * G0`.
    pub fn label_prime(&self, label: RistrettoPoint, id: Scalar) -> RistrettoPoint {
        label - id * self.generators[0]
    }

    /// Returns the `index`-th generator.
    ///
    /// # Panics
    /// * if `index >= PEDERSEN_COMMITMENT_NUM_GENERATORS`.
    pub fn generator(&self, index: usize) -> RistrettoPoint {
        self.generators[index]
    }
}

/// Derives the blinding factor of a CDD_ID from its two committed values.
pub fn generate_blinding_factor(did: Scalar, unique_id: Scalar) -> Scalar {
    Scalar::from_hash(
        Sha3_512::default()
            .chain(did.as_bytes())
            .chain(unique_id.as_bytes()),
    )
}

/// `did * G0 + unique_id * G1 + generate_blinding_factor(did, unique_id) * G2`.
pub fn generate_pedersen_commit(did: Scalar, unique_id: Scalar) -> RistrettoPoint {
    let blind = generate_blinding_factor(did, unique_id);
    PedersenGenerators::default().commit(&[did, unique_id, blind])
}

// ------------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------------
