//! Schnorr signatures over a caller-chosen base point.
//!
//! A scope claim is signed with the investor's unique id as the secret key and
//! `H(scope_did)` as the base point, so the public key of the signature is the
//! SCOPE_ID itself. A valid signature shows that the SCOPE_ID is wellformed.
//!
//! Signing is deterministic: the nonce is derived from the secret key and the message.

use crate::{
    codec_wrapper::{
        CompressedRistrettoDecoder, CompressedRistrettoEncoder, ScalarDecoder, ScalarEncoder,
    },
    errors::{ErrorKind, Fallible},
};
use codec::{Decode, Encode, Error as CodecError, Input, Output};
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_512};
use zeroize::Zeroize;

/// A Schnorr secret key. Overwritten with zeroes when dropped.
pub struct SecretKey {
    pub(crate) key: Scalar,
    pub(crate) nonce: [u8; 32],
}

impl SecretKey {
    /// The signing nonce seed is the upper half of `Sha3_512(key)`.
    pub fn new(key: Scalar) -> Self {
        let digest = Sha3_512::default().chain(key.as_bytes()).finalize();

        let mut nonce = [0u8; 32];
        nonce.copy_from_slice(&digest[32..]);

        Self { key, nonce }
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce.zeroize();
    }
}

/// A Schnorr public key.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PublicKey {
    pub(crate) key: RistrettoPoint,
}

impl PublicKey {
    pub fn new(key: RistrettoPoint) -> Self {
        Self { key }
    }
}

/// Stores the Schnorr signature for verifying the wellformedness of scope_id.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[allow(non_snake_case)]
pub struct Signature {
    pub(crate) R: CompressedRistretto,
    pub(crate) s: Scalar,
}

impl Encode for Signature {
    #[inline]
    fn size_hint(&self) -> usize {
        CompressedRistrettoEncoder(&self.R).size_hint() + ScalarEncoder(&self.s).size_hint()
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        CompressedRistrettoEncoder(&self.R).encode_to(dest);
        ScalarEncoder(&self.s).encode_to(dest);
    }
}

impl Decode for Signature {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let r_decoder = <CompressedRistrettoDecoder>::decode(input)?;
        let s_decoder = <ScalarDecoder>::decode(input)?;

        Ok(Self {
            R: r_decoder.0,
            s: s_decoder.0,
        })
    }
}

/// `k = H(R || A || message)`.
fn challenge(r: &CompressedRistretto, public_key: &RistrettoPoint, message: &[u8]) -> Scalar {
    Scalar::from_hash(
        Sha3_512::default()
            .chain(r.as_bytes())
            .chain(public_key.compress().as_bytes())
            .chain(message),
    )
}

impl SecretKey {
    /// Signs `message` with `base_point` as the generator.
    #[allow(non_snake_case)]
    pub fn sign(
        &self,
        message: &[u8],
        public_key: &PublicKey,
        base_point: &RistrettoPoint,
    ) -> Signature {
        let r = Scalar::from_hash(Sha3_512::default().chain(&self.nonce).chain(message));
        let R = (r * base_point).compress();

        let k = challenge(&R, &public_key.key, message);
        let s = (k * self.key) + r;

        Signature { R, s }
    }
}

impl PublicKey {
    /// Verify a signature on a message with this public key.
    ///
    /// # Errors
    /// * `SignatureError` if `s * base_point - k * A != R`.
    #[allow(non_snake_case)]
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Signature,
        base_point: &RistrettoPoint,
    ) -> Fallible<()> {
        let k = challenge(&signature.R, &self.key, message);
        let R = signature.s * base_point - k * self.key;

        ensure!(R.compress() == signature.R, ErrorKind::SignatureError);

        Ok(())
    }
}
