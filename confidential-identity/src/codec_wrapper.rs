//! SCALE codec support for the dalek types that travel inside claims and proofs.

use codec::{Decode, Encode, Error as CodecError, Input, Output};
use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};

/// A serialized Ristretto point size.
pub const RISTRETTO_POINT_SIZE: usize = 32;

/// A serialized Scalar size.
pub const SCALAR_SIZE: usize = 32;

/// Adds support to `Encode` of SCALE codec to `RistrettoPoint` type.
pub struct RistrettoPointEncoder<'a>(pub &'a RistrettoPoint);

impl<'a> Encode for RistrettoPointEncoder<'a> {
    #[inline]
    fn size_hint(&self) -> usize {
        RISTRETTO_POINT_SIZE
    }

    /// Compresses the `RistrettoPoint` and encodes it as an array of bytes.
    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        self.0.compress().as_bytes().encode_to(dest);
    }
}

/// Adds support to `Decode` of SCALE codec's to `RistrettoPoint` type.
pub struct RistrettoPointDecoder(pub RistrettoPoint);

impl Decode for RistrettoPointDecoder {
    /// Decodes a compressed `RistrettoPoint` from an array of bytes.
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let id = <[u8; RISTRETTO_POINT_SIZE]>::decode(input)?;
        let inner = CompressedRistretto(id)
            .decompress()
            .ok_or_else(|| CodecError::from("Invalid compressed `RistrettoPoint`."))?;

        Ok(Self(inner))
    }
}

/// Adds support to `Encode` of SCALE codec to `CompressedRistretto` type.
pub struct CompressedRistrettoEncoder<'a>(pub &'a CompressedRistretto);

impl<'a> Encode for CompressedRistrettoEncoder<'a> {
    #[inline]
    fn size_hint(&self) -> usize {
        RISTRETTO_POINT_SIZE
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        self.0.as_bytes().encode_to(dest);
    }
}

/// Adds support to `Decode` of SCALE codec's to `CompressedRistretto` type.
/// Rejects byte strings that are not a valid point encoding.
pub struct CompressedRistrettoDecoder(pub CompressedRistretto);

impl Decode for CompressedRistrettoDecoder {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let id = <[u8; RISTRETTO_POINT_SIZE]>::decode(input)?;
        let inner = CompressedRistretto(id);

        let _ = inner
            .decompress()
            .ok_or_else(|| CodecError::from("Invalid `CompressedRistretto`."))?;

        Ok(Self(inner))
    }
}

/// Adds support to `Encode` of SCALE codec to `Scalar` type.
pub struct ScalarEncoder<'a>(pub &'a Scalar);

impl<'a> Encode for ScalarEncoder<'a> {
    #[inline]
    fn size_hint(&self) -> usize {
        SCALAR_SIZE
    }

    fn encode_to<W: Output + ?Sized>(&self, dest: &mut W) {
        self.0.as_bytes().encode_to(dest);
    }
}

/// Adds support to `Decode` of SCALE codec's to `Scalar` type.
/// Only canonical scalar encodings are accepted.
pub struct ScalarDecoder(pub Scalar);

impl Decode for ScalarDecoder {
    fn decode<I: Input>(input: &mut I) -> Result<Self, CodecError> {
        let raw = <[u8; SCALAR_SIZE]>::decode(input)?;
        let inner = Scalar::from_canonical_bytes(raw)
            .ok_or_else(|| CodecError::from("Invalid non-canonical `Scalar`."))?;

        Ok(Self(inner))
    }
}
