//! Fixed-width byte buffers with validated `0x` hex text forms.
//!
//! Every identifier that crosses the protocol boundary (identity ids, CDD_IDs,
//! SCOPE_IDs, scopes) is one of these. Widths are never adjusted implicitly:
//! `from_slice` rejects anything that is not exactly `N` bytes, and right padding
//! is only applied when the caller asks for it with `padded`.

use crate::errors::{ErrorKind, Fallible};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{convert::TryInto, fmt, str::FromStr};

pub const IDENTITY_ID_LEN: usize = 32;
pub const CDD_ID_LEN: usize = 32;
pub const SCOPE_ID_LEN: usize = 32;
pub const SCOPE_LEN: usize = 12;
pub const UNIQUE_ID_LEN: usize = 16;

/// The `0x` marker of the hex text form.
pub const HEX_PREFIX: &str = "0x";

#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixedBytes<const N: usize>([u8; N]);

/// Ledger-native identifier of an identity (DID).
pub type IdentityId = FixedBytes<IDENTITY_ID_LEN>;
/// Compressed uniqueness commitment.
pub type CddId = FixedBytes<CDD_ID_LEN>;
/// Compressed SCOPE_ID.
pub type ScopeId = FixedBytes<SCOPE_ID_LEN>;
/// Scope value a uniqueness proof is bound to, e.g. a ticker.
pub type Scope = FixedBytes<SCOPE_LEN>;
/// The packed form of a unique id, as fed to the uniqueness primitive.
pub type UniqueIdBytes = FixedBytes<UNIQUE_ID_LEN>;

impl<const N: usize> FixedBytes<N> {
    pub const WIDTH: usize = N;

    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; N])
    }

    /// Takes exactly `N` bytes.
    ///
    /// # Errors
    /// * `WidthMismatch` if `bytes` is shorter or longer than `N`.
    pub fn from_slice(bytes: &[u8]) -> Fallible<Self> {
        let inner: [u8; N] = bytes.try_into().map_err(|_| ErrorKind::WidthMismatch {
            expected: N,
            found: bytes.len(),
        })?;
        Ok(Self(inner))
    }

    /// Right-pads `bytes` with zeros up to `N`.
    ///
    /// # Errors
    /// * `WidthMismatch` if `bytes` is longer than `N`.
    pub fn padded(bytes: &[u8]) -> Fallible<Self> {
        ensure!(
            bytes.len() <= N,
            ErrorKind::WidthMismatch {
                expected: N,
                found: bytes.len(),
            }
        );
        let mut inner = [0u8; N];
        inner[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(inner))
    }

    /// Parses `0x` followed by exactly `2 * N` hex digits.
    pub fn from_hex(text: &str) -> Fallible<Self> {
        let invalid = || ErrorKind::InvalidHex {
            input: text.to_string(),
        };
        let digits = text.strip_prefix(HEX_PREFIX).ok_or_else(invalid)?;

        let mut inner = [0u8; N];
        hex::decode_to_slice(digits, &mut inner).map_err(|_| invalid())?;
        Ok(Self(inner))
    }

    /// Lowercase `0x` hex.
    pub fn to_hex(&self) -> String {
        format!("{}{}", HEX_PREFIX, hex::encode(self.0))
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; N] {
        self.0
    }
}

impl<const N: usize> From<[u8; N]> for FixedBytes<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self(bytes)
    }
}

impl<const N: usize> AsRef<[u8]> for FixedBytes<N> {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> fmt::Display for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> fmt::Debug for FixedBytes<N> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> FromStr for FixedBytes<N> {
    type Err = crate::errors::Error;

    fn from_str(text: &str) -> Fallible<Self> {
        Self::from_hex(text)
    }
}

impl<const N: usize> Serialize for FixedBytes<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de, const N: usize> Deserialize<'de> for FixedBytes<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(D::Error::custom)
    }
}

/// Serde helper for variable-length byte strings in `0x` hex form.
pub mod hex_bytes {
    use super::HEX_PREFIX;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}{}", HEX_PREFIX, hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text
            .strip_prefix(HEX_PREFIX)
            .ok_or_else(|| D::Error::custom(format!("missing {} prefix", HEX_PREFIX)))?;
        hex::decode(digits).map_err(D::Error::custom)
    }
}
