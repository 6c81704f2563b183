//! Registry-issued unique ids and their two text encodings.
//!
//! The registry speaks the textual form, `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`
//! in lowercase. The ledger and the uniqueness primitive use the packed form, `0x`
//! followed by the same 32 hex digits without separators. Both directions only
//! accept canonical input so that converting back and forth is lossless.

use crate::{
    bytes::{UniqueIdBytes, UNIQUE_ID_LEN},
    errors::{ErrorKind, Fallible},
};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};
use uuid::Uuid;

#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct UniqueId(Uuid);

impl UniqueId {
    pub fn from_bytes(bytes: [u8; UNIQUE_ID_LEN]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; UNIQUE_ID_LEN] {
        self.0.as_bytes()
    }

    /// Parses the canonical lowercase dash-delimited form.
    pub fn from_textual(text: &str) -> Fallible<Self> {
        let uuid = Uuid::parse_str(text).map_err(|_| invalid(text))?;
        let unique_id = Self(uuid);
        ensure!(unique_id.to_textual() == text, invalid(text));
        Ok(unique_id)
    }

    pub fn to_textual(&self) -> String {
        self.0.hyphenated().to_string()
    }

    /// Parses `0x` followed by 32 lowercase hex digits.
    pub fn from_packed_hex(text: &str) -> Fallible<Self> {
        let bytes = UniqueIdBytes::from_hex(text).map_err(|_| invalid(text))?;
        let unique_id = Self::from_bytes(bytes.to_bytes());
        ensure!(unique_id.to_packed_hex() == text, invalid(text));
        Ok(unique_id)
    }

    pub fn to_packed_hex(&self) -> String {
        self.to_packed().to_hex()
    }

    pub fn to_packed(&self) -> UniqueIdBytes {
        UniqueIdBytes::new(*self.as_bytes())
    }
}

fn invalid(text: &str) -> ErrorKind {
    ErrorKind::InvalidUniqueId {
        input: text.to_string(),
    }
}

/// Textual unique id to packed hex.
pub fn normalize(textual: &str) -> Fallible<String> {
    Ok(UniqueId::from_textual(textual)?.to_packed_hex())
}

/// Packed hex unique id to its textual form.
pub fn denormalize(packed: &str) -> Fallible<String> {
    Ok(UniqueId::from_packed_hex(packed)?.to_textual())
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "UniqueId({})", self.0.hyphenated())
    }
}

impl FromStr for UniqueId {
    type Err = crate::errors::Error;

    fn from_str(text: &str) -> Fallible<Self> {
        Self::from_textual(text)
    }
}

impl Serialize for UniqueId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_textual())
    }
}

impl<'de> Deserialize<'de> for UniqueId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_textual(&text).map_err(D::Error::custom)
    }
}
