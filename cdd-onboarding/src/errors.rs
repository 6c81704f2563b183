use crate::{bytes::IdentityId, types::SigningKey, unique_id::UniqueId, CddId};
use failure::{Backtrace, Context, Fail};

use std::{fmt, result::Result};

/// Represents onboarding errors.
#[derive(Debug)]
pub struct Error {
    inner: Context<ErrorKind>,
}

impl Error {
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        self.inner.get_context()
    }

    /// Transport errors are the only ones worth retrying as-is.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransportError { .. })
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Context::new(kind),
        }
    }
}

impl From<Context<ErrorKind>> for Error {
    #[inline]
    fn from(inner: Context<ErrorKind>) -> Error {
        Error { inner }
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.inner.cause()
    }

    #[inline]
    fn backtrace(&self) -> Option<&Backtrace> {
        self.inner.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

#[derive(Fail, Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The signing key already resolves to an identity.
    #[fail(display = "Signing key {} is already linked to an identity", key)]
    KeyInUse { key: SigningKey },

    /// The signing key resolves to a different identity than the claimed one.
    #[fail(
        display = "Signing key resolves to {:?} instead of identity {}",
        found, expected
    )]
    KeyIdentityMismatch {
        expected: IdentityId,
        found: Option<IdentityId>,
    },

    /// The registry reports that the PII does not correspond to the unique id.
    #[fail(display = "The PII record does not belong to unique id {}", unique_id)]
    PiiUniqueIdMismatch { unique_id: UniqueId },

    /// A ledger or registry call failed or timed out. Retryable.
    #[fail(display = "Transport error during {}: {}", call, reason)]
    TransportError { call: String, reason: String },

    /// State was mutated but a later step failed. Only the attestation needs a retry.
    #[fail(
        display = "Partial attestation failure (identity: {:?}, unique id: {:?}): {}",
        identity_id, unique_id, cause
    )]
    PartialAttestationFailure {
        identity_id: Option<IdentityId>,
        unique_id: Option<UniqueId>,
        cause: Box<ErrorKind>,
    },

    /// The ledger refused to attach a claim.
    #[fail(display = "Claim rejected: {}", reason)]
    ClaimRejected { reason: String },

    /// The ledger has no identity with this id.
    #[fail(display = "Unknown identity {}", identity_id)]
    UnknownIdentity { identity_id: IdentityId },

    /// The CDD_ID re-derived from the identity and unique id differs from the supplied one.
    #[fail(display = "CDD_ID mismatch: expected {}, derived {}", expected, found)]
    CddIdMismatch { expected: CddId, found: CddId },

    /// Malformed `0x` hex text.
    #[fail(display = "Invalid hex string {:?}", input)]
    InvalidHex { input: String },

    /// A byte sequence has the wrong width for its fixed-width type.
    #[fail(display = "Expected {} bytes, found {}", expected, found)]
    WidthMismatch { expected: usize, found: usize },

    /// Not a canonical textual or packed unique id.
    #[fail(display = "Invalid unique id {:?}", input)]
    InvalidUniqueId { input: String },

    /// The PII record is empty or malformed.
    #[fail(display = "Invalid PII record: {}", reason)]
    InvalidPii { reason: String },

    /// An error from the uniqueness primitive.
    #[fail(display = "Uniqueness primitive error: {}", reason)]
    PrimitiveError { reason: String },

    /// An error occurred while reading the configuration file.
    #[fail(display = "Failed to read the config file {:?}: {}", path, reason)]
    ConfigReadError { path: String, reason: String },

    /// An error occurred while parsing or writing the configuration.
    #[fail(display = "Failed to (de)serialize the config {:?}: {}", path, reason)]
    ConfigSerializationError { path: String, reason: String },
}

pub type Fallible<T, E = Error> = Result<T, E>;
