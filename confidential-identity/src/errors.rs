use std::{fmt, result::Result};

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl From<ErrorKind> for Error {
    #[inline]
    fn from(kind: ErrorKind) -> Error {
        Error { kind }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ErrorKind::*;
        match &self.kind {
            ZkpError => {
                write!(
                    f,
                    "Scope claim does not match cdd claim: Zero Knowledge Proof failed."
                )
            }
            SignatureError => {
                write!(
                    f,
                    "Scope id is not wellformed: signature verification failed."
                )
            }
            UniqueIdMismatch => {
                write!(
                    f,
                    "The cdd claim and the scope claim carry different unique ids."
                )
            }
        }
    }
}

impl std::error::Error for Error {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Scope claim does not match cdd claim: Zero Knowledge Proof failed.
    ZkpError,

    /// Scope id is not wellformed: signature verification failed.
    SignatureError,

    /// A scope claim proof was requested for a unique id other than the one committed to
    /// in the CDD_ID.
    UniqueIdMismatch,
}

pub type Fallible<T, E = Error> = Result<T, E>;
