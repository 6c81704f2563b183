use failure::Fail;

/// Errors of the onboarding demo.
#[derive(Fail, Debug)]
pub enum Error {
    /// There was an error in converting the seed from base64 to byte array.
    #[fail(display = "Error in decoding the seed value: {:?}", error)]
    SeedDecodeError { error: base64::DecodeError },

    /// The length of the provided seed was not equal to 32 bytes.
    #[fail(display = "Want seed length 32, got len: {:?}", length)]
    SeedLengthError { length: usize },

    /// A scenario ended with a result of the wrong shape.
    #[fail(
        display = "Scenario {:?} expected {}, got {}",
        scenario, expected, found
    )]
    UnexpectedOutcome {
        scenario: &'static str,
        expected: &'static str,
        found: String,
    },

    /// An error occurred during the call to the onboarding library.
    #[fail(display = "An error occurred in the underlying library: {}", error)]
    LibraryError { error: cdd_onboarding::Error },
}

impl From<cdd_onboarding::Error> for Error {
    fn from(error: cdd_onboarding::Error) -> Self {
        Error::LibraryError { error }
    }
}
