//! Pre-hashed PII records as they are exchanged with the uniqueness registry.
//!
//! ```json
//! [ { "check_name": "BaseIndividual",
//!     "pii_payloads": [ { "payload_name": "FirstName", "payload_value": "<sha-512 hex>" } ],
//!     "secondary_pii_sets": [ [ { "payload_name": "IDType", "payload_value": "PASSPORT" } ] ] } ]
//! ```
//!
//! Records are built through `PiiRecordBuilder`, which hashes identifying attributes
//! on insertion. The country code and the document type and expiry date stay in
//! plaintext; the registry matches on them as given.

use crate::errors::{ErrorKind, Fallible};
use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

pub const BASE_INDIVIDUAL_CHECK: &str = "BaseIndividual";

pub const FIRST_NAME: &str = "FirstName";
pub const LAST_NAME: &str = "LastName";
pub const BIRTH_DATE: &str = "BirthDate";
pub const COUNTRY_CODE: &str = "CountryAlpha2";
pub const ID_TYPE: &str = "IDType";
pub const ID_NUMBER: &str = "IDNumber";
pub const ID_EXPIRY: &str = "IDExpiry";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PiiPayload {
    pub payload_name: String,
    pub payload_value: String,
}

impl PiiPayload {
    pub fn new(payload_name: &str, payload_value: String) -> Self {
        Self {
            payload_name: payload_name.to_string(),
            payload_value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiCheck {
    pub check_name: String,
    pub pii_payloads: Vec<PiiPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary_pii_sets: Vec<Vec<PiiPayload>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PiiRecord(Vec<PiiCheck>);

impl PiiRecord {
    pub fn new(checks: Vec<PiiCheck>) -> Self {
        Self(checks)
    }

    pub fn checks(&self) -> &[PiiCheck] {
        &self.0
    }

    /// A copy without the secondary attribute sets of any check.
    pub fn primary(&self) -> PiiRecord {
        PiiRecord(
            self.0
                .iter()
                .map(|check| PiiCheck {
                    check_name: check.check_name.clone(),
                    pii_payloads: check.pii_payloads.clone(),
                    secondary_pii_sets: Vec::new(),
                })
                .collect(),
        )
    }

    /// All secondary attribute sets, across checks.
    pub fn secondary_sets(&self) -> impl Iterator<Item = &Vec<PiiPayload>> {
        self.0.iter().flat_map(|check| check.secondary_pii_sets.iter())
    }

    pub fn validate(&self) -> Fallible<()> {
        ensure!(
            !self.0.is_empty(),
            ErrorKind::InvalidPii {
                reason: "the record has no checks".into()
            }
        );
        for check in &self.0 {
            ensure!(
                !check.check_name.is_empty(),
                ErrorKind::InvalidPii {
                    reason: "a check has no name".into()
                }
            );
            ensure!(
                !check.pii_payloads.is_empty(),
                ErrorKind::InvalidPii {
                    reason: format!("check {} has no primary payloads", check.check_name)
                }
            );
            let payloads = check
                .pii_payloads
                .iter()
                .chain(check.secondary_pii_sets.iter().flatten());
            for payload in payloads {
                ensure!(
                    !payload.payload_name.is_empty() && !payload.payload_value.is_empty(),
                    ErrorKind::InvalidPii {
                        reason: format!("check {} has an empty payload", check.check_name)
                    }
                );
            }
        }
        Ok(())
    }

    /// A random, valid record.
    pub fn dummy<R: RngCore>(rng: &mut R) -> PiiRecord {
        const COUNTRIES: [&str; 6] = ["CA", "US", "GB", "DE", "SG", "CH"];

        let birth_date = format!(
            "{:04}-{:02}-{:02}",
            rng.gen_range(1940..2004),
            rng.gen_range(1..13),
            rng.gen_range(1..29)
        );
        let expiry = format!(
            "{:04}-{:02}-{:02}",
            rng.gen_range(2027..2036),
            rng.gen_range(1..13),
            rng.gen_range(1..29)
        );

        PiiRecordBuilder::new()
            .first_name(&format!("first-{:016x}", rng.gen::<u64>()))
            .last_name(&format!("last-{:016x}", rng.gen::<u64>()))
            .birth_date(&birth_date)
            .country_code(COUNTRIES.choose(rng).copied().unwrap_or("CA"))
            .document("PASSPORT", &format!("P{:09}", rng.gen_range(0..1_000_000_000u32)), &expiry)
            .record()
    }
}

/// SHA-512 of a raw attribute, as lowercase hex. The input is hashed as given.
pub fn hash_attribute(raw: &str) -> String {
    hex::encode(Sha512::digest(raw.as_bytes()))
}

/// Builds a single-check record, hashing identifying attributes on insertion.
#[derive(Clone, Debug)]
pub struct PiiRecordBuilder {
    check_name: String,
    primary: Vec<PiiPayload>,
    secondary: Vec<Vec<PiiPayload>>,
}

impl Default for PiiRecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PiiRecordBuilder {
    pub fn new() -> Self {
        Self::with_check(BASE_INDIVIDUAL_CHECK)
    }

    pub fn with_check(check_name: &str) -> Self {
        Self {
            check_name: check_name.to_string(),
            primary: Vec::new(),
            secondary: Vec::new(),
        }
    }

    pub fn first_name(self, raw: &str) -> Self {
        self.hashed(FIRST_NAME, raw)
    }

    pub fn last_name(self, raw: &str) -> Self {
        self.hashed(LAST_NAME, raw)
    }

    pub fn birth_date(self, raw: &str) -> Self {
        self.hashed(BIRTH_DATE, raw)
    }

    /// ISO 3166 alpha-2, kept in plaintext.
    pub fn country_code(self, alpha2: &str) -> Self {
        self.plain(COUNTRY_CODE, &alpha2.to_uppercase())
    }

    pub fn hashed(mut self, payload_name: &str, raw: &str) -> Self {
        self.primary
            .push(PiiPayload::new(payload_name, hash_attribute(raw)));
        self
    }

    pub fn plain(mut self, payload_name: &str, value: &str) -> Self {
        self.primary
            .push(PiiPayload::new(payload_name, value.to_string()));
        self
    }

    /// Adds an identity document as a secondary set. Only the number is hashed.
    pub fn document(mut self, id_type: &str, id_number: &str, expiry: &str) -> Self {
        self.secondary.push(vec![
            PiiPayload::new(ID_TYPE, id_type.to_string()),
            PiiPayload::new(ID_NUMBER, hash_attribute(id_number)),
            PiiPayload::new(ID_EXPIRY, expiry.to_string()),
        ]);
        self
    }

    fn record(self) -> PiiRecord {
        PiiRecord(vec![PiiCheck {
            check_name: self.check_name,
            pii_payloads: self.primary,
            secondary_pii_sets: self.secondary,
        }])
    }

    pub fn build(self) -> Fallible<PiiRecord> {
        let record = self.record();
        record.validate()?;
        Ok(record)
    }
}
