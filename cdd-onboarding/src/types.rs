use crate::bytes::{hex_bytes, CddId, FixedBytes, IdentityId, Scope, ScopeId};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Balance = u64;

/// A user's account key on the ledger.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningKey(FixedBytes<32>);

impl SigningKey {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(FixedBytes::new(bytes))
    }

    /// A throwaway key, as used by the demo.
    pub fn random<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0u8; 32];
        rng.fill_bytes(&mut bytes);
        Self::new(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

impl fmt::Display for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SigningKey({})", self.0)
    }
}

/// A statement attached to an identity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Claim {
    /// The identity passed CDD. Carries the uniqueness commitment.
    CustomerDueDiligence { cdd_id: CddId },
    /// The identity is provably unique within `scope`.
    InvestorUniqueness {
        scope: Scope,
        scope_id: ScopeId,
        cdd_id: CddId,
        #[serde(with = "hex_bytes")]
        proof: Vec<u8>,
    },
}

impl Claim {
    pub fn kind(&self) -> &'static str {
        match self {
            Claim::CustomerDueDiligence { .. } => "customer_due_diligence",
            Claim::InvestorUniqueness { .. } => "investor_uniqueness",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub primary_key: SigningKey,
    pub claims: Vec<Claim>,
}

impl Identity {
    pub fn new(id: IdentityId, primary_key: SigningKey) -> Self {
        Self {
            id,
            primary_key,
            claims: Vec::new(),
        }
    }

    pub fn has_cdd_claim(&self, cdd_id: &CddId) -> bool {
        self.claims.iter().any(|claim| {
            matches!(claim, Claim::CustomerDueDiligence { cdd_id: attested } if attested == cdd_id)
        })
    }
}
