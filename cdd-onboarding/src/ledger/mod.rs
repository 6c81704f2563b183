//! The identity ledger as seen by the onboarding coordinator.

mod memory;

pub use memory::{InMemoryLedger, LedgerCallCounts};

use crate::{
    bytes::IdentityId,
    errors::Fallible,
    types::{Balance, Claim, Identity, SigningKey},
};
use async_trait::async_trait;

#[async_trait]
pub trait IdentityLedger: Send + Sync {
    /// The identity `key` is linked to, if any.
    async fn identity_of(&self, key: &SigningKey) -> Fallible<Option<Identity>>;

    /// Creates an identity with `key` as its primary key.
    ///
    /// Must fail with `KeyInUse` if `key` is already linked to an identity, even if
    /// an earlier `identity_of` said otherwise.
    async fn register_identity(&self, key: &SigningKey) -> Fallible<Identity>;

    /// Attaches `claim` to the identity. Re-adding an identical claim is a no-op.
    async fn add_claim(&self, identity_id: &IdentityId, claim: Claim) -> Fallible<()>;

    /// Credits `amount` to `to`, e.g. to cover the fees of a claim it submits.
    async fn transfer(&self, to: &SigningKey, amount: Balance) -> Fallible<()>;

    async fn balance_of(&self, key: &SigningKey) -> Fallible<Balance>;
}
