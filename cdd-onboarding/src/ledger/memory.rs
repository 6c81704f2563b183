use super::IdentityLedger;
use crate::{
    bytes::IdentityId,
    errors::{ErrorKind, Fallible},
    primitive::{UniquenessPrimitive, UniquenessProof},
    types::{Balance, Claim, Identity, SigningKey},
};
use async_trait::async_trait;
use log::{debug, info};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

/// Prefix of the identity id derivation.
const DID_DOMAIN: &[u8] = b"by_cdd";

/// Number of calls received per operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerCallCounts {
    pub identity_of: usize,
    pub register_identity: usize,
    pub add_claim: usize,
    pub transfer: usize,
    pub balance_of: usize,
}

impl LedgerCallCounts {
    /// Calls that change ledger state.
    pub fn mutations(&self) -> usize {
        self.register_identity + self.add_claim + self.transfer
    }
}

#[derive(Default)]
struct Calls {
    identity_of: AtomicUsize,
    register_identity: AtomicUsize,
    add_claim: AtomicUsize,
    transfer: AtomicUsize,
    balance_of: AtomicUsize,
}

#[derive(Default)]
struct LedgerState {
    identities: HashMap<IdentityId, Identity>,
    keys: HashMap<SigningKey, IdentityId>,
    balances: HashMap<SigningKey, Balance>,
    nonce: u64,
}

/// A single-process identity ledger.
///
/// Uniqueness claims are checked the way a chain would check them: the CDD_ID must
/// already be attested on the identity and the proof must verify.
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
    primitive: Arc<dyn UniquenessPrimitive>,
    calls: Calls,
    latency: Option<Duration>,
    fail_next_claim: AtomicBool,
}

impl InMemoryLedger {
    pub fn new(primitive: Arc<dyn UniquenessPrimitive>) -> Self {
        Self {
            state: Mutex::new(LedgerState::default()),
            primitive,
            calls: Calls::default(),
            latency: None,
            fail_next_claim: AtomicBool::new(false),
        }
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next `add_claim` fail with a transport error.
    pub fn fail_next_claim(&self) {
        self.fail_next_claim.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> LedgerCallCounts {
        LedgerCallCounts {
            identity_of: self.calls.identity_of.load(Ordering::SeqCst),
            register_identity: self.calls.register_identity.load(Ordering::SeqCst),
            add_claim: self.calls.add_claim.load(Ordering::SeqCst),
            transfer: self.calls.transfer.load(Ordering::SeqCst),
            balance_of: self.calls.balance_of.load(Ordering::SeqCst),
        }
    }

    pub fn identity(&self, identity_id: &IdentityId) -> Option<Identity> {
        self.state().identities.get(identity_id).cloned()
    }

    pub fn identity_count(&self) -> usize {
        self.state().identities.len()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn check_uniqueness_claim(&self, identity: &Identity, claim: &Claim) -> Fallible<()> {
        if let Claim::InvestorUniqueness {
            scope,
            scope_id,
            cdd_id,
            proof,
        } = claim
        {
            ensure!(
                identity.has_cdd_claim(cdd_id),
                ErrorKind::ClaimRejected {
                    reason: format!("CDD_ID {} is not attested on {}", cdd_id, identity.id)
                }
            );
            let proof = UniquenessProof {
                scope: *scope,
                scope_id: *scope_id,
                proof: proof.clone(),
            };
            self.primitive.verify_proof(&identity.id, cdd_id, &proof)?;
        }
        Ok(())
    }
}

fn derive_identity_id(key: &SigningKey, nonce: u64) -> IdentityId {
    use blake2::{digest::consts::U32, Blake2b, Digest};

    let hash = Blake2b::<U32>::new()
        .chain_update(DID_DOMAIN)
        .chain_update(key.as_bytes())
        .chain_update(nonce.to_le_bytes())
        .finalize();
    let mut id = [0u8; 32];
    id.copy_from_slice(hash.as_slice());
    IdentityId::new(id)
}

#[async_trait]
impl IdentityLedger for InMemoryLedger {
    async fn identity_of(&self, key: &SigningKey) -> Fallible<Option<Identity>> {
        self.enter(&self.calls.identity_of).await;

        let state = self.state();
        Ok(state
            .keys
            .get(key)
            .and_then(|identity_id| state.identities.get(identity_id))
            .cloned())
    }

    async fn register_identity(&self, key: &SigningKey) -> Fallible<Identity> {
        self.enter(&self.calls.register_identity).await;

        let mut state = self.state();
        ensure!(
            !state.keys.contains_key(key),
            ErrorKind::KeyInUse { key: *key }
        );

        let identity_id = derive_identity_id(key, state.nonce);
        state.nonce += 1;

        let identity = Identity::new(identity_id, *key);
        state.keys.insert(*key, identity_id);
        state.identities.insert(identity_id, identity.clone());
        info!("Registered identity {} for key {}", identity_id, key);

        Ok(identity)
    }

    async fn add_claim(&self, identity_id: &IdentityId, claim: Claim) -> Fallible<()> {
        self.enter(&self.calls.add_claim).await;

        if self.fail_next_claim.swap(false, Ordering::SeqCst) {
            return Err(ErrorKind::TransportError {
                call: "add_claim".into(),
                reason: "connection reset".into(),
            }
            .into());
        }

        let mut state = self.state();
        let identity = state
            .identities
            .get_mut(identity_id)
            .ok_or(ErrorKind::UnknownIdentity {
                identity_id: *identity_id,
            })?;

        if identity.claims.contains(&claim) {
            debug!("Claim {} already on {}", claim.kind(), identity_id);
            return Ok(());
        }
        self.check_uniqueness_claim(identity, &claim)?;

        info!("Added {} claim to {}", claim.kind(), identity_id);
        identity.claims.push(claim);
        Ok(())
    }

    async fn transfer(&self, to: &SigningKey, amount: Balance) -> Fallible<()> {
        self.enter(&self.calls.transfer).await;

        let mut state = self.state();
        let balance = state.balances.entry(*to).or_insert(0);
        *balance = balance.saturating_add(amount);
        debug!("Transferred {} to {}", amount, to);
        Ok(())
    }

    async fn balance_of(&self, key: &SigningKey) -> Fallible<Balance> {
        self.enter(&self.calls.balance_of).await;
        Ok(self.state().balances.get(key).copied().unwrap_or(0))
    }
}
