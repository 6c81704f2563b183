use super::{RegistryMatch, UniquenessRegistry};
use crate::{
    errors::{ErrorKind, Fallible},
    pii::{PiiPayload, PiiRecord},
    unique_id::UniqueId,
};
use async_trait::async_trait;
use confidential_identity::mocked::make_investor_uid;
use log::{debug, info};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

/// How `check_unique_id` compares a record against the one on file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Primary attributes and unique id.
    PrimaryOnly,
    /// Additionally, one supplied secondary set must equal one on file.
    PrimaryAndSecondary,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistryCallCounts {
    pub search_primary: usize,
    pub issue_unique_id: usize,
    pub check_unique_id: usize,
}

impl RegistryCallCounts {
    pub fn total(&self) -> usize {
        self.search_primary + self.issue_unique_id + self.check_unique_id
    }
}

#[derive(Default)]
struct Calls {
    search_primary: AtomicUsize,
    issue_unique_id: AtomicUsize,
    check_unique_id: AtomicUsize,
}

struct RegistryRecord {
    unique_id: UniqueId,
    secondary_sets: Vec<Vec<PiiPayload>>,
    provider: RegistryMatch,
}

/// A single-process uniqueness registry, keyed by a digest of the primary PII.
pub struct InMemoryRegistry {
    provider: RegistryMatch,
    policy: MatchPolicy,
    records: Mutex<HashMap<[u8; 32], RegistryRecord>>,
    calls: Calls,
    latency: Option<Duration>,
}

impl InMemoryRegistry {
    /// Records issued by this registry are attributed to `provider`.
    pub fn new(provider: RegistryMatch) -> Self {
        Self {
            provider,
            policy: MatchPolicy::PrimaryOnly,
            records: Mutex::new(HashMap::new()),
            calls: Calls::default(),
            latency: None,
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Delays every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stores a record issued elsewhere, e.g. by another provider.
    pub fn insert_record(
        &self,
        pii: &PiiRecord,
        unique_id: UniqueId,
        provider: RegistryMatch,
    ) -> Fallible<()> {
        let fingerprint = fingerprint(pii)?;
        self.records().insert(
            fingerprint,
            RegistryRecord {
                unique_id,
                secondary_sets: pii.secondary_sets().cloned().collect(),
                provider,
            },
        );
        Ok(())
    }

    pub fn calls(&self) -> RegistryCallCounts {
        RegistryCallCounts {
            search_primary: self.calls.search_primary.load(Ordering::SeqCst),
            issue_unique_id: self.calls.issue_unique_id.load(Ordering::SeqCst),
            check_unique_id: self.calls.check_unique_id.load(Ordering::SeqCst),
        }
    }

    pub fn record_count(&self) -> usize {
        self.records().len()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<[u8; 32], RegistryRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Blake2b-256 of the serialized primary attributes.
fn fingerprint(pii: &PiiRecord) -> Fallible<[u8; 32]> {
    use blake2::{digest::consts::U32, Blake2b, Digest};

    pii.validate()?;
    let serialized =
        serde_json::to_vec(&pii.primary()).map_err(|error| ErrorKind::InvalidPii {
            reason: error.to_string(),
        })?;

    let mut digest = [0u8; 32];
    digest.copy_from_slice(Blake2b::<U32>::digest(&serialized).as_slice());
    Ok(digest)
}

#[async_trait]
impl UniquenessRegistry for InMemoryRegistry {
    async fn search_primary(&self, primary_pii: &PiiRecord) -> Fallible<Option<RegistryMatch>> {
        self.enter(&self.calls.search_primary).await;

        let fingerprint = fingerprint(primary_pii)?;
        Ok(self
            .records()
            .get(&fingerprint)
            .map(|record| record.provider.clone()))
    }

    async fn issue_unique_id(&self, pii: &PiiRecord) -> Fallible<UniqueId> {
        self.enter(&self.calls.issue_unique_id).await;

        let fingerprint = fingerprint(pii)?;
        let mut records = self.records();
        if let Some(record) = records.get(&fingerprint) {
            debug!("Unique id {} already issued", record.unique_id);
            return Ok(record.unique_id);
        }

        let unique_id = UniqueId::from_bytes(make_investor_uid(&fingerprint));
        records.insert(
            fingerprint,
            RegistryRecord {
                unique_id,
                secondary_sets: pii.secondary_sets().cloned().collect(),
                provider: self.provider.clone(),
            },
        );
        info!("Issued unique id {}", unique_id);
        Ok(unique_id)
    }

    async fn check_unique_id(
        &self,
        pii: &PiiRecord,
        unique_id: &UniqueId,
    ) -> Fallible<Option<RegistryMatch>> {
        self.enter(&self.calls.check_unique_id).await;

        let fingerprint = fingerprint(pii)?;
        let records = self.records();
        let record = match records.get(&fingerprint) {
            Some(record) if record.unique_id == *unique_id => record,
            _ => return Ok(None),
        };

        if self.policy == MatchPolicy::PrimaryAndSecondary
            && !pii
                .secondary_sets()
                .any(|set| record.secondary_sets.contains(set))
        {
            return Ok(None);
        }
        Ok(Some(record.provider.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pii::PiiRecordBuilder;
    use rand::{rngs::StdRng, SeedableRng};

    const SEED: [u8; 32] = [11u8; 32];

    fn provider(name: &str) -> RegistryMatch {
        RegistryMatch {
            provider_name: name.into(),
            provider_url: format!("https://{}.example", name),
        }
    }

    fn bob(document_number: &str) -> PiiRecord {
        PiiRecordBuilder::new()
            .first_name("Bob")
            .last_name("Builder")
            .birth_date("1999-04-12")
            .country_code("CA")
            .document("PASSPORT", document_number, "2031-06-30")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn issuance_is_idempotent() {
        let registry = InMemoryRegistry::new(provider("local"));
        let first = registry.issue_unique_id(&bob("P1")).await.unwrap();
        let second = registry.issue_unique_id(&bob("P1")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.record_count(), 1);

        // A new document does not make a new person.
        assert_eq!(registry.issue_unique_id(&bob("P2")).await.unwrap(), first);
    }

    #[tokio::test]
    async fn distinct_people_get_distinct_ids() {
        let registry = InMemoryRegistry::new(provider("local"));
        let mut rng = StdRng::from_seed(SEED);
        let first = registry
            .issue_unique_id(&PiiRecord::dummy(&mut rng))
            .await
            .unwrap();
        let second = registry
            .issue_unique_id(&PiiRecord::dummy(&mut rng))
            .await
            .unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn search_ignores_secondary_sets() {
        let registry = InMemoryRegistry::new(provider("local"));
        assert_eq!(
            registry.search_primary(&bob("P1").primary()).await.unwrap(),
            None
        );

        registry
            .insert_record(&bob("P1"), UniqueId::from_bytes([1u8; 16]), provider("other"))
            .unwrap();
        assert_eq!(
            registry.search_primary(&bob("P9").primary()).await.unwrap(),
            Some(provider("other"))
        );
        assert_eq!(registry.calls().search_primary, 2);
    }

    #[tokio::test]
    async fn check_requires_the_issued_id() {
        let registry = InMemoryRegistry::new(provider("local"));
        let unique_id = registry.issue_unique_id(&bob("P1")).await.unwrap();

        assert_eq!(
            registry.check_unique_id(&bob("P1"), &unique_id).await.unwrap(),
            Some(provider("local"))
        );
        assert_eq!(
            registry
                .check_unique_id(&bob("P1"), &UniqueId::from_bytes([1u8; 16]))
                .await
                .unwrap(),
            None
        );
        let mut rng = StdRng::from_seed(SEED);
        assert_eq!(
            registry
                .check_unique_id(&PiiRecord::dummy(&mut rng), &unique_id)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn strict_policy_matches_a_secondary_set() {
        let registry = InMemoryRegistry::new(provider("local"))
            .with_policy(MatchPolicy::PrimaryAndSecondary);
        let unique_id = registry.issue_unique_id(&bob("P1")).await.unwrap();

        assert!(registry
            .check_unique_id(&bob("P1"), &unique_id)
            .await
            .unwrap()
            .is_some());
        assert!(registry
            .check_unique_id(&bob("P2"), &unique_id)
            .await
            .unwrap()
            .is_none());
        assert!(registry
            .check_unique_id(&bob("P1").primary(), &unique_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn reject_invalid_records() {
        let registry = InMemoryRegistry::new(provider("local"));
        let error = registry
            .issue_unique_id(&PiiRecord::new(Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::InvalidPii { .. }));
        assert_eq!(registry.record_count(), 0);
    }
}
