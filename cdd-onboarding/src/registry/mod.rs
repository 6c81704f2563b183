//! The PII uniqueness registry as seen by the onboarding coordinator.

mod memory;

pub use memory::{InMemoryRegistry, MatchPolicy, RegistryCallCounts};

use crate::{errors::Fallible, pii::PiiRecord, unique_id::UniqueId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The provider that holds a matching record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryMatch {
    pub provider_name: String,
    pub provider_url: String,
}

#[async_trait]
pub trait UniquenessRegistry: Send + Sync {
    /// Looks up a record by its primary attributes. The caller strips secondary sets.
    async fn search_primary(&self, primary_pii: &PiiRecord) -> Fallible<Option<RegistryMatch>>;

    /// Issues the unique id of the person behind `pii`. Issuing twice for the same
    /// person returns the same id.
    async fn issue_unique_id(&self, pii: &PiiRecord) -> Fallible<UniqueId>;

    /// `Some` if `pii` is on record under `unique_id`.
    async fn check_unique_id(
        &self,
        pii: &PiiRecord,
        unique_id: &UniqueId,
    ) -> Fallible<Option<RegistryMatch>>;
}
