//! Narrative log operations.

use std::sync::Arc;

use macrosim_domain::{ItemRef, NarrativeRecord};

use crate::infrastructure::ports::{NarrativeRepo, RepoError};

/// Write-once narratives, looked up by the item they describe.
pub struct NarrativeLog {
    repo: Arc<dyn NarrativeRepo>,
}

impl NarrativeLog {
    pub fn new(repo: Arc<dyn NarrativeRepo>) -> Self {
        Self { repo }
    }

    pub async fn append(&self, record: &NarrativeRecord) -> Result<(), RepoError> {
        self.repo.append(record).await
    }

    pub async fn for_item(&self, item: ItemRef) -> Result<Vec<NarrativeRecord>, RepoError> {
        self.repo.list_for_reference(item).await
    }

    pub async fn count(&self) -> Result<u64, RepoError> {
        self.repo.count().await
    }
}
