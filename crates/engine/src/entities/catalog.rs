//! Event catalog operations.

use std::sync::Arc;

use macrosim_domain::{ItemRef, ReleaseType, ScheduledItem};

use crate::infrastructure::ports::{CatalogCounts, CatalogRepo, RepoError};

/// Releases and events, with their fired flags.
pub struct Catalog {
    repo: Arc<dyn CatalogRepo>,
}

impl Catalog {
    pub fn new(repo: Arc<dyn CatalogRepo>) -> Self {
        Self { repo }
    }

    // =========================================================================
    // Setup
    // =========================================================================

    pub async fn save_release_type(&self, release_type: &ReleaseType) -> Result<(), RepoError> {
        self.repo.save_release_type(release_type).await
    }

    pub async fn release_types(&self) -> Result<Vec<ReleaseType>, RepoError> {
        self.repo.list_release_types().await
    }

    pub async fn save_item(&self, item: &ScheduledItem) -> Result<(), RepoError> {
        self.repo.save_item(item).await
    }

    // =========================================================================
    // Playback
    // =========================================================================

    /// Unfired items, timestamp-ordered.
    pub async fn unfired_items(&self) -> Result<Vec<ScheduledItem>, RepoError> {
        self.repo.list_unfired_items().await
    }

    pub async fn mark_fired(&self, item: ItemRef) -> Result<(), RepoError> {
        self.repo.mark_fired(item).await
    }

    pub async fn counts(&self) -> Result<CatalogCounts, RepoError> {
        self.repo.counts().await
    }

    pub async fn is_empty(&self) -> Result<bool, RepoError> {
        Ok(self.repo.counts().await?.total() == 0)
    }
}
