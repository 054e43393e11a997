//! Repository port traits for scenario storage.

use async_trait::async_trait;
use macrosim_domain::{HistoryRecord, ItemRef, MacroState, NarrativeRecord, ReleaseType, ScheduledItem};

use super::error::RepoError;

/// Row counts over the catalog, split by kind and fired flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub releases: u64,
    pub unfired_releases: u64,
    pub events: u64,
    pub unfired_events: u64,
}

impl CatalogCounts {
    pub fn total(&self) -> u64 {
        self.releases + self.events
    }
}

// =============================================================================
// Event Catalog
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    // Setup
    async fn save_release_type(&self, release_type: &ReleaseType) -> Result<(), RepoError>;
    async fn list_release_types(&self) -> Result<Vec<ReleaseType>, RepoError>;
    async fn save_item(&self, item: &ScheduledItem) -> Result<(), RepoError>;

    // Playback
    /// Unfired releases and events ordered by timestamp, insertion order within a kind.
    async fn list_unfired_items(&self) -> Result<Vec<ScheduledItem>, RepoError>;
    /// Set the fired flag. Fails with `NotFound` for unknown items and
    /// `ConstraintViolation` if the item has already fired.
    async fn mark_fired(&self, item: ItemRef) -> Result<(), RepoError>;

    // Statistics
    async fn counts(&self) -> Result<CatalogCounts, RepoError>;
}

// =============================================================================
// State Store
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateRepo: Send + Sync {
    /// State of the most recently appended history record.
    async fn latest_state(&self) -> Result<Option<MacroState>, RepoError>;
    async fn append_history(&self, record: &HistoryRecord) -> Result<(), RepoError>;
    /// Most recent first.
    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>, RepoError>;
    /// Full history, oldest first.
    async fn history(&self) -> Result<Vec<HistoryRecord>, RepoError>;
    async fn count_history(&self) -> Result<u64, RepoError>;
}

// =============================================================================
// Narrative Log
// =============================================================================

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrativeRepo: Send + Sync {
    async fn append(&self, record: &NarrativeRecord) -> Result<(), RepoError>;
    /// Narratives written about one item, oldest first.
    async fn list_for_reference(&self, reference: ItemRef) -> Result<Vec<NarrativeRecord>, RepoError>;
    async fn count(&self) -> Result<u64, RepoError>;
}
