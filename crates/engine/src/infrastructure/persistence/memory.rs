//! In-memory scenario store for demos and tests.
//!
//! Holds the catalog, the macro history and the narrative log behind
//! `tokio::sync::RwLock`s. Nothing survives the process.

use async_trait::async_trait;
use tokio::sync::RwLock;

use macrosim_domain::{
    HistoryRecord, ItemKind, ItemRef, MacroState, NarrativeRecord, ReleaseType, ScheduledItem,
};

use crate::infrastructure::ports::{CatalogCounts, CatalogRepo, NarrativeRepo, RepoError, StateRepo};

/// In-memory implementation of every store port.
#[derive(Default)]
pub struct InMemoryStore {
    release_types: RwLock<Vec<ReleaseType>>,
    /// Insertion order
    items: RwLock<Vec<ScheduledItem>>,
    /// Append order, oldest first
    history: RwLock<Vec<HistoryRecord>>,
    narratives: RwLock<Vec<NarrativeRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every catalog item, fired or not, in insertion order.
    pub async fn items(&self) -> Vec<ScheduledItem> {
        self.items.read().await.clone()
    }

    pub async fn narratives(&self) -> Vec<NarrativeRecord> {
        self.narratives.read().await.clone()
    }
}

#[async_trait]
impl CatalogRepo for InMemoryStore {
    async fn save_release_type(&self, release_type: &ReleaseType) -> Result<(), RepoError> {
        let mut release_types = self.release_types.write().await;
        match release_types.iter_mut().find(|t| t.code == release_type.code) {
            Some(existing) => *existing = release_type.clone(),
            None => release_types.push(release_type.clone()),
        }
        Ok(())
    }

    async fn list_release_types(&self) -> Result<Vec<ReleaseType>, RepoError> {
        Ok(self.release_types.read().await.clone())
    }

    async fn save_item(&self, item: &ScheduledItem) -> Result<(), RepoError> {
        let mut items = self.items.write().await;
        if items.iter().any(|i| i.item_ref() == item.item_ref()) {
            return Err(RepoError::constraint(format!(
                "catalog item {} already exists",
                item.item_ref()
            )));
        }
        items.push(item.clone());
        Ok(())
    }

    async fn list_unfired_items(&self) -> Result<Vec<ScheduledItem>, RepoError> {
        let mut unfired: Vec<ScheduledItem> = self
            .items
            .read()
            .await
            .iter()
            .filter(|item| !item.is_fired())
            .cloned()
            .collect();
        unfired.sort_by_key(ScheduledItem::timestamp);
        Ok(unfired)
    }

    async fn mark_fired(&self, item: ItemRef) -> Result<(), RepoError> {
        let mut items = self.items.write().await;
        let target = items
            .iter_mut()
            .find(|candidate| candidate.item_ref() == item)
            .ok_or_else(|| RepoError::not_found(item.kind().as_str(), item.uuid()))?;
        target
            .mark_fired()
            .map_err(|e| RepoError::constraint(e.to_string()))
    }

    async fn counts(&self) -> Result<CatalogCounts, RepoError> {
        let items = self.items.read().await;
        let mut counts = CatalogCounts::default();
        for item in items.iter() {
            match item.kind() {
                ItemKind::Release => {
                    counts.releases += 1;
                    if !item.is_fired() {
                        counts.unfired_releases += 1;
                    }
                }
                ItemKind::Event => {
                    counts.events += 1;
                    if !item.is_fired() {
                        counts.unfired_events += 1;
                    }
                }
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl StateRepo for InMemoryStore {
    async fn latest_state(&self) -> Result<Option<MacroState>, RepoError> {
        Ok(self.history.read().await.last().map(|record| record.state))
    }

    async fn append_history(&self, record: &HistoryRecord) -> Result<(), RepoError> {
        let mut history = self.history.write().await;
        if history.iter().any(|existing| existing.id == record.id) {
            return Err(RepoError::constraint(format!(
                "history record {} already exists",
                record.id
            )));
        }
        history.push(*record);
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>, RepoError> {
        Ok(self
            .history
            .read()
            .await
            .iter()
            .rev()
            .take(limit as usize)
            .copied()
            .collect())
    }

    async fn history(&self) -> Result<Vec<HistoryRecord>, RepoError> {
        Ok(self.history.read().await.clone())
    }

    async fn count_history(&self) -> Result<u64, RepoError> {
        Ok(self.history.read().await.len() as u64)
    }
}

#[async_trait]
impl NarrativeRepo for InMemoryStore {
    async fn append(&self, record: &NarrativeRecord) -> Result<(), RepoError> {
        self.narratives.write().await.push(record.clone());
        Ok(())
    }

    async fn list_for_reference(&self, reference: ItemRef) -> Result<Vec<NarrativeRecord>, RepoError> {
        Ok(self
            .narratives
            .read()
            .await
            .iter()
            .filter(|record| record.reference == reference)
            .cloned()
            .collect())
    }

    async fn count(&self) -> Result<u64, RepoError> {
        Ok(self.narratives.read().await.len() as u64)
    }
}
