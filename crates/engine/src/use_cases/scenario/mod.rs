//! Scenario use cases.
//!
//! Importing a scenario document into an empty store, and reporting what a
//! store currently holds.

use std::sync::Arc;

use crate::entities::{Catalog, MacroHistory, NarrativeLog};
use crate::infrastructure::persistence::Scenario;
use crate::infrastructure::ports::{CatalogCounts, RepoError};

/// Container for scenario use cases.
pub struct ScenarioUseCases {
    pub import: Arc<ImportScenario>,
    pub statistics: Arc<GetStatistics>,
}

impl ScenarioUseCases {
    pub fn new(import: Arc<ImportScenario>, statistics: Arc<GetStatistics>) -> Self {
        Self { import, statistics }
    }
}

// =============================================================================
// Import
// =============================================================================

/// Result of an import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Imported {
        release_types: usize,
        items: usize,
    },
    /// The store already holds a catalog or history; nothing was written.
    AlreadyPopulated,
}

/// Writes a scenario into an empty store: release types, then catalog items,
/// then the initial history record.
pub struct ImportScenario {
    catalog: Arc<Catalog>,
    history: Arc<MacroHistory>,
}

impl ImportScenario {
    pub fn new(catalog: Arc<Catalog>, history: Arc<MacroHistory>) -> Self {
        Self { catalog, history }
    }

    pub async fn execute(&self, scenario: &Scenario) -> Result<ImportOutcome, RepoError> {
        if !self.catalog.is_empty().await? || self.history.count().await? > 0 {
            tracing::info!("Store already populated, skipping scenario import");
            return Ok(ImportOutcome::AlreadyPopulated);
        }

        for release_type in &scenario.release_types {
            self.catalog.save_release_type(release_type).await?;
        }
        for item in &scenario.items {
            self.catalog.save_item(item).await?;
        }
        self.history.seed(scenario.initial_state).await?;

        tracing::info!(
            scenario = scenario.name.as_deref().unwrap_or("unnamed"),
            release_types = scenario.release_types.len(),
            items = scenario.items.len(),
            "Scenario imported"
        );

        Ok(ImportOutcome::Imported {
            release_types: scenario.release_types.len(),
            items: scenario.items.len(),
        })
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Row counts across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatistics {
    pub catalog: CatalogCounts,
    pub history_records: u64,
    pub narratives: u64,
}

pub struct GetStatistics {
    catalog: Arc<Catalog>,
    history: Arc<MacroHistory>,
    narratives: Arc<NarrativeLog>,
}

impl GetStatistics {
    pub fn new(
        catalog: Arc<Catalog>,
        history: Arc<MacroHistory>,
        narratives: Arc<NarrativeLog>,
    ) -> Self {
        Self {
            catalog,
            history,
            narratives,
        }
    }

    pub async fn execute(&self) -> Result<StoreStatistics, RepoError> {
        Ok(StoreStatistics {
            catalog: self.catalog.counts().await?,
            history_records: self.history.count().await?,
            narratives: self.narratives.count().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{MockCatalogRepo, MockNarrativeRepo, MockStateRepo};
    use chrono::{TimeZone, Utc};
    use macrosim_domain::{
        EventId, ImpactDelta, MacroEvent, MacroState, ReleaseType, ReleaseTypeId, ScheduledItem,
    };

    fn scenario() -> Scenario {
        let at = Utc
            .with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid date");
        Scenario {
            name: Some("test".to_string()),
            initial_state: MacroState::new(2.3, 2.1, 12.0, at),
            release_types: vec![ReleaseType {
                id: ReleaseTypeId::new(),
                code: "NFP".to_string(),
                name: "Non-Farm Payrolls".to_string(),
                description: None,
            }],
            items: vec![ScheduledItem::from(MacroEvent {
                id: EventId::new(),
                headline: "Trade talks collapse".to_string(),
                description: None,
                scheduled_at: at,
                impact: ImpactDelta::new(-0.2, 0.0, 2.0),
                fired: false,
            })],
        }
    }

    fn empty_counts() -> CatalogCounts {
        CatalogCounts {
            releases: 0,
            unfired_releases: 0,
            events: 0,
            unfired_events: 0,
        }
    }

    #[tokio::test]
    async fn when_store_is_empty_then_scenario_is_written_in_order() {
        let mut seq = mockall::Sequence::new();
        let mut catalog = MockCatalogRepo::new();
        let mut state = MockStateRepo::new();

        catalog.expect_counts().returning(|| Ok(empty_counts()));
        state.expect_count_history().returning(|| Ok(0));
        catalog
            .expect_save_release_type()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        catalog
            .expect_save_item()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        state
            .expect_append_history()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let import = ImportScenario::new(
            Arc::new(Catalog::new(Arc::new(catalog))),
            Arc::new(MacroHistory::new(Arc::new(state))),
        );
        let outcome = import.execute(&scenario()).await.expect("import");

        assert_eq!(
            outcome,
            ImportOutcome::Imported {
                release_types: 1,
                items: 1
            }
        );
    }

    #[tokio::test]
    async fn when_catalog_has_items_then_import_is_skipped() {
        let mut catalog = MockCatalogRepo::new();
        let mut state = MockStateRepo::new();

        catalog.expect_counts().returning(|| {
            Ok(CatalogCounts {
                releases: 2,
                ..empty_counts()
            })
        });
        state.expect_count_history().returning(|| Ok(1));
        catalog.expect_save_item().times(0);
        state.expect_append_history().times(0);

        let import = ImportScenario::new(
            Arc::new(Catalog::new(Arc::new(catalog))),
            Arc::new(MacroHistory::new(Arc::new(state))),
        );

        assert_eq!(
            import.execute(&scenario()).await.expect("import"),
            ImportOutcome::AlreadyPopulated
        );
    }

    #[tokio::test]
    async fn statistics_collects_all_counts() {
        let mut catalog = MockCatalogRepo::new();
        let mut state = MockStateRepo::new();
        let mut narratives = MockNarrativeRepo::new();

        catalog.expect_counts().returning(|| {
            Ok(CatalogCounts {
                releases: 3,
                unfired_releases: 1,
                events: 2,
                unfired_events: 2,
            })
        });
        state.expect_count_history().returning(|| Ok(3));
        narratives.expect_count().returning(|| Ok(5));

        let stats = GetStatistics::new(
            Arc::new(Catalog::new(Arc::new(catalog))),
            Arc::new(MacroHistory::new(Arc::new(state))),
            Arc::new(NarrativeLog::new(Arc::new(narratives))),
        )
        .execute()
        .await
        .expect("statistics");

        assert_eq!(stats.catalog.total(), 5);
        assert_eq!(stats.history_records, 3);
        assert_eq!(stats.narratives, 5);
    }
}
