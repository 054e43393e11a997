//! Application state and composition.

use std::sync::Arc;

use crate::entities::{Catalog, MacroHistory, NarrativeLog};
use crate::infrastructure::ports::{
    CatalogRepo, ClockPort, NarrativePort, NarrativeRepo, OutputPort, StateRepo,
};
use crate::use_cases;
use crate::use_cases::SimulationSettings;

/// Main application state.
///
/// Holds the repository ports and the use cases built on them.
pub struct App {
    pub repositories: Repositories,
    pub use_cases: UseCases,
}

/// Container for the store ports and the entity wrappers over them.
pub struct Repositories {
    pub catalog_repo: Arc<dyn CatalogRepo>,
    pub state_repo: Arc<dyn StateRepo>,
    pub narrative_repo: Arc<dyn NarrativeRepo>,

    pub catalog: Arc<Catalog>,
    pub history: Arc<MacroHistory>,
    pub narratives: Arc<NarrativeLog>,
}

impl Repositories {
    pub fn new(
        catalog_repo: Arc<dyn CatalogRepo>,
        state_repo: Arc<dyn StateRepo>,
        narrative_repo: Arc<dyn NarrativeRepo>,
    ) -> Self {
        Self {
            catalog: Arc::new(Catalog::new(catalog_repo.clone())),
            history: Arc::new(MacroHistory::new(state_repo.clone())),
            narratives: Arc::new(NarrativeLog::new(narrative_repo.clone())),
            catalog_repo,
            state_repo,
            narrative_repo,
        }
    }

    /// All three ports served by one store.
    pub fn from_store<S>(store: Arc<S>) -> Self
    where
        S: CatalogRepo + StateRepo + NarrativeRepo + 'static,
    {
        Self::new(store.clone(), store.clone(), store)
    }
}

/// Container for all use cases.
pub struct UseCases {
    pub scenario: use_cases::ScenarioUseCases,
    pub simulation: Arc<use_cases::RunSimulation>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        repositories: Repositories,
        narrator: Arc<dyn NarrativePort>,
        output: Arc<dyn OutputPort>,
        clock: Arc<dyn ClockPort>,
        settings: SimulationSettings,
    ) -> Self {
        let scenario = use_cases::ScenarioUseCases::new(
            Arc::new(use_cases::ImportScenario::new(
                repositories.catalog.clone(),
                repositories.history.clone(),
            )),
            Arc::new(use_cases::GetStatistics::new(
                repositories.catalog.clone(),
                repositories.history.clone(),
                repositories.narratives.clone(),
            )),
        );

        let simulation = Arc::new(use_cases::RunSimulation::new(
            repositories.catalog.clone(),
            repositories.history.clone(),
            repositories.narratives.clone(),
            narrator,
            output,
            clock,
            settings,
        ));

        Self {
            repositories,
            use_cases: UseCases {
                scenario,
                simulation,
            },
        }
    }
}
