//! Use cases - User story orchestration.
//!
//! Each module contains use cases for a specific domain area.
//! Use cases orchestrate across entity modules to fulfill user stories.

pub mod narrative;
pub mod scenario;
pub mod simulation;

// Re-export main types
pub use narrative::{LlmNarrator, TemplateNarrator};
pub use scenario::{GetStatistics, ImportOutcome, ImportScenario, ScenarioUseCases, StoreStatistics};
pub use simulation::{
    RunOutcome, RunReport, RunSimulation, SimulationError, SimulationSettings,
};
