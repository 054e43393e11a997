//! Macrosim domain: macro state, scheduled items and the pure logic that
//! orders and applies them.
//!
//! ## Structure
//!
//! - `catalog` - releases, events and the `ScheduledItem` variant over both
//! - `macro_state` - macro variables, impact deltas, provenance, regimes
//! - `evolution` - the pure state-transition function
//! - `timeline` - global ordering and the firing cursor
//! - `time` - simulated-to-real time conversion and timestamp parsing
//! - `narrative` - narrative records and narrator context

pub mod catalog;
pub mod error;
pub mod evolution;
pub mod ids;
pub mod macro_state;
pub mod narrative;
pub mod time;
pub mod timeline;

pub use catalog::{ItemKind, ItemRef, MacroEvent, Release, ReleaseType, ScheduledItem};
pub use error::DomainError;
pub use evolution::{apply, current_state, EvolutionError, Transition};
pub use ids::{EventId, HistoryId, NarrativeId, ReleaseId, ReleaseTypeId};
pub use macro_state::{CauseRef, CauseType, HistoryRecord, ImpactDelta, MacroState, Regime};
pub use narrative::{NarrativeContext, NarrativeKind, NarrativeRecord, ReleaseBrief};
pub use time::{parse_timestamp, real_delay_for, simulated_days, TimeScale};
pub use timeline::{Timeline, TimelineError, TimelineProgress, TimelineState, TimelineSummary};
