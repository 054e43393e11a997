//! Entity modules - Domain capability encapsulation.
//!
//! Each module wraps operations for a domain entity type.
//! They depend on repository ports and provide the building blocks for use cases.

pub mod catalog;
pub mod macro_history;
pub mod narrative_log;

pub use catalog::Catalog;
pub use macro_history::{MacroHistory, MacroHistoryError};
pub use narrative_log::NarrativeLog;
