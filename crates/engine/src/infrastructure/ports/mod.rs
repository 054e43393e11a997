//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - Scenario storage (could swap SQLite -> in-memory or another database)
//! - Narrative generation (could swap the LLM for the offline template narrator)
//! - LLM calls (could swap Ollama -> any OpenAI-compatible endpoint)
//! - Output rendering (terminal in production, a buffer in tests)
//! - Clock (for testing)

mod error;
mod external;
mod repos;
mod testing;

// =============================================================================
// Repository Ports
// =============================================================================
pub use repos::{CatalogCounts, CatalogRepo, NarrativeRepo, StateRepo};

// =============================================================================
// External Service Ports
// =============================================================================
pub use external::{
    ChatMessage, FinishReason, LlmPort, LlmRequest, LlmResponse, LogLevel, MessageRole,
    NarrativePort, OutputLine, OutputPort, TokenUsage,
};

// =============================================================================
// Test-Only Mocks (only available during test builds)
// =============================================================================
#[cfg(test)]
pub use repos::{MockCatalogRepo, MockNarrativeRepo, MockStateRepo};

#[cfg(test)]
pub use external::{MockLlmPort, MockNarrativePort, MockOutputPort};

#[cfg(test)]
pub use testing::MockClockPort;

// =============================================================================
// Testing Ports
// =============================================================================
pub use testing::ClockPort;

// =============================================================================
// Error Types
// =============================================================================
pub use error::{LlmError, NarrativeError, RepoError};
