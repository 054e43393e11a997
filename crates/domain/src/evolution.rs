//! Macro evolution: the pure state-transition function.
//!
//! No hidden state and no I/O. Callers persist the returned record and are
//! responsible for applying each scheduled item at most once.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::macro_state::{CauseRef, HistoryRecord, ImpactDelta, MacroState};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvolutionError {
    /// No initial state has been recorded yet.
    #[error("Macro state not initialized: history is empty")]
    NotInitialized,
}

/// Result of applying one impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next: MacroState,
    pub record: HistoryRecord,
}

/// Apply `delta` to `current`, producing the next state stamped at `at` and
/// the history record that tags it with `cause`.
///
/// `next = current + delta` component-wise. No clamping or decay.
pub fn apply(
    current: &MacroState,
    delta: ImpactDelta,
    cause: CauseRef,
    at: DateTime<Utc>,
) -> Transition {
    let next = MacroState {
        growth: current.growth + delta.d_growth,
        inflation: current.inflation + delta.d_inflation,
        volatility: current.volatility + delta.d_volatility,
        timestamp: at,
    };
    Transition {
        next,
        record: HistoryRecord::new(next, cause),
    }
}

/// Most recent state of an ordered (oldest first) history.
pub fn current_state(history: &[HistoryRecord]) -> Result<MacroState, EvolutionError> {
    history
        .last()
        .map(|record| record.state)
        .ok_or(EvolutionError::NotInitialized)
}
