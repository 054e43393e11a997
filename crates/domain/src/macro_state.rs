//! Macro-economic state variables and their audit trail.
//!
//! A [`MacroState`] is never mutated in place. Each applied impact produces a
//! fresh state wrapped in a [`HistoryRecord`] tagged with the [`CauseRef`] that
//! produced it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::ids::{EventId, HistoryId, ReleaseId};

// =============================================================================
// Macro State
// =============================================================================

/// Snapshot of the three macro variables at a simulated instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroState {
    /// Real GDP growth, percent
    pub growth: f64,
    /// Inflation, percent
    pub inflation: f64,
    /// Market volatility index points
    pub volatility: f64,
    pub timestamp: DateTime<Utc>,
}

impl MacroState {
    pub fn new(growth: f64, inflation: f64, volatility: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            growth,
            inflation,
            volatility,
            timestamp,
        }
    }

    /// Component-wise difference `self - earlier`, ignoring timestamps.
    pub fn delta_from(&self, earlier: &MacroState) -> ImpactDelta {
        ImpactDelta::new(
            self.growth - earlier.growth,
            self.inflation - earlier.inflation,
            self.volatility - earlier.volatility,
        )
    }

    pub fn regime(&self) -> Regime {
        Regime::classify(self)
    }

    pub fn is_finite(&self) -> bool {
        self.growth.is_finite() && self.inflation.is_finite() && self.volatility.is_finite()
    }
}

// =============================================================================
// Impact Delta
// =============================================================================

/// Additive adjustment applied to a [`MacroState`] when an item fires.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ImpactDelta {
    pub d_growth: f64,
    pub d_inflation: f64,
    pub d_volatility: f64,
}

impl ImpactDelta {
    pub fn new(d_growth: f64, d_inflation: f64, d_volatility: f64) -> Self {
        Self {
            d_growth,
            d_inflation,
            d_volatility,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.d_growth.is_finite() && self.d_inflation.is_finite() && self.d_volatility.is_finite()
    }

    pub fn is_zero(&self) -> bool {
        self.d_growth == 0.0 && self.d_inflation == 0.0 && self.d_volatility == 0.0
    }
}

// =============================================================================
// Provenance
// =============================================================================

/// Kind of cause recorded on a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CauseType {
    Initial,
    Release,
    Event,
}

impl CauseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CauseType::Initial => "initial",
            CauseType::Release => "release",
            CauseType::Event => "event",
        }
    }
}

impl fmt::Display for CauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CauseType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(Self::Initial),
            "release" => Ok(Self::Release),
            "event" => Ok(Self::Event),
            other => Err(DomainError::parse(format!("Unknown cause type: {}", other))),
        }
    }
}

/// Provenance tag linking a history record to whatever produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cause_type", content = "cause_id", rename_all = "snake_case")]
pub enum CauseRef {
    Initial,
    Release(ReleaseId),
    Event(EventId),
}

impl CauseRef {
    pub fn cause_type(&self) -> CauseType {
        match self {
            CauseRef::Initial => CauseType::Initial,
            CauseRef::Release(_) => CauseType::Release,
            CauseRef::Event(_) => CauseType::Event,
        }
    }

    pub fn cause_id(&self) -> Option<Uuid> {
        match self {
            CauseRef::Initial => None,
            CauseRef::Release(id) => Some(id.to_uuid()),
            CauseRef::Event(id) => Some(id.to_uuid()),
        }
    }

    /// Rebuild a cause from its stored columns.
    pub fn from_parts(cause_type: CauseType, cause_id: Option<Uuid>) -> Result<Self, DomainError> {
        match (cause_type, cause_id) {
            (CauseType::Initial, None) => Ok(CauseRef::Initial),
            (CauseType::Release, Some(id)) => Ok(CauseRef::Release(ReleaseId::from_uuid(id))),
            (CauseType::Event, Some(id)) => Ok(CauseRef::Event(EventId::from_uuid(id))),
            (CauseType::Initial, Some(id)) => Err(DomainError::validation(format!(
                "initial history record must not reference an item, got {}",
                id
            ))),
            (kind, None) => Err(DomainError::validation(format!(
                "{} history record is missing its cause_id",
                kind
            ))),
        }
    }
}

/// One append-only entry in the macro-state history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub state: MacroState,
    #[serde(flatten)]
    pub cause: CauseRef,
}

impl HistoryRecord {
    pub fn new(state: MacroState, cause: CauseRef) -> Self {
        Self {
            id: HistoryId::new(),
            state,
            cause,
        }
    }

    /// The seed record every history starts with.
    pub fn initial(state: MacroState) -> Self {
        Self::new(state, CauseRef::Initial)
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.state.timestamp
    }
}

// =============================================================================
// Regime
// =============================================================================

/// Coarse classification of a macro state, used in output and prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    Boom,
    Goldilocks,
    Overheating,
    Stagnation,
    Stagflation,
    Recession,
    Expansion,
}

impl Regime {
    /// Rules are evaluated in order; the first match wins.
    pub fn classify(state: &MacroState) -> Regime {
        let g = state.growth;
        let i = state.inflation;

        if g > 4.0 && i > 4.0 {
            Regime::Boom
        } else if g > 3.0 && i < 3.0 {
            Regime::Goldilocks
        } else if g > 3.0 && i > 3.0 {
            Regime::Overheating
        } else if g < 1.0 && i < 2.0 {
            Regime::Stagnation
        } else if g < 1.0 && i > 3.0 {
            Regime::Stagflation
        } else if g < 0.0 {
            Regime::Recession
        } else {
            Regime::Expansion
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Regime::Boom => "Boom",
            Regime::Goldilocks => "Goldilocks",
            Regime::Overheating => "Overheating",
            Regime::Stagnation => "Stagnation",
            Regime::Stagflation => "Stagflation",
            Regime::Recession => "Recession",
            Regime::Expansion => "Expansion",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Regime::Boom => "high growth with elevated inflation",
            Regime::Goldilocks => "strong growth with moderate inflation",
            Regime::Overheating => "strong growth with rising inflation pressures",
            Regime::Stagnation => "low growth and subdued inflation",
            Regime::Stagflation => "low growth with high inflation",
            Regime::Recession => "negative growth",
            Regime::Expansion => "moderate growth",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(growth: f64, inflation: f64) -> MacroState {
        MacroState::new(growth, inflation, 12.0, Utc::now())
    }

    #[test]
    fn regime_rules_apply_in_order() {
        assert_eq!(Regime::classify(&state(4.5, 4.5)), Regime::Boom);
        assert_eq!(Regime::classify(&state(3.5, 2.0)), Regime::Goldilocks);
        assert_eq!(Regime::classify(&state(3.5, 3.5)), Regime::Overheating);
        assert_eq!(Regime::classify(&state(0.5, 1.5)), Regime::Stagnation);
        assert_eq!(Regime::classify(&state(0.5, 3.5)), Regime::Stagflation);
        assert_eq!(Regime::classify(&state(2.3, 2.1)), Regime::Expansion);
    }

    #[test]
    fn negative_growth_with_mid_inflation_is_recession() {
        // g < 1 and 2 <= i <= 3 falls through the stagnation/stagflation rules
        assert_eq!(Regime::classify(&state(-0.5, 2.5)), Regime::Recession);
    }

    #[test]
    fn cause_ref_round_trips_through_columns() {
        let id = ReleaseId::new();
        let cause = CauseRef::Release(id);
        let rebuilt = CauseRef::from_parts(cause.cause_type(), cause.cause_id())
            .expect("valid columns");
        assert_eq!(rebuilt, cause);
        assert_eq!(
            CauseRef::from_parts(CauseType::Initial, None).expect("initial"),
            CauseRef::Initial
        );
    }

    #[test]
    fn cause_ref_rejects_inconsistent_columns() {
        assert!(CauseRef::from_parts(CauseType::Event, None).is_err());
        assert!(CauseRef::from_parts(CauseType::Initial, Some(Uuid::nil())).is_err());
    }

    #[test]
    fn history_record_serializes_cause_columns() {
        let record = HistoryRecord::initial(state(2.3, 2.1));
        let json = serde_json::to_value(record).expect("serialize");
        assert_eq!(json["cause_type"], "initial");
        assert!(json.get("cause_id").is_none());
    }
}
