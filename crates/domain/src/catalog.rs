//! Scheduled catalog items: economic releases and macro events.
//!
//! Both variants share the capability set the scheduler relies on (timestamp,
//! impact, fired flag, identity); [`ScheduledItem`] exposes it without the
//! caller caring which variant it holds.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::ids::{EventId, ReleaseId, ReleaseTypeId};
use crate::macro_state::{CauseRef, ImpactDelta};

// =============================================================================
// Item identity
// =============================================================================

/// Which variant a scheduled item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Release,
    Event,
}

impl ItemKind {
    /// Tie-break rank at identical timestamps: releases fire before events.
    pub fn precedence(&self) -> u8 {
        match self {
            ItemKind::Release => 0,
            ItemKind::Event => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Release => "release",
            ItemKind::Event => "event",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to a release or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reference_type", content = "reference_id", rename_all = "snake_case")]
pub enum ItemRef {
    Release(ReleaseId),
    Event(EventId),
}

impl ItemRef {
    pub fn kind(&self) -> ItemKind {
        match self {
            ItemRef::Release(_) => ItemKind::Release,
            ItemRef::Event(_) => ItemKind::Event,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            ItemRef::Release(id) => id.to_uuid(),
            ItemRef::Event(id) => id.to_uuid(),
        }
    }

    pub fn from_parts(kind: ItemKind, id: Uuid) -> Self {
        match kind {
            ItemKind::Release => ItemRef::Release(ReleaseId::from_uuid(id)),
            ItemKind::Event => ItemRef::Event(EventId::from_uuid(id)),
        }
    }

    pub fn cause(&self) -> CauseRef {
        match self {
            ItemRef::Release(id) => CauseRef::Release(*id),
            ItemRef::Event(id) => CauseRef::Event(*id),
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.uuid())
    }
}

// =============================================================================
// Release types
// =============================================================================

/// Category of an economic release (NFP, CPI, GDP, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseType {
    pub id: ReleaseTypeId,
    /// Short code such as "NFP"
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

// =============================================================================
// Releases and events
// =============================================================================

/// A scheduled economic-indicator release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: ReleaseId,
    /// Display name, e.g. "Non-Farm Payrolls January"
    pub name: String,
    /// Release type code, e.g. "NFP"
    pub release_type: String,
    pub consensus: f64,
    pub actual: f64,
    pub scheduled_at: DateTime<Utc>,
    pub impact: ImpactDelta,
    #[serde(default)]
    pub fired: bool,
}

impl Release {
    /// Signed surprise versus consensus.
    pub fn surprise(&self) -> f64 {
        self.actual - self.consensus
    }

    /// Surprise as a percentage of consensus; zero when consensus is zero.
    pub fn surprise_pct(&self) -> f64 {
        if self.consensus == 0.0 {
            0.0
        } else {
            self.surprise() / self.consensus * 100.0
        }
    }
}

/// A scheduled macro-economic or geopolitical event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroEvent {
    pub id: EventId,
    pub headline: String,
    #[serde(default)]
    pub description: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub impact: ImpactDelta,
    #[serde(default)]
    pub fired: bool,
}

/// A release or an event, ordered and fired by the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduledItem {
    Release(Release),
    Event(MacroEvent),
}

impl ScheduledItem {
    pub fn kind(&self) -> ItemKind {
        match self {
            ScheduledItem::Release(_) => ItemKind::Release,
            ScheduledItem::Event(_) => ItemKind::Event,
        }
    }

    pub fn item_ref(&self) -> ItemRef {
        match self {
            ScheduledItem::Release(r) => ItemRef::Release(r.id),
            ScheduledItem::Event(e) => ItemRef::Event(e.id),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ScheduledItem::Release(r) => r.scheduled_at,
            ScheduledItem::Event(e) => e.scheduled_at,
        }
    }

    pub fn impact(&self) -> ImpactDelta {
        match self {
            ScheduledItem::Release(r) => r.impact,
            ScheduledItem::Event(e) => e.impact,
        }
    }

    pub fn is_fired(&self) -> bool {
        match self {
            ScheduledItem::Release(r) => r.fired,
            ScheduledItem::Event(e) => e.fired,
        }
    }

    pub fn cause(&self) -> CauseRef {
        self.item_ref().cause()
    }

    /// Short label: release name or event headline.
    pub fn label(&self) -> &str {
        match self {
            ScheduledItem::Release(r) => &r.name,
            ScheduledItem::Event(e) => &e.headline,
        }
    }

    pub fn as_release(&self) -> Option<&Release> {
        match self {
            ScheduledItem::Release(r) => Some(r),
            ScheduledItem::Event(_) => None,
        }
    }

    /// Flip the fired flag. It moves false -> true exactly once.
    pub fn mark_fired(&mut self) -> Result<(), DomainError> {
        let item_ref = self.item_ref();
        let fired = match self {
            ScheduledItem::Release(r) => &mut r.fired,
            ScheduledItem::Event(e) => &mut e.fired,
        };
        if *fired {
            return Err(DomainError::invalid_state_transition(format!(
                "{} has already fired",
                item_ref
            )));
        }
        *fired = true;
        Ok(())
    }

    /// Invariants a catalog item must hold before it can be scheduled.
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.impact().is_finite() {
            return Err(DomainError::validation(format!(
                "{} has a non-finite impact delta",
                self.item_ref()
            )));
        }
        match self {
            ScheduledItem::Release(r) => {
                if r.name.trim().is_empty() {
                    return Err(DomainError::validation(format!("release {} has no name", r.id)));
                }
                if !r.consensus.is_finite() || !r.actual.is_finite() {
                    return Err(DomainError::validation(format!(
                        "release {} has a non-finite consensus or actual",
                        r.id
                    )));
                }
            }
            ScheduledItem::Event(e) => {
                if e.headline.trim().is_empty() {
                    return Err(DomainError::validation(format!(
                        "event {} has no headline",
                        e.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// One-line display summary of the item.
    pub fn summary(&self) -> String {
        let sim_time = self.timestamp().format("%Y-%m-%d %H:%M");
        match self {
            ScheduledItem::Release(r) => format!(
                "[{}] ECONOMIC RELEASE: {} (Consensus: {}, Actual: {})",
                sim_time, r.name, r.consensus, r.actual
            ),
            ScheduledItem::Event(e) => format!("[{}] MACRO EVENT: {}", sim_time, e.headline),
        }
    }
}

impl From<Release> for ScheduledItem {
    fn from(value: Release) -> Self {
        ScheduledItem::Release(value)
    }
}

impl From<MacroEvent> for ScheduledItem {
    fn from(value: MacroEvent) -> Self {
        ScheduledItem::Event(value)
    }
}
