//! Narrative records and the structured context handed to a narrator.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{ItemRef, MacroEvent, Release, ScheduledItem};
use crate::error::DomainError;
use crate::ids::NarrativeId;
use crate::macro_state::{HistoryRecord, ImpactDelta, MacroState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeKind {
    PreRelease,
    PostRelease,
    Event,
}

impl NarrativeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeKind::PreRelease => "pre_release",
            NarrativeKind::PostRelease => "post_release",
            NarrativeKind::Event => "event",
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NarrativeKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pre_release" => Ok(Self::PreRelease),
            "post_release" => Ok(Self::PostRelease),
            "event" => Ok(Self::Event),
            other => Err(DomainError::parse(format!("Unknown narrative kind: {}", other))),
        }
    }
}

/// Write-once narrative text tied to the item it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeRecord {
    pub id: NarrativeId,
    pub timestamp: DateTime<Utc>,
    pub kind: NarrativeKind,
    pub content: String,
    #[serde(flatten)]
    pub reference: ItemRef,
}

impl NarrativeRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: NarrativeKind,
        content: impl Into<String>,
        reference: ItemRef,
    ) -> Self {
        Self {
            id: NarrativeId::new(),
            timestamp,
            kind,
            content: content.into(),
            reference,
        }
    }
}

/// What is public about a release before its number is out.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReleaseBrief {
    pub name: String,
    pub release_type: String,
    pub consensus: f64,
    pub scheduled_at: DateTime<Utc>,
}

impl From<&Release> for ReleaseBrief {
    fn from(release: &Release) -> Self {
        Self {
            name: release.name.clone(),
            release_type: release.release_type.clone(),
            consensus: release.consensus,
            scheduled_at: release.scheduled_at,
        }
    }
}

/// Structured payload for one narrative call.
///
/// The pre-release variant carries no actual value or impact: it models the
/// market anticipating a number nobody has seen yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NarrativeContext {
    PreRelease {
        release: ReleaseBrief,
        state: MacroState,
        /// Most recent first
        recent_history: Vec<HistoryRecord>,
    },
    PostRelease {
        release: ReleaseBrief,
        actual: f64,
        impact: ImpactDelta,
        before: MacroState,
        after: MacroState,
    },
    Event {
        headline: String,
        description: Option<String>,
        occurred_at: DateTime<Utc>,
        impact: ImpactDelta,
        before: MacroState,
        after: MacroState,
    },
}

impl NarrativeContext {
    pub fn pre_release(
        release: &Release,
        state: MacroState,
        recent_history: Vec<HistoryRecord>,
    ) -> Self {
        NarrativeContext::PreRelease {
            release: ReleaseBrief::from(release),
            state,
            recent_history,
        }
    }

    /// Context once `item` has fired and moved the state from `before` to `after`.
    pub fn resolved(item: &ScheduledItem, before: MacroState, after: MacroState) -> Self {
        match item {
            ScheduledItem::Release(release) => NarrativeContext::PostRelease {
                release: ReleaseBrief::from(release),
                actual: release.actual,
                impact: release.impact,
                before,
                after,
            },
            ScheduledItem::Event(MacroEvent {
                headline,
                description,
                scheduled_at,
                impact,
                ..
            }) => NarrativeContext::Event {
                headline: headline.clone(),
                description: description.clone(),
                occurred_at: *scheduled_at,
                impact: *impact,
                before,
                after,
            },
        }
    }

    pub fn kind(&self) -> NarrativeKind {
        match self {
            NarrativeContext::PreRelease { .. } => NarrativeKind::PreRelease,
            NarrativeContext::PostRelease { .. } => NarrativeKind::PostRelease,
            NarrativeContext::Event { .. } => NarrativeKind::Event,
        }
    }
}
