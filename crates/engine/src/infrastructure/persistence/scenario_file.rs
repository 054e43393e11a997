//! JSON scenario documents.
//!
//! A scenario file carries the initial macro state, the release types and the
//! two item catalogs. Timestamps accept RFC 3339 as well as the short `+00`
//! offset and naive `YYYY-MM-DD HH:MM:SS` forms (read as UTC). Ids are
//! optional and generated when absent.

use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use macrosim_domain::{
    parse_timestamp, EventId, ImpactDelta, MacroEvent, MacroState, Release, ReleaseId,
    ReleaseType, ReleaseTypeId, ScheduledItem,
};

use crate::infrastructure::ports::RepoError;

/// Parsed, validated scenario ready to be imported into a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub name: Option<String>,
    pub initial_state: MacroState,
    pub release_types: Vec<ReleaseType>,
    /// Releases then events, in file order
    pub items: Vec<ScheduledItem>,
}

#[derive(Debug, Deserialize)]
struct ScenarioDocument {
    #[serde(default)]
    name: Option<String>,
    initial_state: StateEntry,
    #[serde(default)]
    release_types: Vec<ReleaseTypeEntry>,
    #[serde(default)]
    releases: Vec<ReleaseEntry>,
    #[serde(default)]
    events: Vec<EventEntry>,
}

#[derive(Debug, Deserialize)]
struct StateEntry {
    growth: f64,
    inflation: f64,
    volatility: f64,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct ImpactEntry {
    #[serde(default)]
    growth: f64,
    #[serde(default)]
    inflation: f64,
    #[serde(default)]
    volatility: f64,
}

impl From<ImpactEntry> for ImpactDelta {
    fn from(entry: ImpactEntry) -> Self {
        ImpactDelta::new(entry.growth, entry.inflation, entry.volatility)
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseTypeEntry {
    #[serde(default)]
    id: Option<Uuid>,
    code: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseEntry {
    #[serde(default)]
    id: Option<Uuid>,
    name: String,
    release_type: String,
    consensus: f64,
    actual: f64,
    scheduled_at: String,
    impact: ImpactEntry,
    #[serde(default)]
    fired: bool,
}

#[derive(Debug, Deserialize)]
struct EventEntry {
    #[serde(default)]
    id: Option<Uuid>,
    headline: String,
    #[serde(default)]
    description: Option<String>,
    scheduled_at: String,
    impact: ImpactEntry,
    #[serde(default)]
    fired: bool,
}

impl Scenario {
    /// Read and parse a scenario file.
    pub async fn load(path: &Path) -> Result<Self, RepoError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            RepoError::database("load_scenario", format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    /// Parse a scenario document. Unknown release types and unparseable
    /// timestamps are serialization errors.
    pub fn from_json(raw: &str) -> Result<Self, RepoError> {
        let document: ScenarioDocument =
            serde_json::from_str(raw).map_err(|e| RepoError::serialization(e.to_string()))?;

        let initial_state = MacroState::new(
            document.initial_state.growth,
            document.initial_state.inflation,
            document.initial_state.volatility,
            parse_timestamp(&document.initial_state.timestamp)
                .map_err(RepoError::serialization)?,
        );
        if !initial_state.is_finite() {
            return Err(RepoError::serialization(
                "initial state must have finite values",
            ));
        }

        let release_types: Vec<ReleaseType> = document
            .release_types
            .into_iter()
            .map(|entry| ReleaseType {
                id: entry
                    .id
                    .map(ReleaseTypeId::from_uuid)
                    .unwrap_or_default(),
                code: entry.code,
                name: entry.name,
                description: entry.description,
            })
            .collect();

        let mut items = Vec::with_capacity(document.releases.len() + document.events.len());
        for entry in document.releases {
            if !release_types.is_empty()
                && !release_types.iter().any(|t| t.code == entry.release_type)
            {
                return Err(RepoError::serialization(format!(
                    "release '{}' references unknown release type '{}'",
                    entry.name, entry.release_type
                )));
            }
            items.push(ScheduledItem::Release(Release {
                id: entry.id.map(ReleaseId::from_uuid).unwrap_or_default(),
                scheduled_at: parse_timestamp(&entry.scheduled_at)
                    .map_err(RepoError::serialization)?,
                name: entry.name,
                release_type: entry.release_type,
                consensus: entry.consensus,
                actual: entry.actual,
                impact: entry.impact.into(),
                fired: entry.fired,
            }));
        }
        for entry in document.events {
            items.push(ScheduledItem::Event(MacroEvent {
                id: entry.id.map(EventId::from_uuid).unwrap_or_default(),
                scheduled_at: parse_timestamp(&entry.scheduled_at)
                    .map_err(RepoError::serialization)?,
                headline: entry.headline,
                description: entry.description,
                impact: entry.impact.into(),
                fired: entry.fired,
            }));
        }

        Ok(Self {
            name: document.name,
            initial_state,
            release_types,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrosim_domain::ItemKind;

    const SAMPLE: &str = r#"{
        "name": "Q1 demo",
        "initial_state": {"growth": 2.3, "inflation": 2.1, "volatility": 12.0, "timestamp": "2025-01-31 00:00:00+00"},
        "release_types": [{"code": "NFP", "name": "Non-Farm Payrolls"}],
        "releases": [{
            "name": "Non-Farm Payrolls January",
            "release_type": "NFP",
            "consensus": 180,
            "actual": 215,
            "scheduled_at": "2025-02-07T13:30:00Z",
            "impact": {"growth": 0.08, "inflation": 0.02, "volatility": 0.3}
        }],
        "events": [{
            "headline": "Tariffs announced on imported steel",
            "scheduled_at": "2025-02-10 09:00:00",
            "impact": {"volatility": 2.5}
        }]
    }"#;

    #[test]
    fn when_document_is_valid_then_scenario_is_parsed() {
        let scenario = Scenario::from_json(SAMPLE).expect("valid scenario");

        assert_eq!(scenario.name.as_deref(), Some("Q1 demo"));
        assert_eq!(scenario.initial_state.growth, 2.3);
        assert_eq!(scenario.release_types.len(), 1);
        assert_eq!(scenario.items.len(), 2);
        assert_eq!(scenario.items[0].kind(), ItemKind::Release);
        assert_eq!(scenario.items[1].impact(), ImpactDelta::new(0.0, 0.0, 2.5));
        assert!(scenario.items.iter().all(|item| !item.is_fired()));
    }

    #[test]
    fn when_release_type_is_unknown_then_rejected() {
        let raw = SAMPLE.replace(r#""release_type": "NFP""#, r#""release_type": "PMI""#);
        let err = Scenario::from_json(&raw).expect_err("unknown type");
        assert!(matches!(err, RepoError::Serialization(_)));
    }

    #[test]
    fn when_timestamp_is_malformed_then_rejected() {
        let raw = SAMPLE.replace("2025-02-07T13:30:00Z", "next tuesday");
        assert!(Scenario::from_json(&raw).is_err());
    }
}
