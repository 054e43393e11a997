//! Timeline scheduler: one globally ordered sequence over releases and events.
//!
//! Ordering is by timestamp, then releases before events at identical
//! timestamps, then catalog insertion order. The sort is stable so a replay of
//! the same catalog always yields the same sequence.
//!
//! Lifecycle is `NotStarted -> Running -> Exhausted`. `Exhausted` is terminal
//! because fired flags never revert.

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::catalog::{ItemKind, ItemRef, ScheduledItem};
use crate::time::{simulated_days, TimeScale};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimelineError {
    /// Catalog contents cannot be scheduled. Raised before the run starts.
    #[error("Invalid timeline configuration: {0}")]
    Configuration(String),
    #[error("Item not in timeline: {0}")]
    UnknownItem(ItemRef),
    #[error("Item already fired: {0}")]
    AlreadyFired(ItemRef),
    #[error("Out of order firing: expected {expected}, got {got}")]
    OutOfOrder { expected: ItemRef, got: ItemRef },
    #[error("Timeline has not been started")]
    NotStarted,
    #[error("Timeline is exhausted")]
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineState {
    NotStarted,
    Running,
    Exhausted,
}

/// Progress counters over the whole timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineProgress {
    pub total: usize,
    pub processed: usize,
    pub remaining: usize,
    pub percentage: f64,
}

/// Static description of the timeline and how long it will take to replay.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSummary {
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
    pub simulated_days: i64,
    pub real_minutes: f64,
    pub releases: usize,
    pub events: usize,
    pub seconds_per_day: f64,
}

impl fmt::Display for TimelineSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timeline Summary:")?;
        writeln!(f, "  Simulated period: {} to {}", self.first, self.last)?;
        writeln!(f, "  Simulated duration: {} days", self.simulated_days)?;
        writeln!(f, "  Real duration: {:.1} minutes", self.real_minutes)?;
        writeln!(
            f,
            "  Total events: {} ({} releases, {} macro events)",
            self.releases + self.events,
            self.releases,
            self.events
        )?;
        write!(f, "  Time compression: 1 day = {} seconds", self.seconds_per_day)
    }
}

/// Ordered, single-cursor view over the catalog.
#[derive(Debug, Clone)]
pub struct Timeline {
    items: Vec<ScheduledItem>,
    /// Index of the earliest unfired item; `items.len()` when none remain.
    cursor: usize,
    started: bool,
    horizon: Option<DateTime<Utc>>,
}

impl Timeline {
    /// Validate and order catalog items.
    ///
    /// Duplicate identities and items that fail [`ScheduledItem::validate`] are
    /// configuration errors: they surface here, never mid-run.
    pub fn initialize(items: Vec<ScheduledItem>) -> Result<Self, TimelineError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            item.validate()
                .map_err(|e| TimelineError::Configuration(e.to_string()))?;
            if !seen.insert(item.item_ref()) {
                return Err(TimelineError::Configuration(format!(
                    "duplicate catalog item {}",
                    item.item_ref()
                )));
            }
        }

        let mut items = items;
        // Vec::sort_by_key is stable: insertion order breaks remaining ties.
        items.sort_by_key(|item| (item.timestamp(), item.kind().precedence()));

        let mut timeline = Self {
            items,
            cursor: 0,
            started: false,
            horizon: None,
        };
        timeline.advance_cursor();
        Ok(timeline)
    }

    /// Bound the scenario: items scheduled after `horizon` never fire.
    pub fn with_horizon(mut self, horizon: DateTime<Utc>) -> Self {
        self.horizon = Some(horizon);
        self
    }

    /// Bound the scenario to `days` simulated days after the first item.
    ///
    /// A bound that reaches past the last representable instant leaves the
    /// timeline unbounded.
    pub fn with_max_days(self, days: f64) -> Result<Self, TimelineError> {
        if !days.is_finite() || days < 0.0 {
            return Err(TimelineError::Configuration(format!(
                "scenario duration bound must be a non-negative number of days, got {}",
                days
            )));
        }
        let Some(start) = self.simulation_start() else {
            return Ok(self);
        };
        // f64 -> i64 casts saturate
        let horizon = Duration::try_milliseconds((days * 86_400_000.0) as i64)
            .and_then(|bound| start.checked_add_signed(bound));
        match horizon {
            Some(horizon) => Ok(self.with_horizon(horizon)),
            None => Ok(self),
        }
    }

    /// Move to `Running` and return the simulated instant the run starts at.
    ///
    /// The start is the earliest pending item, so that item fires without a wait.
    pub fn start(&mut self) -> Option<DateTime<Utc>> {
        self.started = true;
        self.pending().map(ScheduledItem::timestamp)
    }

    pub fn state(&self) -> TimelineState {
        if !self.started {
            TimelineState::NotStarted
        } else if self.pending().is_none() {
            TimelineState::Exhausted
        } else {
            TimelineState::Running
        }
    }

    /// Earliest unfired item at or after `now_simulated`, or `None` when the
    /// timeline is exhausted.
    pub fn peek_next(&self, now_simulated: DateTime<Utc>) -> Option<&ScheduledItem> {
        self.items[self.cursor..]
            .iter()
            .filter(|item| !item.is_fired())
            .take_while(|item| self.within_horizon(item))
            .find(|item| item.timestamp() >= now_simulated)
    }

    /// Record that `item` fired. Only the earliest pending item may fire.
    pub fn mark_fired(&mut self, item: ItemRef) -> Result<(), TimelineError> {
        let index = self
            .items
            .iter()
            .position(|candidate| candidate.item_ref() == item)
            .ok_or(TimelineError::UnknownItem(item))?;

        if self.items[index].is_fired() {
            return Err(TimelineError::AlreadyFired(item));
        }
        if !self.started {
            return Err(TimelineError::NotStarted);
        }
        let expected = self.pending().map(ScheduledItem::item_ref);
        match expected {
            None => return Err(TimelineError::Exhausted),
            Some(expected) if expected != item => {
                return Err(TimelineError::OutOfOrder {
                    expected,
                    got: item,
                })
            }
            Some(_) => {}
        }

        self.items[index]
            .mark_fired()
            .map_err(|_| TimelineError::AlreadyFired(item))?;
        self.advance_cursor();
        Ok(())
    }

    pub fn items(&self) -> &[ScheduledItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Timestamp of the first scheduled item.
    pub fn simulation_start(&self) -> Option<DateTime<Utc>> {
        self.items.first().map(ScheduledItem::timestamp)
    }

    pub fn progress(&self) -> TimelineProgress {
        let total = self.items.len();
        let processed = self.items.iter().filter(|item| item.is_fired()).count();
        let percentage = if total > 0 {
            processed as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        TimelineProgress {
            total,
            processed,
            remaining: total - processed,
            percentage,
        }
    }

    pub fn summary(&self, scale: TimeScale) -> Option<TimelineSummary> {
        let first = self.items.first()?.timestamp();
        let last = self.items.last()?.timestamp();
        let span = last - first;
        let releases = self
            .items
            .iter()
            .filter(|item| item.kind() == ItemKind::Release)
            .count();

        Some(TimelineSummary {
            first,
            last,
            simulated_days: span.num_days(),
            real_minutes: simulated_days(span) * scale.real_seconds_per_sim_day() / 60.0,
            releases,
            events: self.items.len() - releases,
            seconds_per_day: scale.real_seconds_per_sim_day(),
        })
    }

    fn pending(&self) -> Option<&ScheduledItem> {
        self.items
            .get(self.cursor)
            .filter(|item| self.within_horizon(item))
    }

    fn within_horizon(&self, item: &ScheduledItem) -> bool {
        self.horizon
            .map_or(true, |horizon| item.timestamp() <= horizon)
    }

    fn advance_cursor(&mut self) {
        while self
            .items
            .get(self.cursor)
            .is_some_and(ScheduledItem::is_fired)
        {
            self.cursor += 1;
        }
    }
}
