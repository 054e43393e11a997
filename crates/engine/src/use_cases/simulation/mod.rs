//! Simulation loop.
//!
//! Drives playback: asks the timeline for the next item, waits the real-time
//! equivalent of the simulated gap, then runs the item's unit of work:
//!
//! 1. pre-release narrative (releases only, optional)
//! 2. evolution + history append
//! 3. post-release / event narrative
//! 4. fire flag
//!
//! The fire flag is the last durable write of a unit. Cancellation is only
//! observed while waiting, never inside a unit.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use macrosim_domain::{
    evolution, EvolutionError, MacroState, NarrativeContext, NarrativeRecord,
    ScheduledItem, TimeScale, Timeline, TimelineError, TimelineProgress,
};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::entities::{Catalog, MacroHistory, MacroHistoryError, NarrativeLog};
use crate::infrastructure::ports::{
    ClockPort, LogLevel, NarrativePort, OutputLine, OutputPort, RepoError,
};
use crate::use_cases::narrative::fallback_text;

/// Exit status for a run that finished every reachable item.
pub const EXIT_COMPLETED: i32 = 0;
/// Exit status for a run stopped by an interrupt.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// Raised before the first item fires.
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] RepoError),
    #[error("Macro state not initialized: history is empty")]
    NotInitialized,
    /// Timeline bookkeeping disagreed with the store mid-run.
    #[error("Timeline error: {0}")]
    Timeline(TimelineError),
}

impl SimulationError {
    pub fn exit_code(&self) -> i32 {
        match self {
            SimulationError::Configuration(_) | SimulationError::NotInitialized => 2,
            SimulationError::Persistence(_) | SimulationError::Timeline(_) => 1,
        }
    }
}

impl From<MacroHistoryError> for SimulationError {
    fn from(value: MacroHistoryError) -> Self {
        match value {
            MacroHistoryError::Repo(e) => SimulationError::Persistence(e),
            MacroHistoryError::Evolution(EvolutionError::NotInitialized) => {
                SimulationError::NotInitialized
            }
        }
    }
}

/// Playback knobs, read once at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationSettings {
    pub time_scale: TimeScale,
    /// Simulated days after the first item beyond which nothing fires.
    pub max_days: Option<f64>,
    pub pre_release_narratives: bool,
    /// History records shown to the pre-release narrator.
    pub history_window: u32,
    /// Fire items back to back without waiting out the simulated gaps.
    pub fast_forward: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            time_scale: TimeScale::default(),
            max_days: None,
            pre_release_narratives: true,
            history_window: 3,
            fast_forward: false,
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub fired: usize,
    pub narrative_failures: usize,
    pub final_state: MacroState,
    pub progress: TimelineProgress,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed(RunReport),
    Interrupted(RunReport),
}

impl RunOutcome {
    pub fn report(&self) -> &RunReport {
        match self {
            RunOutcome::Completed(report) | RunOutcome::Interrupted(report) => report,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(_) => EXIT_COMPLETED,
            RunOutcome::Interrupted(_) => EXIT_INTERRUPTED,
        }
    }
}

/// Counters carried through the loop.
struct RunTally {
    fired: usize,
    narrative_failures: usize,
    state: MacroState,
}

/// Replays the unfired catalog against the macro history.
pub struct RunSimulation {
    catalog: Arc<Catalog>,
    history: Arc<MacroHistory>,
    narratives: Arc<NarrativeLog>,
    narrator: Arc<dyn NarrativePort>,
    output: Arc<dyn OutputPort>,
    clock: Arc<dyn ClockPort>,
    settings: SimulationSettings,
}

impl RunSimulation {
    pub fn new(
        catalog: Arc<Catalog>,
        history: Arc<MacroHistory>,
        narratives: Arc<NarrativeLog>,
        narrator: Arc<dyn NarrativePort>,
        output: Arc<dyn OutputPort>,
        clock: Arc<dyn ClockPort>,
        settings: SimulationSettings,
    ) -> Self {
        Self {
            catalog,
            history,
            narratives,
            narrator,
            output,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Load the timeline and the current state. Nothing fires here, so every
    /// error is a configuration problem or an unreadable store.
    pub async fn prepare(&self) -> Result<(Timeline, MacroState), SimulationError> {
        let items = self.catalog.unfired_items().await.map_err(|e| match e {
            // An undecodable catalog row is a malformed item, not a failed write.
            RepoError::Serialization(reason) => {
                SimulationError::Configuration(format!("unreadable catalog item: {reason}"))
            }
            other => SimulationError::Persistence(other),
        })?;
        let mut timeline = Timeline::initialize(items)
            .map_err(|e| SimulationError::Configuration(e.to_string()))?;
        if let Some(days) = self.settings.max_days {
            timeline = timeline
                .with_max_days(days)
                .map_err(|e| SimulationError::Configuration(e.to_string()))?;
        }
        let state = self.history.current_state().await?;
        Ok((timeline, state))
    }

    /// Run until the timeline is exhausted or `cancel` fires during a wait.
    pub async fn execute(&self, cancel: CancellationToken) -> Result<RunOutcome, SimulationError> {
        let started_at = self.clock.now();
        let (mut timeline, state) = self.prepare().await?;
        let scale = self.settings.time_scale;

        if let Some(summary) = timeline.summary(scale) {
            for line in summary.to_string().lines() {
                self.output.render(OutputLine::system(LogLevel::Info, line));
            }
        }
        self.output.render(OutputLine::MacroState {
            state,
            regime: state.regime(),
        });

        let mut tally = RunTally {
            fired: 0,
            narrative_failures: 0,
            state,
        };

        let Some(mut sim_now) = timeline.start() else {
            tracing::info!("No unfired items, nothing to play back");
            self.output.render(OutputLine::system(
                LogLevel::Info,
                "No unfired items in the catalog",
            ));
            return Ok(RunOutcome::Completed(self.report(&timeline, &tally, started_at)));
        };

        tracing::info!(
            items = timeline.len(),
            start = %sim_now,
            seconds_per_day = scale.real_seconds_per_sim_day(),
            "Starting playback"
        );

        // Processing time of a unit is charged against the gap to the next item.
        let mut unit_started = Instant::now();

        while let Some(item) = timeline.peek_next(sim_now).cloned() {
            let sim_clock = scale.advance(sim_now, unit_started.elapsed());
            let delay = if self.settings.fast_forward {
                Duration::ZERO
            } else {
                scale.real_delay_for(sim_clock, item.timestamp())
            };
            tracing::debug!(
                item = %item.item_ref(),
                delay_ms = delay.as_millis() as u64,
                "Waiting for next item"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(pending = %item.item_ref(), "Playback interrupted");
                    self.output.render(OutputLine::system_at(
                        LogLevel::Warning,
                        "Simulation interrupted",
                        sim_clock,
                    ));
                    return Ok(RunOutcome::Interrupted(self.report(&timeline, &tally, started_at)));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            unit_started = Instant::now();
            self.fire(&item, &mut timeline, &mut tally).await?;
            sim_now = item.timestamp();
        }

        let report = self.report(&timeline, &tally, started_at);
        tracing::info!(
            fired = report.fired,
            narrative_failures = report.narrative_failures,
            "Playback completed"
        );
        self.output.render(OutputLine::system(
            LogLevel::Success,
            format!(
                "Simulation completed: {} items fired ({:.1}% of timeline)",
                report.fired, report.progress.percentage
            ),
        ));
        Ok(RunOutcome::Completed(report))
    }

    /// One item's unit of work.
    async fn fire(
        &self,
        item: &ScheduledItem,
        timeline: &mut Timeline,
        tally: &mut RunTally,
    ) -> Result<(), SimulationError> {
        let item_ref = item.item_ref();
        let at = item.timestamp();

        self.output.render(OutputLine::Header {
            title: item.summary(),
            at,
        });

        if let Some(release) = item
            .as_release()
            .filter(|_| self.settings.pre_release_narratives)
        {
            let recent = self.history.recent(self.settings.history_window).await?;
            let context = NarrativeContext::pre_release(release, tally.state, recent);
            self.narrate(&context, item, tally).await?;
        }

        let before = tally.state;
        let transition = evolution::apply(&before, item.impact(), item.cause(), at);
        self.history.append(&transition.record).await?;
        tally.state = transition.next;

        tracing::info!(
            item = %item_ref,
            kind = %item.kind(),
            sim_time = %at,
            growth = transition.next.growth,
            inflation = transition.next.inflation,
            volatility = transition.next.volatility,
            "Applied impact"
        );
        self.output.render(OutputLine::MacroState {
            state: transition.next,
            regime: transition.next.regime(),
        });

        let context = NarrativeContext::resolved(item, before, transition.next);
        self.narrate(&context, item, tally).await?;

        self.catalog.mark_fired(item_ref).await?;
        timeline
            .mark_fired(item_ref)
            .map_err(SimulationError::Timeline)?;
        tally.fired += 1;

        Ok(())
    }

    /// Generate, persist and render one narrative. Generation failures are
    /// rendered as a placeholder and not persisted; store failures are fatal.
    async fn narrate(
        &self,
        context: &NarrativeContext,
        item: &ScheduledItem,
        tally: &mut RunTally,
    ) -> Result<(), SimulationError> {
        let kind = context.kind();
        let at = item.timestamp();

        let content = match self.narrator.generate(context).await {
            Ok(text) => {
                let record = NarrativeRecord::new(at, kind, text, item.item_ref());
                self.narratives.append(&record).await?;
                record.content
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    item = %item.item_ref(),
                    kind = %kind,
                    "Narrative generation failed, continuing without it"
                );
                tally.narrative_failures += 1;
                fallback_text(kind).to_string()
            }
        };

        self.output.render(OutputLine::Narrative {
            kind,
            label: item.label().to_string(),
            content,
            at,
        });
        Ok(())
    }

    fn report(&self, timeline: &Timeline, tally: &RunTally, started_at: DateTime<Utc>) -> RunReport {
        RunReport {
            fired: tally.fired,
            narrative_failures: tally.narrative_failures,
            final_state: tally.state,
            progress: timeline.progress(),
            started_at,
            finished_at: self.clock.now(),
        }
    }
}
