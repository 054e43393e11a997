//! Simulated time and its mapping onto wall-clock time.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

const SECONDS_PER_DAY: f64 = 24.0 * 3600.0;

/// Compression ratio between simulated days and real seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    real_seconds_per_sim_day: f64,
}

impl TimeScale {
    /// Default demo profile: one simulated day lasts two real minutes.
    pub const DEMO_SECONDS_PER_DAY: f64 = 120.0;

    pub fn new(real_seconds_per_sim_day: f64) -> Result<Self, DomainError> {
        if !real_seconds_per_sim_day.is_finite() || real_seconds_per_sim_day <= 0.0 {
            return Err(DomainError::validation(format!(
                "real seconds per simulated day must be positive, got {}",
                real_seconds_per_sim_day
            )));
        }
        Ok(Self {
            real_seconds_per_sim_day,
        })
    }

    pub fn real_seconds_per_sim_day(&self) -> f64 {
        self.real_seconds_per_sim_day
    }

    /// Real seconds that correspond to a simulated gap. Negative gaps stay negative.
    pub fn real_seconds_for(&self, simulated: chrono::Duration) -> f64 {
        simulated_days(simulated) * self.real_seconds_per_sim_day
    }

    /// Simulated time that passes while `real` wall-clock time elapses.
    pub fn simulated_for(&self, real: Duration) -> chrono::Duration {
        let micros =
            real.as_secs_f64() / self.real_seconds_per_sim_day * SECONDS_PER_DAY * 1_000_000.0;
        // f64 -> i64 casts saturate
        chrono::Duration::microseconds(micros.round() as i64)
    }

    /// Simulated clock reading once `real` wall-clock time has passed since
    /// `simulated_now`. Saturates at the last representable instant.
    pub fn advance(&self, simulated_now: DateTime<Utc>, real: Duration) -> DateTime<Utc> {
        simulated_now
            .checked_add_signed(self.simulated_for(real))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Real wait before an item scheduled at `item_timestamp` fires, given the
    /// simulated clock currently reads `simulated_now`.
    ///
    /// Never negative: a target that is not after `simulated_now` yields zero,
    /// so an overrun fires immediately without a catch-up burst on later items.
    pub fn real_delay_for(
        &self,
        simulated_now: DateTime<Utc>,
        item_timestamp: DateTime<Utc>,
    ) -> Duration {
        if item_timestamp <= simulated_now {
            return Duration::ZERO;
        }
        let seconds = self.real_seconds_for(item_timestamp - simulated_now);
        Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self {
            real_seconds_per_sim_day: Self::DEMO_SECONDS_PER_DAY,
        }
    }
}

/// Free-function form of [`TimeScale::real_delay_for`].
pub fn real_delay_for(
    simulated_now: DateTime<Utc>,
    item_timestamp: DateTime<Utc>,
    time_scale: TimeScale,
) -> Duration {
    time_scale.real_delay_for(simulated_now, item_timestamp)
}

/// Fractional number of days in a simulated duration.
pub fn simulated_days(simulated: chrono::Duration) -> f64 {
    match simulated.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0 / SECONDS_PER_DAY,
        None => simulated.num_seconds() as f64 / SECONDS_PER_DAY,
    }
}

/// Parse a stored timestamp.
///
/// Accepts RFC 3339, the short `+00` offset emitted by Postgres, and naive
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` values which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::parse("timestamp is empty"));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    if let Some(base) = trimmed.strip_suffix("+00") {
        let normalized = format!("{}+00:00", base.replace(' ', "T"));
        if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalized) {
            return Ok(parsed.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(DomainError::parse(format!("invalid timestamp '{}'", raw)))
}
