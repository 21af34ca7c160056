//! # Time Resolver
//!
//! Picks the model run to request and the forecast lead needed to reach the
//! target instant.
//!
//! GFS runs are published every six hours (00, 06, 12, 18 UTC). The lead is
//! derived from the *whole-day* difference between run and target, so the
//! computed lead is always a multiple of 24 hours. Any partial day between the
//! run and the target is dropped on purpose: the lead has to line up with the
//! lead hours the archive publishes, and the cache file name and archive URL
//! are both built from it.
//!
//! All instants are `DateTime<Utc>`; naive timestamps are never accepted.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use eclipse_clouds::time::{closest_model_run, lead_hours_for_target};
//!
//! let now = Utc.with_ymd_and_hms(2024, 4, 1, 3, 27, 12).unwrap();
//! let run = closest_model_run(now);
//! assert_eq!(run.instant(), Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap());
//!
//! let target = Utc.with_ymd_and_hms(2024, 4, 8, 18, 0, 0).unwrap();
//! let lead = lead_hours_for_target(run, target)?;
//! assert_eq!(lead.hours(), 168);
//! # Ok::<(), eclipse_clouds::error::ForecastError>(())
//! ```

use crate::error::{ForecastError, ForecastResult};
use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};
use std::fmt;

/// Hours between two consecutive model runs
pub const MODEL_RUN_CADENCE_HOURS: u32 = 6;

/// Command-line format of an explicit model run, interpreted as UTC
pub const MODEL_RUN_FORMAT: &str = "%Y%m%dT%H%M";

/// Instant of greatest eclipse over the continental US, 2024-04-08 18:00 UTC
pub const ECLIPSE_TARGET: &str = "2024-04-08T18:00:00Z";

/// Initialization time of a single model run.
///
/// Always on a cadence boundary: `hour % 6 == 0` with zero minutes, seconds
/// and sub-seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModelRun(DateTime<Utc>);

impl ModelRun {
    /// Wraps an instant that already sits on a cadence boundary.
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::InvalidModelRun`] when the instant is not
    /// aligned to the six-hour cadence.
    pub fn new(instant: DateTime<Utc>) -> ForecastResult<Self> {
        let aligned = instant.hour() % MODEL_RUN_CADENCE_HOURS == 0
            && instant.minute() == 0
            && instant.second() == 0
            && instant.nanosecond() == 0;
        if aligned {
            Ok(ModelRun(instant))
        } else {
            Err(ForecastError::InvalidModelRun(format!(
                "{} is not on a {}-hour run boundary",
                instant.format("%Y-%m-%dT%H:%M:%SZ"),
                MODEL_RUN_CADENCE_HOURS
            )))
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    /// `YYYYMMDD` of the run
    pub fn date_stamp(&self) -> String {
        self.0.format("%Y%m%d").to_string()
    }

    /// Zero-padded `HH` of the run
    pub fn hour_stamp(&self) -> String {
        self.0.format("%H").to_string()
    }
}

impl fmt::Display for ModelRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// Whole hours between a model run and the forecasted instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForecastLeadHours(u32);

impl ForecastLeadHours {
    pub fn new(hours: u32) -> Self {
        ForecastLeadHours(hours)
    }

    pub fn hours(&self) -> u32 {
        self.0
    }

    /// Lead hours zero-padded to three digits, as used in archive names
    pub fn padded(&self) -> String {
        format!("{:03}", self.0)
    }
}

impl fmt::Display for ForecastLeadHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Returns the most recent model run at or before `now`.
///
/// Subtracts `now.hour % 6` hours and zeroes everything below the hour.
/// The result is `<= now` and less than six hours behind it.
pub fn closest_model_run(now: DateTime<Utc>) -> ModelRun {
    let delta_hours = now.hour() % MODEL_RUN_CADENCE_HOURS;
    let run = now
        - Duration::hours(i64::from(delta_hours))
        - Duration::minutes(i64::from(now.minute()))
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    ModelRun(run)
}

/// Computes the lead needed to reach `target` from `run`.
///
/// The difference is truncated to whole days before being converted to
/// hours: 2024-04-01T00Z to 2024-04-08T18Z gives 7 days, so 168 hours. The
/// remaining 18 hours do not count.
///
/// # Errors
///
/// Returns [`ForecastError::TargetBeforeRun`] when `target` precedes the run,
/// since no non-negative lead exists.
pub fn lead_hours_for_target(
    run: ModelRun,
    target: DateTime<Utc>,
) -> ForecastResult<ForecastLeadHours> {
    let elapsed = target - run.instant();
    if elapsed < Duration::zero() {
        return Err(ForecastError::TargetBeforeRun {
            run: run.instant(),
            target,
        });
    }

    let days = elapsed.num_days();
    let hours = u32::try_from(days * 24).map_err(|_| {
        ForecastError::InvalidModelRun(format!("lead of {} days is out of range", days))
    })?;
    Ok(ForecastLeadHours(hours))
}

/// Parses an explicit model run given as `YYYYMMDDThhmm` in UTC.
pub fn parse_model_run(s: &str) -> ForecastResult<ModelRun> {
    let naive = NaiveDateTime::parse_from_str(s, MODEL_RUN_FORMAT).map_err(|e| {
        ForecastError::InvalidModelRun(format!(
            "'{}' does not match format YYYYMMDDThhmm: {}",
            s, e
        ))
    })?;
    ModelRun::new(naive.and_utc())
}

/// Parses an RFC 3339 target instant and converts it to UTC.
pub fn parse_target(s: &str) -> ForecastResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            ForecastError::InvalidConfiguration(format!("invalid target instant '{}': {}", s, e))
        })
}
