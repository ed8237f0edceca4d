use crate::calendar::WorkingHoursCalendar;
use crate::error::ValidationError;
use crate::task::{ScheduleConstraint, ScheduleInfo, ScheduleModel, ScheduleUnit, TimeLog};
use chrono::{DateTime, Duration, TimeDelta, Utc};

const SECONDS_PER_DAY: i64 = 86_400;
/// Longest span a `TimeDelta` holds, in whole seconds.
const MAX_SPAN_SECONDS: i64 = i64::MAX / 1_000;

/// Turns schedule timings into seconds and dates against one calendar.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleResolver<'a> {
    calendar: &'a WorkingHoursCalendar,
    resolution_seconds: i64,
}

impl<'a> ScheduleResolver<'a> {
    pub fn new(calendar: &'a WorkingHoursCalendar, resolution_seconds: i64) -> Self {
        Self {
            calendar,
            resolution_seconds: resolution_seconds.max(1),
        }
    }

    pub fn calendar(&self) -> &WorkingHoursCalendar {
        self.calendar
    }

    /// Saturates at the longest representable span.
    pub fn to_seconds(&self, timing: f64, unit: ScheduleUnit, model: ScheduleModel) -> i64 {
        self.checked_seconds(timing, unit, model)
            .unwrap_or(if timing < 0.0 { -MAX_SPAN_SECONDS } else { MAX_SPAN_SECONDS })
    }

    /// `None` when the timing is not finite or does not fit in a `TimeDelta`.
    pub fn checked_seconds(
        &self,
        timing: f64,
        unit: ScheduleUnit,
        model: ScheduleModel,
    ) -> Option<i64> {
        let seconds = (timing * self.calendar.unit_seconds(unit, model) as f64).round();
        if !seconds.is_finite() || seconds.abs() > MAX_SPAN_SECONDS as f64 {
            return None;
        }
        Some(seconds as i64)
    }

    pub fn to_unit(&self, seconds: i64, unit: ScheduleUnit, model: ScheduleModel) -> f64 {
        let unit_seconds = self.calendar.unit_seconds(unit, model);
        if unit_seconds == 0 {
            return 0.0;
        }
        seconds as f64 / unit_seconds as f64
    }

    /// Largest unit that expresses `seconds` as a whole number.
    pub fn least_meaningful_unit(&self, seconds: i64, model: ScheduleModel) -> (f64, ScheduleUnit) {
        if seconds == 0 {
            return (0.0, ScheduleUnit::Hour);
        }
        for unit in ScheduleUnit::DESCENDING {
            let unit_seconds = self.calendar.unit_seconds(unit, model);
            if unit_seconds > 0 && seconds % unit_seconds == 0 {
                return ((seconds / unit_seconds) as f64, unit);
            }
        }
        (seconds as f64 / 60.0, ScheduleUnit::Minute)
    }

    /// Rounds to the nearest multiple of the timing resolution, ties upward.
    pub fn round_time(&self, timestamp: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.resolution_seconds;
        let seconds = timestamp.timestamp();
        let rounded = (seconds + step / 2).div_euclid(step) * step;
        DateTime::from_timestamp(rounded, 0).unwrap_or(timestamp)
    }

    pub fn schedule_seconds(&self, info: &ScheduleInfo) -> i64 {
        if info.is_milestone {
            return 0;
        }
        self.to_seconds(info.timing, info.unit, info.model)
    }

    pub fn bid_seconds(&self, info: &ScheduleInfo) -> i64 {
        self.to_seconds(info.bid_timing, info.bid_unit, info.model)
    }

    pub fn refresh(&self, info: &mut ScheduleInfo) {
        info.schedule_seconds = self.schedule_seconds(info);
    }

    /// Refreshes `schedule_seconds` and moves the unpinned side of the range.
    /// Leaves `info` untouched when the timing cannot be placed on a date.
    pub fn resolve(&self, info: &mut ScheduleInfo) -> Result<(), ValidationError> {
        let timing = info.timing;
        let out_of_range =
            || ValidationError::new("schedule_timing", timing, "span is out of the date range");
        let seconds = if info.is_milestone {
            0
        } else {
            self.checked_seconds(info.timing, info.unit, info.model)
                .ok_or_else(out_of_range)?
        };
        let span = TimeDelta::try_seconds(seconds).ok_or_else(out_of_range)?;
        let (start, end) = match info.constraint {
            ScheduleConstraint::None | ScheduleConstraint::Start => (
                info.start,
                info.start.checked_add_signed(span).ok_or_else(out_of_range)?,
            ),
            ScheduleConstraint::End => (
                info.end.checked_sub_signed(span).ok_or_else(out_of_range)?,
                info.end,
            ),
            ScheduleConstraint::Both => (info.start, info.end),
        };
        info.schedule_seconds = seconds;
        info.start = start;
        info.end = end;
        Ok(())
    }

    /// Work logged on a leaf. Effort counts time logs; duration and length
    /// count how much of the planned range has elapsed by `now`.
    pub fn logged_seconds(&self, info: &ScheduleInfo, logs: &[TimeLog], now: DateTime<Utc>) -> i64 {
        match info.model {
            ScheduleModel::Effort => logs.iter().map(TimeLog::seconds).sum(),
            ScheduleModel::Duration => elapsed(info, now).num_seconds(),
            ScheduleModel::Length => {
                let elapsed = elapsed(info, now).num_seconds();
                let daily = self.calendar.daily_working_hours() as i64 * 3600;
                elapsed / SECONDS_PER_DAY * daily + elapsed % SECONDS_PER_DAY
            }
        }
    }
}

fn elapsed(info: &ScheduleInfo, now: DateTime<Utc>) -> Duration {
    if info.start >= now {
        Duration::zero()
    } else if info.end <= now {
        info.end - info.start
    } else {
        now - info.start
    }
}
