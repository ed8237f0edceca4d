use crate::error::ValidationError;
use crate::task::{ScheduleModel, ScheduleUnit};
use chrono::{DateTime, Datelike, FixedOffset, Offset, TimeZone, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

pub const MINUTES_PER_DAY: u32 = 1440;

/// Raw per-day working hours keyed by `mon`..`sun`, each a list of
/// `[start, end]` minute pairs. Kept untyped so bad input can be reported.
pub type WorkingHoursConfig = BTreeMap<String, Value>;

/// Half-open range of minutes within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkingRange {
    start: u32,
    end: u32,
}

impl WorkingRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ValidationError> {
        if end > MINUTES_PER_DAY {
            return Err(ValidationError::new(
                "working_hours",
                format!("[{start}, {end}]"),
                "range bounds must be within 0..=1440",
            ));
        }
        if start >= end {
            return Err(ValidationError::new(
                "working_hours",
                format!("[{start}, {end}]"),
                "range start must be before its end",
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn minutes(&self) -> u32 {
        self.end - self.start
    }

    pub fn contains(&self, minute: u32) -> bool {
        self.start <= minute && minute < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingHoursCalendar {
    days: [Vec<WorkingRange>; 7],
    daily_working_hours: u8,
    utc_offset_minutes: i32,
}

impl Default for WorkingHoursCalendar {
    fn default() -> Self {
        Self {
            days: Self::default_days(),
            daily_working_hours: 9,
            utc_offset_minutes: 0,
        }
    }
}

impl WorkingHoursCalendar {
    pub const ALL_WEEKDAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    /// Mon-Fri 09:00-18:00, weekend off.
    fn default_days() -> [Vec<WorkingRange>; 7] {
        let office = WorkingRange {
            start: 540,
            end: 1080,
        };
        [
            vec![office],
            vec![office],
            vec![office],
            vec![office],
            vec![office],
            Vec::new(),
            Vec::new(),
        ]
    }

    pub fn new(daily_working_hours: u8, utc_offset_minutes: i32) -> Result<Self, ValidationError> {
        let mut calendar = Self::default();
        calendar.set_daily_working_hours(daily_working_hours)?;
        calendar.set_utc_offset_minutes(utc_offset_minutes)?;
        Ok(calendar)
    }

    /// Builds a calendar from raw ranges. Days missing from `raw` keep the
    /// ranges of `fallback`, as do the daily hours and time zone.
    pub fn from_config(
        raw: &WorkingHoursConfig,
        fallback: &WorkingHoursCalendar,
    ) -> Result<Self, ValidationError> {
        let parsed = Self::validate(raw)?;
        let mut calendar = fallback.clone();
        for (slot, ranges) in calendar.days.iter_mut().zip(parsed) {
            if let Some(ranges) = ranges {
                *slot = ranges;
            }
        }
        Ok(calendar)
    }

    /// Re-runs every check on a calendar that did not come through the
    /// setters, such as one read back from storage.
    pub fn checked(&self) -> Result<Self, ValidationError> {
        let base = Self::new(self.daily_working_hours, self.utc_offset_minutes)?;
        Self::from_config(&self.to_config(), &base)
    }

    pub fn to_config(&self) -> WorkingHoursConfig {
        Self::ALL_WEEKDAYS
            .iter()
            .map(|day| {
                let ranges = self
                    .ranges(*day)
                    .iter()
                    .map(|range| Value::from(vec![range.start, range.end]))
                    .collect::<Vec<_>>();
                (day_key(*day).to_string(), Value::from(ranges))
            })
            .collect()
    }

    /// Parses every day in `raw`. Index `i` of the result is weekday `i`
    /// (Monday first), `None` where the day was not given.
    pub fn validate(
        raw: &WorkingHoursConfig,
    ) -> Result<[Option<Vec<WorkingRange>>; 7], ValidationError> {
        let mut parsed: [Option<Vec<WorkingRange>>; 7] = Default::default();
        for (key, value) in raw {
            let day = parse_day_key(key)?;
            parsed[day.num_days_from_monday() as usize] = Some(Self::validate_day(day, value)?);
        }
        Ok(parsed)
    }

    pub fn validate_day(day: Weekday, value: &Value) -> Result<Vec<WorkingRange>, ValidationError> {
        let field = field_for(day);
        let Some(items) = value.as_array() else {
            return Err(ValidationError::new(
                field,
                value,
                "expected a list of [start, end] ranges",
            ));
        };

        let mut ranges = Vec::with_capacity(items.len());
        for item in items {
            let bounds = match item.as_array() {
                Some(bounds) if bounds.len() == 2 => bounds,
                _ => {
                    return Err(ValidationError::new(
                        field,
                        item,
                        "each range must be a list of exactly two integers",
                    ));
                }
            };
            let start = minute_bound(field, item, &bounds[0])?;
            let end = minute_bound(field, item, &bounds[1])?;
            let range = WorkingRange::new(start, end)
                .map_err(|err| ValidationError::new(field, item, err.reason))?;
            ranges.push(range);
        }

        ranges.sort();
        for pair in ranges.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(ValidationError::new(field, value, "ranges must not overlap"));
            }
        }
        Ok(ranges)
    }

    pub fn ranges(&self, day: Weekday) -> &[WorkingRange] {
        &self.days[day.num_days_from_monday() as usize]
    }

    pub fn set_ranges(&mut self, day: Weekday, value: &Value) -> Result<(), ValidationError> {
        let ranges = Self::validate_day(day, value)?;
        self.days[day.num_days_from_monday() as usize] = ranges;
        Ok(())
    }

    pub fn daily_working_hours(&self) -> u8 {
        self.daily_working_hours
    }

    pub fn set_daily_working_hours(&mut self, hours: u8) -> Result<(), ValidationError> {
        if hours == 0 || hours > 24 {
            return Err(ValidationError::new(
                "daily_working_hours",
                hours,
                "must be in 1..=24",
            ));
        }
        self.daily_working_hours = hours;
        Ok(())
    }

    pub fn utc_offset_minutes(&self) -> i32 {
        self.utc_offset_minutes
    }

    pub fn set_utc_offset_minutes(&mut self, minutes: i32) -> Result<(), ValidationError> {
        if minutes.unsigned_abs() >= MINUTES_PER_DAY {
            return Err(ValidationError::new(
                "utc_offset_minutes",
                minutes,
                "must be less than a day in either direction",
            ));
        }
        self.utc_offset_minutes = minutes;
        Ok(())
    }

    fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or(Utc.fix())
    }

    pub fn is_working_hour<Tz: TimeZone>(&self, timestamp: &DateTime<Tz>) -> bool {
        let local = timestamp.with_timezone(&self.offset());
        let minute = local.hour() * 60 + local.minute();
        self.ranges(local.weekday())
            .iter()
            .any(|range| range.contains(minute))
    }

    pub fn weekly_working_minutes(&self) -> u32 {
        self.days
            .iter()
            .flat_map(|ranges| ranges.iter())
            .map(WorkingRange::minutes)
            .sum()
    }

    pub fn weekly_working_hours(&self) -> f64 {
        self.weekly_working_minutes() as f64 / 60.0
    }

    pub fn weekly_working_days(&self) -> u32 {
        self.days.iter().filter(|ranges| !ranges.is_empty()).count() as u32
    }

    /// `weekly_working_days * 365 / 7`, rounded up.
    pub fn yearly_working_days(&self) -> u32 {
        (self.weekly_working_days() * 365).div_ceil(7)
    }

    /// Seconds in one `unit` of the given model. Effort and length count
    /// working time; duration counts wall-clock time.
    pub fn unit_seconds(&self, unit: ScheduleUnit, model: ScheduleModel) -> i64 {
        let daily = self.daily_working_hours as i64 * 3600;
        let weekly = self.weekly_working_minutes() as i64 * 60;
        match (model, unit) {
            (_, ScheduleUnit::Minute) => 60,
            (_, ScheduleUnit::Hour) => 3600,
            (ScheduleModel::Duration, ScheduleUnit::Day) => 86_400,
            (ScheduleModel::Duration, ScheduleUnit::Week) => 604_800,
            (ScheduleModel::Duration, ScheduleUnit::Month) => 2_419_200,
            (ScheduleModel::Duration, ScheduleUnit::Year) => 31_536_000,
            (_, ScheduleUnit::Day) => daily,
            (_, ScheduleUnit::Week) => weekly,
            (_, ScheduleUnit::Month) => 4 * weekly,
            (_, ScheduleUnit::Year) => self.yearly_working_days() as i64 * daily,
        }
    }

    /// `workinghours` lines for the scheduler input, Monday first.
    pub fn to_calendar_export(&self) -> String {
        let mut out = String::new();
        for day in Self::ALL_WEEKDAYS {
            let ranges = self.ranges(day);
            let _ = write!(out, "workinghours {} ", day_key(day));
            if ranges.is_empty() {
                out.push_str("off");
            } else {
                let parts = ranges
                    .iter()
                    .map(|range| format!("{} - {}", clock(range.start), clock(range.end)))
                    .collect::<Vec<_>>();
                out.push_str(&parts.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

pub fn day_key(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thu",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
        Weekday::Sun => "sun",
    }
}

fn parse_day_key(key: &str) -> Result<Weekday, ValidationError> {
    WorkingHoursCalendar::ALL_WEEKDAYS
        .into_iter()
        .find(|day| day_key(*day) == key.trim().to_ascii_lowercase())
        .ok_or_else(|| ValidationError::new("working_hours", key, "unknown weekday"))
}

fn field_for(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "working_hours.mon",
        Weekday::Tue => "working_hours.tue",
        Weekday::Wed => "working_hours.wed",
        Weekday::Thu => "working_hours.thu",
        Weekday::Fri => "working_hours.fri",
        Weekday::Sat => "working_hours.sat",
        Weekday::Sun => "working_hours.sun",
    }
}

fn minute_bound(field: &'static str, item: &Value, bound: &Value) -> Result<u32, ValidationError> {
    let minute = bound
        .as_i64()
        .ok_or_else(|| ValidationError::new(field, item, "range bounds must be integers"))?;
    if !(0..=MINUTES_PER_DAY as i64).contains(&minute) {
        return Err(ValidationError::new(
            field,
            item,
            "range bounds must be within 0..=1440",
        ));
    }
    Ok(minute as u32)
}

fn clock(minutes: u32) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
