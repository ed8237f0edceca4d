use chrono::{Duration, TimeZone, Utc, Weekday};
use proptest::prelude::*;
use serde_json::json;
use studio_schedule::calendar::{WorkingHoursCalendar, WorkingHoursConfig, WorkingRange};
use studio_schedule::task::{ScheduleModel, ScheduleUnit};

fn working_minutes_in_week(calendar: &WorkingHoursCalendar) -> u32 {
    // 2024-01-01 is a Monday
    let monday = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..7 * 24 * 60)
        .filter(|minute| calendar.is_working_hour(&(monday + Duration::minutes(*minute))))
        .count() as u32
}

#[test]
fn default_calendar_is_office_hours_on_weekdays() {
    let cal = WorkingHoursCalendar::default();
    assert_eq!(cal.ranges(Weekday::Mon), &[WorkingRange::new(540, 1080).unwrap()]);
    assert!(cal.ranges(Weekday::Sat).is_empty());
    assert!(cal.ranges(Weekday::Sun).is_empty());
    assert_eq!(cal.daily_working_hours(), 9);
    assert_eq!(cal.weekly_working_minutes(), 5 * 540);
    assert_eq!(cal.weekly_working_hours(), 45.0);
    assert_eq!(cal.weekly_working_days(), 5);
    assert_eq!(cal.yearly_working_days(), 261);
}

#[test]
fn range_end_is_exclusive() {
    let cal = WorkingHoursCalendar::default();
    // Wednesday
    let nine = Utc.with_ymd_and_hms(2024, 1, 3, 9, 0, 0).unwrap();
    let six = Utc.with_ymd_and_hms(2024, 1, 3, 18, 0, 0).unwrap();
    assert!(cal.is_working_hour(&nine));
    assert!(cal.is_working_hour(&(six - Duration::minutes(1))));
    assert!(!cal.is_working_hour(&six));
    assert!(!cal.is_working_hour(&(nine - Duration::minutes(1))));
}

#[test]
fn weekly_sampling_matches_weekly_hours() {
    let cal = WorkingHoursCalendar::default();
    assert_eq!(
        working_minutes_in_week(&cal) as f64,
        cal.weekly_working_hours() * 60.0
    );
}

#[test]
fn utc_offset_shifts_working_window() {
    let cal = WorkingHoursCalendar::new(9, 60).unwrap();
    // 08:30 UTC is 09:30 at +01:00
    let early = Utc.with_ymd_and_hms(2024, 1, 3, 8, 30, 0).unwrap();
    assert!(cal.is_working_hour(&early));
    let late = Utc.with_ymd_and_hms(2024, 1, 3, 17, 30, 0).unwrap();
    assert!(!cal.is_working_hour(&late));
    assert_eq!(working_minutes_in_week(&cal), cal.weekly_working_minutes());
}

#[test]
fn malformed_ranges_name_the_weekday() {
    let mut cal = WorkingHoursCalendar::default();

    let err = cal.set_ranges(Weekday::Tue, &json!([[600, 540]])).unwrap_err();
    assert_eq!(err.field, "working_hours.tue");

    let err = cal.set_ranges(Weekday::Fri, &json!([[540]])).unwrap_err();
    assert_eq!(err.field, "working_hours.fri");

    let err = cal.set_ranges(Weekday::Mon, &json!([["9", 1080]])).unwrap_err();
    assert_eq!(err.field, "working_hours.mon");

    let err = cal.set_ranges(Weekday::Wed, &json!([[0, 1500]])).unwrap_err();
    assert_eq!(err.field, "working_hours.wed");

    let err = cal.set_ranges(Weekday::Thu, &json!(540)).unwrap_err();
    assert_eq!(err.field, "working_hours.thu");
}

#[test]
fn overlapping_ranges_are_rejected_and_state_is_kept() {
    let mut cal = WorkingHoursCalendar::default();
    let before = cal.clone();
    assert!(
        cal.set_ranges(Weekday::Mon, &json!([[540, 720], [700, 1080]]))
            .is_err()
    );
    assert_eq!(cal, before);
}

#[test]
fn ranges_are_sorted_on_assignment() {
    let mut cal = WorkingHoursCalendar::default();
    cal.set_ranges(Weekday::Sat, &json!([[780, 960], [540, 720]]))
        .unwrap();
    let sat = cal.ranges(Weekday::Sat);
    assert_eq!(sat[0].start(), 540);
    assert_eq!(sat[1].start(), 780);
    assert_eq!(cal.weekly_working_days(), 6);
}

#[test]
fn from_config_keeps_fallback_for_missing_days() {
    let mut raw = WorkingHoursConfig::new();
    raw.insert("sat".to_string(), json!([[600, 840]]));
    let cal = WorkingHoursCalendar::from_config(&raw, &WorkingHoursCalendar::default()).unwrap();
    assert_eq!(cal.ranges(Weekday::Mon).len(), 1);
    assert_eq!(cal.ranges(Weekday::Sat)[0].minutes(), 240);
    assert!(cal.ranges(Weekday::Sun).is_empty());

    raw.insert("someday".to_string(), json!([]));
    assert!(WorkingHoursCalendar::from_config(&raw, &WorkingHoursCalendar::default()).is_err());
}

#[test]
fn config_round_trips_through_to_config() {
    let mut cal = WorkingHoursCalendar::default();
    cal.set_ranges(Weekday::Sun, &json!([[600, 660]])).unwrap();
    let rebuilt =
        WorkingHoursCalendar::from_config(&cal.to_config(), &WorkingHoursCalendar::default())
            .unwrap();
    assert_eq!(rebuilt, cal);
}

#[test]
fn export_lists_every_day_in_order() {
    let mut cal = WorkingHoursCalendar::default();
    cal.set_ranges(Weekday::Wed, &json!([[540, 720], [780, 1080]]))
        .unwrap();
    let export = cal.to_calendar_export();
    let lines: Vec<&str> = export.lines().collect();
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[0], "workinghours mon 09:00 - 18:00");
    assert_eq!(lines[2], "workinghours wed 09:00 - 12:00, 13:00 - 18:00");
    assert_eq!(lines[5], "workinghours sat off");
    assert_eq!(lines[6], "workinghours sun off");
}

#[test]
fn unit_seconds_follow_model() {
    let cal = WorkingHoursCalendar::default();
    assert_eq!(cal.unit_seconds(ScheduleUnit::Day, ScheduleModel::Effort), 9 * 3600);
    assert_eq!(cal.unit_seconds(ScheduleUnit::Day, ScheduleModel::Duration), 86_400);
    assert_eq!(cal.unit_seconds(ScheduleUnit::Week, ScheduleModel::Length), 45 * 3600);
    assert_eq!(cal.unit_seconds(ScheduleUnit::Month, ScheduleModel::Effort), 4 * 45 * 3600);
    assert_eq!(
        cal.unit_seconds(ScheduleUnit::Year, ScheduleModel::Effort),
        261 * 9 * 3600
    );
    assert_eq!(cal.unit_seconds(ScheduleUnit::Minute, ScheduleModel::Duration), 60);
}

#[test]
fn daily_hours_must_fit_a_day() {
    assert!(WorkingHoursCalendar::new(0, 0).is_err());
    assert!(WorkingHoursCalendar::new(25, 0).is_err());
    assert!(WorkingHoursCalendar::new(24, 0).is_ok());
    assert!(WorkingHoursCalendar::new(8, 24 * 60).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn sampled_minutes_equal_weekly_minutes(
        day in 0usize..7,
        start in 0u32..1380,
        length in 1u32..=60,
    ) {
        let mut cal = WorkingHoursCalendar::default();
        let weekday = WorkingHoursCalendar::ALL_WEEKDAYS[day];
        cal.set_ranges(weekday, &json!([[start, start + length]])).unwrap();
        prop_assert_eq!(working_minutes_in_week(&cal), cal.weekly_working_minutes());
        prop_assert_eq!(
            working_minutes_in_week(&cal) as f64,
            cal.weekly_working_hours() * 60.0
        );
    }
}
