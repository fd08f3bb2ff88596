//! Daily and weekly reports
//!
//! Reports are read-only views over persisted outcomes, bucketed by UTC
//! calendar day.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

use crate::contracts::monitoring::percentage;
use crate::contracts::{DailyReport, DailyTrendPoint, EntityTypeSummary, ValidationOutcome, WeeklyReport};

/// `[start, end)` of a UTC calendar day
pub fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[derive(Default)]
struct Tally {
    total: usize,
    successful: usize,
}

impl Tally {
    fn add(&mut self, outcome: &ValidationOutcome) {
        self.total += 1;
        if outcome.is_valid {
            self.successful += 1;
        }
    }

    fn failed(&self) -> usize {
        self.total - self.successful
    }
}

/// Per-entity-type totals for outcomes validated on `date`
pub fn daily_report(outcomes: &[ValidationOutcome], date: NaiveDate, generated_at: DateTime<Utc>) -> DailyReport {
    let (start, end) = day_bounds(date);
    let mut overall = Tally::default();
    let mut by_type: BTreeMap<&str, Tally> = BTreeMap::new();

    for outcome in outcomes
        .iter()
        .filter(|o| o.validated_at >= start && o.validated_at < end)
    {
        overall.add(outcome);
        by_type.entry(outcome.entity_type.as_str()).or_default().add(outcome);
    }

    DailyReport {
        date,
        total: overall.total,
        successful: overall.successful,
        failed: overall.failed(),
        success_rate: percentage(overall.successful, overall.total),
        by_entity_type: by_type
            .into_iter()
            .map(|(entity_type, tally)| EntityTypeSummary {
                entity_type: entity_type.to_string(),
                total: tally.total,
                successful: tally.successful,
                failed: tally.failed(),
                success_rate: percentage(tally.successful, tally.total),
            })
            .collect(),
        generated_at,
    }
}

/// Seven-day trend ending on `end_date` (inclusive), one point per day
pub fn weekly_report(outcomes: &[ValidationOutcome], end_date: NaiveDate, generated_at: DateTime<Utc>) -> WeeklyReport {
    let start_date = end_date - Duration::days(6);
    let mut overall = Tally::default();
    let mut daily = Vec::with_capacity(7);

    for date in start_date.iter_days().take(7) {
        let (start, end) = day_bounds(date);
        let mut tally = Tally::default();
        for outcome in outcomes
            .iter()
            .filter(|o| o.validated_at >= start && o.validated_at < end)
        {
            tally.add(outcome);
            overall.add(outcome);
        }
        daily.push(DailyTrendPoint {
            date,
            total: tally.total,
            successful: tally.successful,
            failed: tally.failed(),
            success_rate: percentage(tally.successful, tally.total),
        });
    }

    WeeklyReport {
        start_date,
        end_date,
        total: overall.total,
        successful: overall.successful,
        failed: overall.failed(),
        success_rate: percentage(overall.successful, overall.total),
        daily,
        generated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ValidationIssue;
    use chrono::TimeZone;

    fn outcome_at(entity_type: &str, valid: bool, at: DateTime<Utc>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::new(entity_type, None);
        if !valid {
            outcome.errors.push(ValidationIssue::new("x", "required", "missing"));
            outcome.refresh();
        }
        outcome.validated_at = at;
        outcome
    }

    #[test]
    fn test_daily_report_groups_by_entity_type() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let noon = Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap();
        let outcomes = vec![
            outcome_at("contact", true, noon),
            outcome_at("contact", false, noon),
            outcome_at("workflow", true, noon),
            outcome_at("contact", false, noon + Duration::days(1)),
        ];

        let report = daily_report(&outcomes, day, noon);
        assert_eq!(report.total, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.by_entity_type.len(), 2);
        assert_eq!(report.by_entity_type[0].entity_type, "contact");
        assert!((report.by_entity_type[0].success_rate - 50.0).abs() < f64::EPSILON);
        assert!((report.by_entity_type[1].success_rate - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_day() {
        let day = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let report = daily_report(&[], day, Utc::now());
        assert_eq!(report.total, 0);
        assert_eq!(report.success_rate, 0.0);
        assert!(report.by_entity_type.is_empty());
    }

    #[test]
    fn test_weekly_trend_has_seven_points() {
        let end = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let outcomes = vec![
            outcome_at("contact", true, Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()),
            outcome_at("contact", false, Utc.with_ymd_and_hms(2024, 3, 10, 23, 59, 59).unwrap()),
            outcome_at("contact", true, Utc.with_ymd_and_hms(2024, 3, 3, 23, 59, 59).unwrap()),
        ];

        let report = weekly_report(&outcomes, end, Utc::now());
        assert_eq!(report.start_date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(report.daily.len(), 7);
        assert_eq!(report.total, 2);
        assert_eq!(report.daily[0].total, 1);
        assert_eq!(report.daily[6].failed, 1);
        assert!((report.success_rate - 50.0).abs() < f64::EPSILON);
    }
}
