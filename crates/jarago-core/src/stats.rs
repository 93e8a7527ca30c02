//! Derived views over the record list.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::SleepRecord;

/// One bar of the weekly chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySleep {
    pub record_id: Uuid,
    pub date: DateTime<Utc>,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SleepStats {
    pub record_count: usize,
    pub average_hours: f64,
    pub goal_hours: f64,
    /// Records whose duration reached the goal.
    pub goal_met_count: usize,
    /// Last seven days, oldest first.
    pub last_7_days: Vec<DailySleep>,
}

/// The `limit` most recent records by descending date (ties: later bedtime first).
pub fn recent(records: &[SleepRecord], limit: usize) -> Vec<SleepRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| b.date.cmp(&a.date).then(b.bedtime.cmp(&a.bedtime)));
    sorted.truncate(limit);
    sorted
}

/// Mean duration in hours; exactly 0 for an empty list.
pub fn average_duration_hours(records: &[SleepRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let total: f64 = records.iter().map(SleepRecord::duration_hours).sum();
    total / records.len() as f64
}

/// Records whose `date` lies in `[now - days, now]`, in store order.
pub fn in_last_n_days(records: &[SleepRecord], days: u32, now: DateTime<Utc>) -> Vec<SleepRecord> {
    let start = now - Duration::days(i64::from(days));
    records
        .iter()
        .filter(|r| r.date >= start && r.date <= now)
        .cloned()
        .collect()
}

pub fn summarize(records: &[SleepRecord], goal_hours: f64, now: DateTime<Utc>) -> SleepStats {
    let mut last_7_days: Vec<DailySleep> = in_last_n_days(records, 7, now)
        .into_iter()
        .map(|r| DailySleep {
            record_id: r.id,
            date: r.date,
            hours: r.duration_hours(),
        })
        .collect();
    last_7_days.sort_by(|a, b| a.date.cmp(&b.date));

    SleepStats {
        record_count: records.len(),
        average_hours: average_duration_hours(records),
        goal_hours,
        goal_met_count: records
            .iter()
            .filter(|r| r.duration_hours() >= goal_hours)
            .count(),
        last_7_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn night(day: u32, hours: i64) -> SleepRecord {
        let bed = Utc.with_ymd_and_hms(2025, 8, day, 12, 0, 0).unwrap();
        SleepRecord::new(bed, bed + Duration::hours(hours), 3, "", Vec::new()).unwrap()
    }

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average_duration_hours(&[]), 0.0);
    }

    #[test]
    fn average_is_mean_hours() {
        let records = vec![night(1, 6), night(2, 8), night(3, 7)];
        assert_eq!(average_duration_hours(&records), 7.0);
    }

    #[test]
    fn recent_takes_latest_seven_descending() {
        let records: Vec<_> = (1..=10).map(|d| night(d, 7)).collect();
        let latest = recent(&records, 7);
        assert_eq!(latest.len(), 7);
        assert_eq!(latest[0].id, records[9].id);
        assert_eq!(latest[6].id, records[3].id);
        assert!(latest.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[test]
    fn last_n_days_window_is_inclusive() {
        let records: Vec<_> = (1..=10).map(|d| night(d, 7)).collect();
        let now = records[9].date + Duration::hours(20);
        let window = in_last_n_days(&records, 3, now);
        assert!(window.iter().all(|r| r.date >= now - Duration::days(3)));
        assert!(window.iter().any(|r| r.id == records[9].id));
        assert!(!window.iter().any(|r| r.id == records[0].id));

        let exact = in_last_n_days(&records, 0, records[9].date);
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn summary_counts_goal_hits_and_orders_chart() {
        let records = vec![night(9, 8), night(8, 6), night(7, 9)];
        let now = records[0].date + Duration::hours(12);
        let stats = summarize(&records, 8.0, now);
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.goal_met_count, 2);
        assert_eq!(stats.goal_hours, 8.0);
        assert_eq!(stats.last_7_days.len(), 3);
        assert!(stats.last_7_days.windows(2).all(|w| w[0].date <= w[1].date));
    }

    proptest! {
        #[test]
        fn average_lies_between_min_and_max(hours in proptest::collection::vec(0i64..16, 1..20)) {
            let records: Vec<_> = hours.iter().enumerate()
                .map(|(i, h)| night((i % 28) as u32 + 1, *h))
                .collect();
            let avg = average_duration_hours(&records);
            let min = *hours.iter().min().unwrap() as f64;
            let max = *hours.iter().max().unwrap() as f64;
            prop_assert!(avg >= min - 1e-9 && avg <= max + 1e-9);
        }
    }
}
