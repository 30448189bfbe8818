use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::{ConfigError, ScheduleConfig};

/// Resolved schedule: timezone, sorted anchors and cycle interval.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub tz: Tz,
    pub anchors: Vec<NaiveTime>,
    pub interval: Duration,
}

impl Schedule {
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            tz: config.tz().map_err(ConfigError::Validation)?,
            anchors: config.anchor_times().map_err(ConfigError::Validation)?,
            interval: config.interval(),
        })
    }

    /// Next anchor strictly after `now`, in the schedule's timezone.
    pub fn next_anchor(&self, now: DateTime<Utc>) -> Option<DateTime<Tz>> {
        next_anchor_after(&now.with_timezone(&self.tz), &self.anchors)
    }
}

/// Earliest anchor strictly after `now`; when every anchor of today has
/// passed, the first anchor of the following day.
///
/// `anchors` must be sorted. Anchors that fall into a DST gap do not exist
/// on that day and are skipped; ambiguous ones resolve to the earlier
/// instant. Returns `None` only for an empty anchor list.
pub fn next_anchor_after<Z: TimeZone>(
    now: &DateTime<Z>,
    anchors: &[NaiveTime],
) -> Option<DateTime<Z>> {
    let tz = now.timezone();
    let today = now.date_naive();

    // Two extra days cover an anchor swallowed by a DST gap tomorrow.
    (0..3u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .flat_map(|day| anchors.iter().map(move |anchor| day.and_time(*anchor)))
        .filter_map(|local| tz.from_local_datetime(&local).earliest())
        .find(|candidate| candidate > now)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use chrono_tz::Europe::Berlin;
    use rstest::rstest;

    use super::*;

    fn anchors() -> Vec<NaiveTime> {
        vec![
            NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
        ]
    }

    fn berlin(day: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        Berlin
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 6, day)
                    .unwrap()
                    .and_hms_opt(hour, minute, 0)
                    .unwrap(),
            )
            .single()
            .unwrap()
    }

    #[rstest]
    #[case(berlin(10, 12, 59), berlin(10, 13, 0))]
    #[case(berlin(10, 13, 1), berlin(11, 1, 0))]
    #[case(berlin(10, 0, 30), berlin(10, 1, 0))]
    #[case(berlin(10, 1, 0), berlin(10, 13, 0))]
    #[case(berlin(10, 13, 0), berlin(11, 1, 0))]
    #[case(berlin(30, 23, 59), berlin_july_first())]
    fn test_next_anchor(#[case] now: DateTime<Tz>, #[case] expected: DateTime<Tz>) {
        assert_eq!(next_anchor_after(&now, &anchors()), Some(expected));
    }

    fn berlin_july_first() -> DateTime<Tz> {
        Berlin
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 7, 1)
                    .unwrap()
                    .and_hms_opt(1, 0, 0)
                    .unwrap(),
            )
            .single()
            .unwrap()
    }

    #[test]
    fn test_anchor_in_dst_gap_is_skipped() {
        // 2024-03-31 02:00 to 03:00 does not exist in Berlin.
        let gap = vec![NaiveTime::from_hms_opt(2, 30, 0).unwrap()];
        let now = Berlin
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 3, 31)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            )
            .single()
            .unwrap();
        let next = next_anchor_after(&now, &gap).unwrap();
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_empty_anchor_list() {
        assert_eq!(next_anchor_after(&berlin(10, 12, 0), &[]), None);
    }

    #[test]
    fn test_schedule_from_config() {
        let schedule = Schedule::from_config(&ScheduleConfig::default()).unwrap();
        assert_eq!(schedule.tz, Berlin);
        assert_eq!(schedule.anchors, anchors());
        assert_eq!(schedule.interval, Duration::from_secs(12 * 3600));

        let now = berlin(10, 12, 59).with_timezone(&Utc);
        assert_eq!(schedule.next_anchor(now), Some(berlin(10, 13, 0)));
    }
}
