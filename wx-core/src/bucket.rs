//! Day bucketing and aggregation.
//!
//! Providers that only publish sub-daily data (3-hourly blocks, hourly grid
//! values, 12-hour periods) are folded into one summary per calendar day,
//! counted from the day of a reference timestamp.
//!
//! Day offsets are computed on calendar dates, never by dividing raw
//! timestamp differences, so a sample at 23:30 and one at 00:30 always land
//! one day apart regardless of DST. The calendar is UTC unless the policy asks
//! for the samples' own offsets.

use std::ops::RangeInclusive;

use chrono::{DateTime, FixedOffset, Timelike};
use tracing::debug;

use crate::{convert::pa_to_hpa, mapper::PriorityTable};

/// One time-stamped data point. Any field may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Local time of the sample, offset included.
    pub time: DateTime<FixedOffset>,
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure_pa: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    /// Provider condition code, used for priority ranking and icon lookup.
    pub condition: Option<String>,
    pub text: Option<String>,
}

impl Sample {
    pub fn at(time: DateTime<FixedOffset>) -> Self {
        Self {
            time,
            temp_max: None,
            temp_min: None,
            humidity: None,
            pressure_pa: None,
            wind_speed: None,
            wind_direction: None,
            condition: None,
            text: None,
        }
    }
}

/// Which calendar day offsets are counted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    #[default]
    Utc,
    /// Dates at each timestamp's own offset.
    Local,
}

/// How day 0 is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Today {
    /// First sample of the day, taken as is.
    FirstSample,
    /// Same aggregation as every other day.
    Aggregate,
    /// Left to the caller.
    Skip,
}

#[derive(Debug, Clone)]
pub struct BucketPolicy<'a> {
    pub horizon: usize,
    pub today: Today,
    pub calendar: Calendar,
    pub priority: Option<&'a PriorityTable>,
    /// Local hours considered for priority ranking.
    pub daytime: RangeInclusive<u32>,
    /// Hour the representative condition is taken from when ranking can't decide.
    pub reference_hour: u32,
}

impl<'a> BucketPolicy<'a> {
    pub fn new(horizon: usize) -> Self {
        Self {
            horizon,
            today: Today::FirstSample,
            calendar: Calendar::Utc,
            priority: None,
            daytime: 9..=15,
            reference_hour: 12,
        }
    }

    pub fn today(mut self, today: Today) -> Self {
        self.today = today;
        self
    }

    pub fn calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn priority(mut self, table: &'a PriorityTable) -> Self {
        self.priority = Some(table);
        self
    }

    pub fn reference_hour(mut self, hour: u32) -> Self {
        self.reference_hour = hour;
        self
    }
}

/// Aggregated view of one day.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DaySummary {
    pub temp_max: Option<f64>,
    pub temp_min: Option<f64>,
    pub humidity: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_direction: Option<String>,
    pub condition: Option<String>,
    pub text: Option<String>,
}

impl DaySummary {
    fn from_sample(sample: &Sample) -> Self {
        Self {
            temp_max: sample.temp_max,
            temp_min: sample.temp_min,
            humidity: sample.humidity,
            pressure_hpa: sample.pressure_pa.filter(|p| p.is_finite()).map(pa_to_hpa),
            wind_speed: sample.wind_speed,
            wind_direction: sample.wind_direction.clone(),
            condition: sample.condition.clone(),
            text: sample.text.clone(),
        }
    }
}

/// Whole days between the dates of `reference` and `time`.
pub fn day_offset(
    reference: &DateTime<FixedOffset>,
    time: &DateTime<FixedOffset>,
    calendar: Calendar,
) -> i64 {
    let (base, date) = match calendar {
        Calendar::Utc => (reference.naive_utc().date(), time.naive_utc().date()),
        Calendar::Local => (reference.date_naive(), time.date_naive()),
    };
    date.signed_duration_since(base).num_days()
}

/// Groups samples by day offset, dropping anything outside `[0, horizon)`.
pub fn bucket_by_day<'s>(
    reference: &DateTime<FixedOffset>,
    samples: &'s [Sample],
    horizon: usize,
    calendar: Calendar,
) -> Vec<Vec<&'s Sample>> {
    let mut buckets: Vec<Vec<&Sample>> = vec![Vec::new(); horizon];
    for sample in samples {
        let offset = day_offset(reference, &sample.time, calendar);
        match usize::try_from(offset) {
            Ok(index) if index < horizon => buckets[index].push(sample),
            _ => {}
        }
    }
    buckets
}

/// One entry per day offset; `None` where no sample landed.
pub fn summarize_days(
    reference: &DateTime<FixedOffset>,
    samples: &[Sample],
    policy: &BucketPolicy<'_>,
) -> Vec<Option<DaySummary>> {
    bucket_by_day(reference, samples, policy.horizon, policy.calendar)
        .iter()
        .enumerate()
        .map(|(offset, bucket)| {
            if bucket.is_empty() {
                debug!(offset, "no samples for forecast day");
                return None;
            }
            match (offset, policy.today) {
                (0, Today::Skip) => None,
                (0, Today::FirstSample) => bucket.first().map(|s| DaySummary::from_sample(s)),
                _ => Some(summarize(bucket, policy)),
            }
        })
        .collect()
}

/// Reduces one day's samples.
///
/// Temperatures take the extremes, humidity and pressure the maximum, and wind
/// speed and direction both come from the windiest sample.
pub fn summarize(bucket: &[&Sample], policy: &BucketPolicy<'_>) -> DaySummary {
    let windiest = bucket
        .iter()
        .filter(|s| s.wind_speed.is_some())
        .copied()
        .reduce(|best, s| if s.wind_speed > best.wind_speed { s } else { best });

    let representative = representative(bucket, policy);

    DaySummary {
        temp_max: max_of(bucket.iter().filter_map(|s| s.temp_max)),
        temp_min: min_of(bucket.iter().filter_map(|s| s.temp_min)),
        humidity: max_of(bucket.iter().filter_map(|s| s.humidity)),
        pressure_hpa: max_of(bucket.iter().filter_map(|s| s.pressure_pa).filter(|p| p.is_finite()))
            .map(pa_to_hpa),
        wind_speed: windiest.and_then(|s| s.wind_speed),
        wind_direction: windiest.and_then(|s| s.wind_direction.clone()),
        condition: representative.and_then(|s| s.condition.clone()),
        text: representative.and_then(|s| s.text.clone()),
    }
}

/// Picks the sample whose condition stands for the whole day.
///
/// With a priority table, the highest ranked code inside the daytime window
/// wins and ties go to the entry closest to the middle of the window.
/// Otherwise the sample nearest the reference hour is used.
fn representative<'s>(bucket: &[&'s Sample], policy: &BucketPolicy<'_>) -> Option<&'s Sample> {
    let candidates: Vec<&Sample> =
        bucket.iter().copied().filter(|s| s.condition.is_some()).collect();

    if let Some(table) = policy.priority {
        let window: Vec<&Sample> = candidates
            .iter()
            .copied()
            .filter(|s| policy.daytime.contains(&s.time.hour()))
            .collect();
        let rank = |s: &Sample| s.condition.as_deref().and_then(|c| table.rank(c));

        if let Some(best) = window.iter().filter_map(|s| rank(*s)).max() {
            let middle = window[window.len() / 2].time;
            return window
                .iter()
                .copied()
                .filter(|s| rank(*s) == Some(best))
                .min_by_key(|s| (s.time - middle).num_seconds().abs());
        }
    }

    candidates
        .into_iter()
        .min_by_key(|s| minutes_from(s.time, policy.reference_hour))
}

fn minutes_from(time: DateTime<FixedOffset>, hour: u32) -> i64 {
    let minutes = i64::from(time.hour()) * 60 + i64::from(time.minute());
    (minutes - i64::from(hour) * 60).abs()
}

fn max_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
}

fn min_of(values: impl Iterator<Item = f64>) -> Option<f64> {
    values.fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.min(v))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).expect("valid timestamp")
    }

    fn block(time: &str, max: f64, min: f64, code: &str) -> Sample {
        Sample {
            temp_max: Some(max),
            temp_min: Some(min),
            condition: Some(code.to_string()),
            text: Some(format!("text {code}")),
            ..Sample::at(at(time))
        }
    }

    const OWM_LIKE: PriorityTable =
        PriorityTable::new(&[("01d", 2), ("02d", 1), ("10d", 6), ("11d", 7), ("13d", 8)]);

    #[test]
    fn offsets_use_calendar_dates() {
        let reference = at("2024-03-18T23:30:00+00:00");
        let utc = |s: &str| day_offset(&reference, &at(s), Calendar::Utc);
        assert_eq!(utc("2024-03-19T00:30:00+00:00"), 1);
        assert_eq!(utc("2024-03-18T00:00:00+00:00"), 0);
        // 20:00 at -07:00 is already the 19th in UTC.
        assert_eq!(utc("2024-03-18T20:00:00-07:00"), 1);
        assert_eq!(utc("2024-03-17T12:00:00+00:00"), -1);
    }

    #[test]
    fn local_calendar_keeps_each_offset() {
        // 19:00 at -05:00 on the 18th is 00:00 UTC on the 19th.
        let reference = at("2024-03-18T19:00:00-05:00");
        let local = |s: &str| day_offset(&reference, &at(s), Calendar::Local);
        assert_eq!(local("2024-03-19T06:00:00-05:00"), 1);
        assert_eq!(local("2024-03-18T23:00:00-05:00"), 0);
        assert_eq!(day_offset(&reference, &at("2024-03-19T06:00:00-05:00"), Calendar::Utc), 0);
    }

    #[test]
    fn local_calendar_splits_days_at_local_midnight() {
        // Sydney, +11:00: 22:00 UTC on the 18th is 09:00 local on the 19th.
        let samples = vec![
            block("2024-03-19T06:00:00+11:00", 20.0, 18.0, "01n"),
            block("2024-03-19T09:00:00+11:00", 24.0, 19.0, "10d"),
            block("2024-03-19T12:00:00+11:00", 26.0, 21.0, "02d"),
            block("2024-03-20T00:00:00+11:00", 17.0, 15.0, "13d"),
        ];
        let policy = BucketPolicy::new(3)
            .today(Today::Aggregate)
            .calendar(Calendar::Local)
            .priority(&OWM_LIKE);
        let days = summarize_days(&samples[0].time, &samples, &policy);

        let today = days[0].as_ref().expect("day 0");
        assert_eq!(today.temp_max, Some(26.0));
        assert_eq!(today.condition.as_deref(), Some("10d"));
        let tomorrow = days[1].as_ref().expect("day 1");
        assert_eq!(tomorrow.temp_min, Some(15.0));
    }

    #[test]
    fn today_first_sample_then_aggregates_and_blanks() {
        let samples = vec![
            block("2024-03-18T15:00:00+00:00", 14.0, 12.0, "02d"),
            block("2024-03-18T18:00:00+00:00", 30.0, -30.0, "11d"),
            block("2024-03-19T09:00:00+00:00", 10.0, 6.0, "01d"),
            block("2024-03-19T12:00:00+00:00", 16.0, 9.0, "10d"),
            block("2024-03-19T15:00:00+00:00", 13.0, 8.0, "02d"),
            // day 2 has nothing, day 3 one block
            block("2024-03-21T12:00:00+00:00", 20.0, 11.0, "01d"),
            // beyond the horizon
            block("2024-03-25T12:00:00+00:00", 40.0, 30.0, "13d"),
        ];
        let reference = samples[0].time;
        let policy = BucketPolicy::new(5).priority(&OWM_LIKE);

        let days = summarize_days(&reference, &samples, &policy);
        assert_eq!(days.len(), 5);

        let today = days[0].as_ref().expect("day 0");
        assert_eq!(today.temp_max, Some(14.0));
        assert_eq!(today.temp_min, Some(12.0));
        assert_eq!(today.condition.as_deref(), Some("02d"));

        let tomorrow = days[1].as_ref().expect("day 1");
        assert_eq!(tomorrow.temp_max, Some(16.0));
        assert_eq!(tomorrow.temp_min, Some(6.0));
        assert_eq!(tomorrow.condition.as_deref(), Some("10d"));
        assert_eq!(tomorrow.text.as_deref(), Some("text 10d"));

        assert!(days[2].is_none());
        assert!(days[3].is_some());
        assert!(days[4].is_none());
    }

    #[test]
    fn wind_speed_and_direction_come_from_one_sample() {
        let mk = |time: &str, speed: f64, dir: &str| Sample {
            wind_speed: Some(speed),
            wind_direction: Some(dir.to_string()),
            ..Sample::at(at(time))
        };
        let samples = [
            mk("2024-03-19T03:00:00+00:00", 5.0, "N"),
            mk("2024-03-19T06:00:00+00:00", 12.0, "SW"),
            mk("2024-03-19T09:00:00+00:00", 12.0, "E"),
            mk("2024-03-19T12:00:00+00:00", 8.0, "NW"),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let day = summarize(&refs, &BucketPolicy::new(5));
        assert_eq!(day.wind_speed, Some(12.0));
        assert_eq!(day.wind_direction.as_deref(), Some("SW"));
    }

    #[test]
    fn humidity_and_pressure_take_maximum() {
        let mk = |time: &str, humidity: Option<f64>, pa: Option<f64>| Sample {
            humidity,
            pressure_pa: pa,
            ..Sample::at(at(time))
        };
        let samples = [
            mk("2024-03-19T00:00:00+00:00", Some(60.0), Some(101_200.0)),
            mk("2024-03-19T06:00:00+00:00", Some(85.0), None),
            mk("2024-03-19T12:00:00+00:00", Some(70.0), Some(f64::NAN)),
            mk("2024-03-19T18:00:00+00:00", None, Some(101_560.0)),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let day = summarize(&refs, &BucketPolicy::new(7));
        assert_eq!(day.humidity, Some(85.0));
        assert_eq!(day.pressure_hpa, Some(1016.0));
    }

    #[test]
    fn priority_ties_prefer_middle_of_window() {
        let samples = [
            block("2024-03-19T09:00:00+00:00", 1.0, 1.0, "10d"),
            block("2024-03-19T12:00:00+00:00", 1.0, 1.0, "10d"),
            block("2024-03-19T15:00:00+00:00", 1.0, 1.0, "10d"),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let policy = BucketPolicy::new(5).priority(&OWM_LIKE);
        let picked = representative(&refs, &policy).expect("a sample");
        assert_eq!(picked.time.hour(), 12);
    }

    #[test]
    fn severe_condition_outside_window_is_ignored() {
        let samples = [
            block("2024-03-19T03:00:00+00:00", 1.0, 1.0, "13d"),
            block("2024-03-19T12:00:00+00:00", 1.0, 1.0, "02d"),
            block("2024-03-19T15:00:00+00:00", 1.0, 1.0, "01d"),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let day = summarize(&refs, &BucketPolicy::new(5).priority(&OWM_LIKE));
        assert_eq!(day.condition.as_deref(), Some("01d"));
    }

    #[test]
    fn without_priority_nearest_reference_hour_wins() {
        let samples = [
            block("2024-03-19T06:00:00-07:00", 1.0, 1.0, "sct"),
            block("2024-03-19T18:00:00-07:00", 1.0, 1.0, "tsra"),
        ];
        let refs: Vec<&Sample> = samples.iter().collect();
        let day = summarize(&refs, &BucketPolicy::new(7).reference_hour(6));
        assert_eq!(day.condition.as_deref(), Some("sct"));
    }

    #[test]
    fn skip_leaves_today_to_caller() {
        let samples = vec![block("2024-03-18T12:00:00+00:00", 1.0, 0.0, "01d")];
        let policy = BucketPolicy::new(3).today(Today::Skip);
        let days = summarize_days(&samples[0].time, &samples, &policy);
        assert_eq!(days, vec![None, None, None]);
    }

    #[test]
    fn summaries_are_deterministic() {
        let samples = vec![
            block("2024-03-18T12:00:00+00:00", 3.0, 1.0, "01d"),
            block("2024-03-19T12:00:00+00:00", 5.0, 2.0, "10d"),
        ];
        let policy = BucketPolicy::new(5).priority(&OWM_LIKE);
        let first = summarize_days(&samples[0].time, &samples, &policy);
        let second = summarize_days(&samples[0].time, &samples, &policy);
        assert_eq!(first, second);
    }
}
