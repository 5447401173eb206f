use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Fixed-capacity, time-ascending ring of samples for one series name.
#[derive(Debug, Clone)]
pub struct Series {
    capacity: usize,
    samples: VecDeque<Sample>,
    last_write: DateTime<Utc>,
}

impl Series {
    pub fn new(capacity: usize, created_at: DateTime<Utc>) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity.min(64)),
            last_write: created_at,
        }
    }

    /// Appends a sample, evicting the oldest one when the ring is full.
    /// A timestamp older than the newest sample is clamped up to it, so the
    /// ring stays time-ascending across wall-clock steps backwards.
    pub fn push(&mut self, mut sample: Sample) {
        if let Some(newest) = self.samples.back() {
            if sample.timestamp < newest.timestamp {
                sample.timestamp = newest.timestamp;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.last_write = sample.timestamp;
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    /// Samples with `start <= timestamp <= end`, oldest first.
    pub fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = Sample> + '_ {
        let first = self.samples.partition_point(|s| s.timestamp < start);
        self.samples
            .range(first..)
            .take_while(move |s| s.timestamp <= end)
            .copied()
    }

    /// Newest sample strictly older than `t`.
    pub fn before(&self, t: DateTime<Utc>) -> Option<Sample> {
        let idx = self.samples.partition_point(|s| s.timestamp < t);
        idx.checked_sub(1).and_then(|i| self.samples.get(i)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn last_write(&self) -> DateTime<Utc> {
        self.last_write
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut series = Series::new(3, at(0));
        for i in 0..5 {
            series.push(Sample { timestamp: at(i), value: i as f64 });
        }

        assert_eq!(series.len(), 3);
        let values: Vec<f64> = series.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![2.0, 3.0, 4.0]);
        assert_eq!(series.latest().unwrap().value, 4.0);
    }

    #[test]
    fn range_is_inclusive_on_both_ends() {
        let mut series = Series::new(10, at(0));
        for i in 0..6 {
            series.push(Sample { timestamp: at(i * 60), value: i as f64 });
        }

        let values: Vec<f64> = series.range(at(60), at(180)).map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);

        // Re-querying scans again from the start.
        assert_eq!(series.range(at(60), at(180)).count(), 3);
    }

    #[test]
    fn range_outside_data_is_empty() {
        let mut series = Series::new(10, at(0));
        series.push(Sample { timestamp: at(0), value: 1.0 });

        assert_eq!(series.range(at(10), at(20)).count(), 0);
        assert_eq!(series.range(at(0) - Duration::seconds(30), at(0) - Duration::seconds(1)).count(), 0);
    }

    #[test]
    fn backwards_timestamp_is_clamped_to_newest() {
        let mut series = Series::new(10, at(0));
        series.push(Sample { timestamp: at(100), value: 1.0 });
        series.push(Sample { timestamp: at(40), value: 2.0 });
        series.push(Sample { timestamp: at(160), value: 3.0 });

        let stamps: Vec<DateTime<Utc>> = series.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![at(100), at(100), at(160)]);
        let values: Vec<f64> = series.range(at(50), at(200)).map(|s| s.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn before_finds_newest_older_sample() {
        let mut series = Series::new(10, at(0));
        for i in 0..3 {
            series.push(Sample { timestamp: at(i * 60), value: i as f64 });
        }

        assert_eq!(series.before(at(0)), None);
        assert_eq!(series.before(at(60)).unwrap().value, 0.0);
        assert_eq!(series.before(at(61)).unwrap().value, 1.0);
        assert_eq!(series.before(at(1000)).unwrap().value, 2.0);
    }

    #[test]
    fn tracks_last_write() {
        let mut series = Series::new(2, at(0));
        assert_eq!(series.last_write(), at(0));
        series.push(Sample { timestamp: at(42), value: 1.0 });
        assert_eq!(series.last_write(), at(42));
    }
}
