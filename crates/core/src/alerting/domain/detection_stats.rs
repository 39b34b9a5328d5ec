use std::collections::BTreeMap;
use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

/// Failure while evaluating a single observation. The observation is
/// dropped and the engine carries on with the next one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("{0} counter overflowed")]
    CounterOverflow(&'static str),
}

/// Rolling detection statistics for one monitoring session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Stats {
    pub total_detections: u64,
    pub alert_count: u64,
    pub last_detection_time: Option<SystemTime>,
    pub session_start_time: Option<SystemTime>,
    /// Occurrences of each observed face count.
    pub face_counts: BTreeMap<u32, u64>,
}

/// Single-writer accumulator behind [`Stats`]. The decision worker owns it;
/// everyone else gets a [`snapshot`](StatsAggregator::snapshot).
#[derive(Debug, Clone, Default)]
pub struct StatsAggregator {
    stats: Stats,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all counters and stamps the session start.
    pub fn start_session(&mut self, now: SystemTime) {
        self.stats = Stats {
            session_start_time: Some(now),
            ..Stats::default()
        };
    }

    /// Counts one evaluated observation. Leaves the stats untouched on error.
    pub fn record(&mut self, face_count: u32, now: SystemTime) -> Result<(), EvaluationError> {
        let total = self
            .stats
            .total_detections
            .checked_add(1)
            .ok_or(EvaluationError::CounterOverflow("total_detections"))?;
        let seen = self.stats.face_counts.get(&face_count).copied().unwrap_or(0);
        let seen = seen
            .checked_add(1)
            .ok_or(EvaluationError::CounterOverflow("face_counts"))?;

        self.stats.total_detections = total;
        self.stats.face_counts.insert(face_count, seen);
        self.stats.last_detection_time = Some(now);
        Ok(())
    }

    pub fn record_alert(&mut self) -> Result<(), EvaluationError> {
        self.stats.alert_count = self
            .stats
            .alert_count
            .checked_add(1)
            .ok_or(EvaluationError::CounterOverflow("alert_count"))?;
        Ok(())
    }

    pub fn total_detections(&self) -> u64 {
        self.stats.total_detections
    }

    pub fn snapshot(&self) -> Stats {
        self.stats.clone()
    }

    #[cfg(test)]
    pub(crate) fn with_bucket(face_count: u32, occurrences: u64) -> Self {
        let mut agg = Self::new();
        agg.stats.face_counts.insert(face_count, occurrences);
        agg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_aggregator_is_empty() {
        let stats = StatsAggregator::new().snapshot();
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.alert_count, 0);
        assert!(stats.face_counts.is_empty());
        assert!(stats.session_start_time.is_none());
    }

    #[test]
    fn test_record_counts_observations() {
        let mut agg = StatsAggregator::new();
        let now = SystemTime::now();
        for count in [0, 1, 1, 2, 1] {
            agg.record(count, now).unwrap();
        }

        let stats = agg.snapshot();
        assert_eq!(stats.total_detections, 5);
        assert_eq!(stats.face_counts[&0], 1);
        assert_eq!(stats.face_counts[&1], 3);
        assert_eq!(stats.face_counts[&2], 1);
        assert_eq!(stats.face_counts.values().sum::<u64>(), 5);
        assert_eq!(stats.last_detection_time, Some(now));
    }

    #[test]
    fn test_record_alert() {
        let mut agg = StatsAggregator::new();
        agg.record_alert().unwrap();
        agg.record_alert().unwrap();
        assert_eq!(agg.snapshot().alert_count, 2);
    }

    #[test]
    fn test_start_session_resets_counters() {
        let mut agg = StatsAggregator::new();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        agg.record(2, start).unwrap();
        agg.record_alert().unwrap();

        agg.start_session(start);

        let stats = agg.snapshot();
        assert_eq!(stats.total_detections, 0);
        assert_eq!(stats.alert_count, 0);
        assert!(stats.face_counts.is_empty());
        assert_eq!(stats.session_start_time, Some(start));
        assert!(stats.last_detection_time.is_none());
    }

    #[test]
    fn test_snapshot_is_independent_copy() {
        let mut agg = StatsAggregator::new();
        agg.record(1, SystemTime::now()).unwrap();
        let before = agg.snapshot();

        agg.record(1, SystemTime::now()).unwrap();

        assert_eq!(before.total_detections, 1);
        assert_eq!(agg.total_detections(), 2);
    }

    #[test]
    fn test_total_overflow_leaves_stats_unchanged() {
        let mut agg = StatsAggregator::new();
        agg.stats.total_detections = u64::MAX;

        let err = agg.record(1, SystemTime::now()).unwrap_err();

        assert_eq!(err, EvaluationError::CounterOverflow("total_detections"));
        assert!(agg.stats.face_counts.is_empty());
        assert!(agg.stats.last_detection_time.is_none());
    }

    #[test]
    fn test_histogram_overflow_leaves_total_unchanged() {
        let mut agg = StatsAggregator::new();
        agg.stats.face_counts.insert(2, u64::MAX);

        let err = agg.record(2, SystemTime::now()).unwrap_err();

        assert_eq!(err, EvaluationError::CounterOverflow("face_counts"));
        assert_eq!(agg.stats.total_detections, 0);
    }

    #[test]
    fn test_alert_overflow() {
        let mut agg = StatsAggregator::new();
        agg.stats.alert_count = u64::MAX;
        assert!(agg.record_alert().is_err());
        assert_eq!(agg.stats.alert_count, u64::MAX);
    }

    #[test]
    fn test_error_message() {
        let err = EvaluationError::CounterOverflow("alert_count");
        assert_eq!(err.to_string(), "alert_count counter overflowed");
    }
}
