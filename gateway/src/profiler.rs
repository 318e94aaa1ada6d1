//! Rolling request profiler
//!
//! Keeps the most recent `capacity` entries in a ring. Writers take the lock
//! only to push one entry; readers take it only to clone the ring, so a
//! report never observes a half-written entry and never waits on I/O.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use viesti_core::ServerProfiler;

/// Order in which [`RingProfiler::report`] returns entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportOrder {
    /// Most recently recorded entry first
    #[default]
    NewestFirst,
    /// Insertion order
    OldestFirst,
}

impl fmt::Display for ReportOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportOrder::NewestFirst => f.write_str("newest-first"),
            ReportOrder::OldestFirst => f.write_str("oldest-first"),
        }
    }
}

impl FromStr for ReportOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest-first" | "newest" => Ok(ReportOrder::NewestFirst),
            "oldest-first" | "oldest" => Ok(ReportOrder::OldestFirst),
            other => Err(format!("unknown report order '{other}'")),
        }
    }
}

/// Bounded in-memory profiler
pub struct RingProfiler<E> {
    capacity: usize,
    order: ReportOrder,
    entries: Mutex<VecDeque<E>>,
}

impl<E> RingProfiler<E> {
    /// Create a profiler retaining at most `capacity` entries
    ///
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        Self::with_order(capacity, ReportOrder::default())
    }

    /// Create a profiler with an explicit report order
    pub fn with_order(capacity: usize, order: ReportOrder) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Maximum number of retained entries
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured report order
    pub fn order(&self) -> ReportOrder {
        self.order
    }

    /// Number of entries currently retained
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing has been recorded yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E> ServerProfiler for RingProfiler<E>
where
    E: Serialize + Clone + Send + Sync + 'static,
{
    type Entry = E;

    fn record(&self, entry: E) {
        let mut entries = self.entries.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    fn report(&self) -> Vec<E> {
        let entries = self.entries.lock();
        match self.order {
            ReportOrder::NewestFirst => entries.iter().rev().cloned().collect(),
            ReportOrder::OldestFirst => entries.iter().cloned().collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_report_is_empty_array() {
        let profiler: RingProfiler<u32> = RingProfiler::new(4);
        let report = profiler.report();
        assert!(report.is_empty());
        assert_eq!(serde_json::to_string(&report).unwrap(), "[]");
    }

    #[test]
    fn test_keeps_last_n_newest_first() {
        let profiler = RingProfiler::new(3);
        for i in 0..5u32 {
            profiler.record(i);
        }

        assert_eq!(profiler.len(), 3);
        assert_eq!(profiler.report(), vec![4, 3, 2]);
    }

    #[test]
    fn test_keeps_last_n_oldest_first() {
        let profiler = RingProfiler::with_order(3, ReportOrder::OldestFirst);
        for i in 0..5u32 {
            profiler.record(i);
        }

        assert_eq!(profiler.report(), vec![2, 3, 4]);
    }

    #[test]
    fn test_under_capacity_reports_everything() {
        let profiler = RingProfiler::new(10);
        profiler.record("a".to_string());
        profiler.record("b".to_string());

        assert_eq!(profiler.report(), vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_zero_capacity_is_raised_to_one() {
        let profiler = RingProfiler::new(0);
        profiler.record(1u8);
        profiler.record(2u8);

        assert_eq!(profiler.capacity(), 1);
        assert_eq!(profiler.report(), vec![2]);
    }

    #[test]
    fn test_report_order_from_str() {
        assert_eq!(
            "oldest-first".parse::<ReportOrder>().unwrap(),
            ReportOrder::OldestFirst
        );
        assert_eq!("NEWEST".parse::<ReportOrder>().unwrap(), ReportOrder::NewestFirst);
        assert!("random".parse::<ReportOrder>().is_err());
    }

    #[test]
    fn test_concurrent_records_never_exceed_capacity() {
        let profiler = Arc::new(RingProfiler::new(16));
        let threads: Vec<_> = (0..4u64)
            .map(|t| {
                let profiler = Arc::clone(&profiler);
                std::thread::spawn(move || {
                    for i in 0..1_000u64 {
                        profiler.record(t * 1_000 + i);
                        assert!(profiler.report().len() <= 16);
                    }
                })
            })
            .collect();

        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(profiler.len(), 16);
    }
}
