//! Payload-size health counters
//!
//! Every accepted request bumps one counter chosen by its payload size.
//! Counters are plain atomics, one per bucket, so increments from any
//! number of ingress tasks never contend on a lock and never get lost.
//!
//! # Bucket policies
//!
//! | policy        | buckets                                                   |
//! |---------------|-----------------------------------------------------------|
//! | `Decimal`     | `0..=100`, `101..=1000`, `1001..=10000`, `>10000`         |
//! | `PowerOfTwo`  | bucket `k` holds sizes with bit length `k` (`< 2^k`)      |

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use viesti_core::HealthTracker;

const DECIMAL_LABELS: [&str; 4] = [
    "payloads_over_zero",
    "payloads_over_hundred",
    "payloads_over_thousand",
    "payloads_over_ten_thousand",
];

/// How payload sizes map to buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BucketPolicy {
    /// Four fixed decimal ranges
    #[default]
    Decimal,
    /// One bucket per bit length of the size
    PowerOfTwo,
}

/// Index of a size bucket under a given policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Bucket(pub usize);

impl BucketPolicy {
    /// Number of buckets this policy uses
    pub fn bucket_count(&self) -> usize {
        match self {
            BucketPolicy::Decimal => DECIMAL_LABELS.len(),
            BucketPolicy::PowerOfTwo => usize::BITS as usize + 1,
        }
    }

    /// Map a payload size to its bucket
    ///
    /// Pure and monotonic: a larger size never lands in a lower bucket.
    pub fn bucket(&self, size: usize) -> Bucket {
        match self {
            BucketPolicy::Decimal => Bucket(match size {
                0..=100 => 0,
                101..=1_000 => 1,
                1_001..=10_000 => 2,
                _ => 3,
            }),
            BucketPolicy::PowerOfTwo => Bucket((usize::BITS - size.leading_zeros()) as usize),
        }
    }

    /// Human-readable bucket name
    pub fn label(&self, bucket: Bucket) -> String {
        match self {
            BucketPolicy::Decimal => DECIMAL_LABELS
                .get(bucket.0)
                .copied()
                .unwrap_or("unknown")
                .to_string(),
            BucketPolicy::PowerOfTwo => format!("under_2^{}", bucket.0),
        }
    }
}

impl fmt::Display for BucketPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BucketPolicy::Decimal => f.write_str("decimal"),
            BucketPolicy::PowerOfTwo => f.write_str("power-of-two"),
        }
    }
}

impl FromStr for BucketPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decimal" => Ok(BucketPolicy::Decimal),
            "power-of-two" | "pow2" => Ok(BucketPolicy::PowerOfTwo),
            other => Err(format!("unknown bucket policy '{other}'")),
        }
    }
}

/// Counter value for one bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketCount {
    /// Bucket name
    pub bucket: String,
    /// Payloads accepted into this bucket
    pub count: u64,
}

/// Point-in-time view of every bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSnapshot {
    /// Policy the counters were collected under
    pub policy: BucketPolicy,
    /// Per-bucket counts in bucket order
    pub buckets: Vec<BucketCount>,
    /// Sum of all buckets
    pub total: u64,
}

/// Lock-free payload health tracker
pub struct PayloadHealth {
    policy: BucketPolicy,
    counters: Box<[AtomicU64]>,
}

impl PayloadHealth {
    /// Create a tracker with all counters at zero
    pub fn new(policy: BucketPolicy) -> Self {
        let counters = (0..policy.bucket_count())
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { policy, counters }
    }

    /// Active bucket policy
    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    /// Current count of the bucket `size` maps to
    pub fn count(&self, size: usize) -> u64 {
        self.count_bucket(self.policy.bucket(size))
    }

    /// Current count of a specific bucket
    pub fn count_bucket(&self, bucket: Bucket) -> u64 {
        self.counters
            .get(bucket.0)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Read every counter
    ///
    /// Each counter is read atomically; the set is not a single atomic cut
    /// while increments are in flight, which is fine for monotonic counters.
    pub fn snapshot(&self) -> HealthSnapshot {
        let buckets: Vec<BucketCount> = self
            .counters
            .iter()
            .enumerate()
            .map(|(i, c)| BucketCount {
                bucket: self.policy.label(Bucket(i)),
                count: c.load(Ordering::Relaxed),
            })
            .collect();
        let total = buckets.iter().map(|b| b.count).sum();

        HealthSnapshot {
            policy: self.policy,
            buckets,
            total,
        }
    }
}

impl Default for PayloadHealth {
    fn default() -> Self {
        Self::new(BucketPolicy::default())
    }
}

impl HealthTracker for PayloadHealth {
    fn increment_bucket(&self, size: usize) {
        let bucket = self.policy.bucket(size);
        // Every policy bucket is in range by construction
        if let Some(counter) = self.counters.get(bucket.0) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }
}
