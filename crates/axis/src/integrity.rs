//! Structural integrity checks.
//!
//! An [`IntegrityError`] means the point index and the keyed cue map
//! disagree. It never results from bad input.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrityError {
    #[error("bucket {bucket}: {mapped} mapped points but {indexed} indexed")]
    PointCount {
        bucket: f64,
        mapped: usize,
        indexed: usize,
    },

    #[error("bucket {bucket}: point {point} is indexed but not mapped")]
    UnmappedPoint { bucket: f64, point: f64 },

    #[error("bucket {bucket}: point {point} has no cues but is still present")]
    EmptyPoint { bucket: f64, point: f64 },

    #[error("bucket {bucket}: point {point} references unknown cue slot {slot}")]
    UnknownCue { bucket: f64, point: f64, slot: usize },

    #[error("cue '{key}' has no endpoint at {point}")]
    EndpointMismatch { key: String, point: f64 },

    #[error("cue '{key}' of length {length} is stored in bucket {bucket}")]
    WrongBucket { key: String, length: f64, bucket: f64 },

    #[error("cue '{key}' expected {expected} point references, found {found}")]
    ReferenceCount {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("key map holds {keys} entries but storage holds {stored} cues")]
    CueCount { keys: usize, stored: usize },

    #[error("key '{key}' maps to slot {slot} holding cue '{found}'")]
    KeyMismatch {
        key: String,
        slot: usize,
        found: String,
    },

    #[error("bucket {bucket} has unflushed mutations")]
    Unflushed { bucket: f64 },
}

/// Size of one bucket at check time.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketStats {
    pub max_length: f64,
    pub points: usize,
    /// Sum over points of cues touching the point
    pub references: usize,
}

/// Result of a successful integrity check.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityReport {
    pub cues: usize,
    pub buckets: Vec<BucketStats>,
}

impl IntegrityReport {
    pub fn points(&self) -> usize {
        self.buckets.iter().map(|b| b.points).sum()
    }
}
