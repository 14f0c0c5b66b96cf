//! Endpoint algebra
//!
//! An endpoint is one boundary of an interval. Endpoints are totally ordered
//! even when their values coincide: at equal value the order is
//!
//! ```text
//! right-open  <  left-closed  <  singular  <  right-closed  <  left-open
//!   10)            [10             10           10]             (10
//! ```
//!
//! so that `[0,10)` ends strictly before `[10,20]` begins, and a plain point
//! `10` sits inside `[10,20]` but outside `[0,10)`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Interval boundary marker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub value: f64,
    /// Upper boundary of its interval
    pub right: bool,
    pub closed: bool,
    /// Belongs to a zero-length interval, or is a bare point
    pub singular: bool,
}

impl Endpoint {
    pub const fn new(value: f64, right: bool, closed: bool, singular: bool) -> Self {
        Self {
            value,
            right,
            closed,
            singular,
        }
    }

    /// A bare value treated as a singular endpoint.
    pub const fn point(value: f64) -> Self {
        Self::new(value, false, true, true)
    }

    /// Rank at equal value.
    #[inline]
    pub fn category(&self) -> u8 {
        if self.singular {
            return 2;
        }
        match (self.right, self.closed) {
            (true, false) => 0,
            (false, true) => 1,
            (true, true) => 3,
            (false, false) => 4,
        }
    }

    /// Total order over (value, category).
    ///
    /// NaN values never reach here: intervals reject them on construction.
    pub fn compare(&self, other: &Endpoint) -> Ordering {
        self.value
            .partial_cmp(&other.value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.category().cmp(&other.category()))
    }

    #[inline]
    pub fn leftof(&self, other: &Endpoint) -> bool {
        self.compare(other) == Ordering::Less
    }

    #[inline]
    pub fn rightof(&self, other: &Endpoint) -> bool {
        self.compare(other) == Ordering::Greater
    }

    #[inline]
    pub fn equals(&self, other: &Endpoint) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl From<f64> for Endpoint {
    fn from(value: f64) -> Self {
        Self::point(value)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category() {
            0 => write!(f, "{})", self.value),
            1 => write!(f, "[{}", self.value),
            2 => write!(f, "{}", self.value),
            3 => write!(f, "{}]", self.value),
            _ => write!(f, "({}", self.value),
        }
    }
}
