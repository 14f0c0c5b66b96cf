//! Interval value type
//!
//! Intervals are immutable and always normalized on construction:
//! - `low <= high`, NaN bounds rejected
//! - `low == high` forces both bounds closed (singular)
//! - an infinite bound is always closed
//!
//! Default bound flags are `[low, high)`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::{ContractError, Endpoint, Relation, RelationMask};

/// Where a point lies relative to an interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointType {
    Low,
    High,
    Singular,
    Inside,
    Outside,
}

/// Half-open, closed, open or singular interval on the axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "IntervalSpec", into = "IntervalSpec")]
pub struct Interval {
    low: f64,
    high: f64,
    low_include: bool,
    high_include: bool,
}

impl Interval {
    /// `[low, high)`
    pub fn new(low: f64, high: f64) -> Result<Self, ContractError> {
        Self::with_bounds(low, high, true, false)
    }

    /// `[low, high]`
    pub fn closed(low: f64, high: f64) -> Result<Self, ContractError> {
        Self::with_bounds(low, high, true, true)
    }

    pub fn with_bounds(
        low: f64,
        high: f64,
        low_include: bool,
        high_include: bool,
    ) -> Result<Self, ContractError> {
        if low.is_nan() || high.is_nan() {
            return Err(ContractError::invalid_interval(low, high, "bound is NaN"));
        }
        if low > high {
            return Err(ContractError::invalid_interval(
                low,
                high,
                "low is greater than high",
            ));
        }
        let singular = low == high;
        Ok(Self {
            low,
            high,
            low_include: singular || low_include || low == f64::NEG_INFINITY,
            high_include: singular || high_include || high == f64::INFINITY,
        })
    }

    /// Zero-length interval `[x]`.
    ///
    /// `x` must not be NaN; positions handed in here come from motion
    /// vectors, which are finite.
    pub fn singular(x: f64) -> Self {
        debug_assert!(!x.is_nan());
        Self {
            low: x,
            high: x,
            low_include: true,
            high_include: true,
        }
    }

    /// `[-inf, inf]`
    pub fn unbounded() -> Self {
        Self {
            low: f64::NEG_INFINITY,
            high: f64::INFINITY,
            low_include: true,
            high_include: true,
        }
    }

    #[inline]
    pub fn low(&self) -> f64 {
        self.low
    }

    #[inline]
    pub fn high(&self) -> f64 {
        self.high
    }

    #[inline]
    pub fn low_include(&self) -> bool {
        self.low_include
    }

    #[inline]
    pub fn high_include(&self) -> bool {
        self.high_include
    }

    #[inline]
    pub fn is_singular(&self) -> bool {
        self.low == self.high
    }

    /// `high - low`, zero for singular intervals (including `[inf]`).
    pub fn length(&self) -> f64 {
        if self.is_singular() {
            0.0
        } else {
            self.high - self.low
        }
    }

    #[inline]
    pub fn endpoint_low(&self) -> Endpoint {
        Endpoint::new(self.low, false, self.low_include, self.is_singular())
    }

    #[inline]
    pub fn endpoint_high(&self) -> Endpoint {
        Endpoint::new(self.high, true, self.high_include, self.is_singular())
    }

    /// Endpoint at `value`, if `value` is one of the bounds.
    pub fn endpoint_at(&self, value: f64) -> Option<Endpoint> {
        if value == self.low {
            Some(self.endpoint_low())
        } else if value == self.high {
            Some(self.endpoint_high())
        } else {
            None
        }
    }

    pub fn covers_endpoint(&self, endpoint: &Endpoint) -> bool {
        !endpoint.leftof(&self.endpoint_low()) && !endpoint.rightof(&self.endpoint_high())
    }

    pub fn covers_point(&self, x: f64) -> bool {
        self.covers_endpoint(&Endpoint::point(x))
    }

    /// True if `other` lies within `self`.
    pub fn covers_interval(&self, other: &Interval) -> bool {
        RelationMask::INSIDE.contains(self.compare(other))
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        RelationMask::OVERLAP.contains(self.compare(other))
    }

    /// Classify `other` relative to `self`.
    ///
    /// ```
    /// use contracts::{Interval, Relation};
    ///
    /// let a = Interval::new(10.0, 20.0).unwrap();
    /// let b = Interval::new(0.0, 15.0).unwrap();
    /// assert_eq!(a.compare(&b), Relation::OverlapLeft);
    /// assert_eq!(b.compare(&a), Relation::OverlapRight);
    /// ```
    pub fn compare(&self, other: &Interval) -> Relation {
        let low = other.endpoint_low().compare(&self.endpoint_low());
        let high = other.endpoint_high().compare(&self.endpoint_high());
        match (low, high) {
            (Ordering::Less, Ordering::Less) => {
                if other.endpoint_high().leftof(&self.endpoint_low()) {
                    Relation::OutsideLeft
                } else {
                    Relation::OverlapLeft
                }
            }
            (Ordering::Greater, Ordering::Greater) => {
                if other.endpoint_low().rightof(&self.endpoint_high()) {
                    Relation::OutsideRight
                } else {
                    Relation::OverlapRight
                }
            }
            (Ordering::Equal, Ordering::Equal) => Relation::Equals,
            (Ordering::Equal, Ordering::Less)
            | (Ordering::Greater, Ordering::Less)
            | (Ordering::Greater, Ordering::Equal) => Relation::Covered,
            (Ordering::Equal, Ordering::Greater)
            | (Ordering::Less, Ordering::Greater)
            | (Ordering::Less, Ordering::Equal) => Relation::Covers,
        }
    }

    /// True if the relation of `other` to `self` is in `mask`.
    pub fn matches(&self, other: &Interval, mask: RelationMask) -> bool {
        mask.contains(self.compare(other))
    }

    pub fn point_type(&self, x: f64) -> PointType {
        if self.is_singular() && x == self.low {
            PointType::Singular
        } else if x == self.low {
            PointType::Low
        } else if x == self.high {
            PointType::High
        } else if self.covers_point(x) {
            PointType::Inside
        } else {
            PointType::Outside
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_singular() {
            return write!(f, "[{}]", self.low);
        }
        let open = if self.low_include { "[" } else { "(" };
        let close = if self.high_include { "]" } else { ")" };
        write!(f, "{}{},{}{}", open, self.low, self.high, close)
    }
}

/// Wire form of an interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalSpec {
    pub low: f64,
    pub high: f64,
    #[serde(default = "default_true")]
    pub low_include: bool,
    #[serde(default)]
    pub high_include: bool,
}

fn default_true() -> bool {
    true
}

impl TryFrom<IntervalSpec> for Interval {
    type Error = ContractError;

    fn try_from(spec: IntervalSpec) -> Result<Self, Self::Error> {
        Interval::with_bounds(spec.low, spec.high, spec.low_include, spec.high_include)
    }
}

impl From<Interval> for IntervalSpec {
    fn from(i: Interval) -> Self {
        Self {
            low: i.low,
            high: i.high,
            low_include: i.low_include,
            high_include: i.high_include,
        }
    }
}
