//! Kinematic vector and motion range

use serde::{Deserialize, Serialize};
use std::fmt;

/// Motion snapshot: position, velocity and acceleration valid at `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    pub position: f64,
    pub velocity: f64,
    pub acceleration: f64,
    /// Monotonic seconds
    pub timestamp: f64,
}

impl Vector {
    pub const fn new(position: f64, velocity: f64, acceleration: f64, timestamp: f64) -> Self {
        Self {
            position,
            velocity,
            acceleration,
            timestamp,
        }
    }

    /// Stationary at `position`.
    pub const fn at_rest(position: f64, timestamp: f64) -> Self {
        Self::new(position, 0.0, 0.0, timestamp)
    }

    #[inline]
    pub fn is_moving(&self) -> bool {
        self.velocity != 0.0 || self.acceleration != 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.velocity.is_finite()
            && self.acceleration.is_finite()
            && self.timestamp.is_finite()
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p={} v={} a={} @{}",
            self.position, self.velocity, self.acceleration, self.timestamp
        )
    }
}

/// Legal position range of a motion.
///
/// Infinite bounds are left out when serialized; JSON has no infinity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionRange {
    #[serde(default = "neg_inf", skip_serializing_if = "is_infinite")]
    pub low: f64,
    #[serde(default = "pos_inf", skip_serializing_if = "is_infinite")]
    pub high: f64,
}

fn is_infinite(x: &f64) -> bool {
    x.is_infinite()
}

fn neg_inf() -> f64 {
    f64::NEG_INFINITY
}

fn pos_inf() -> f64 {
    f64::INFINITY
}

impl MotionRange {
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub const fn unbounded() -> Self {
        Self::new(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn clamp(&self, x: f64) -> f64 {
        x.max(self.low).min(self.high)
    }
}

impl Default for MotionRange {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Forwards,
    Backwards,
    #[serde(rename = "NONE")]
    NoDirection,
}

impl Direction {
    pub fn from_sign(x: f64) -> Self {
        if x > 0.0 {
            Direction::Forwards
        } else if x < 0.0 {
            Direction::Backwards
        } else {
            Direction::NoDirection
        }
    }

    pub fn signum(self) -> i8 {
        match self {
            Direction::Forwards => 1,
            Direction::Backwards => -1,
            Direction::NoDirection => 0,
        }
    }
}
