//! Converters: stateless transforms composed over a motion source.
//!
//! ```
//! use std::sync::Arc;
//! use contracts::MotionConfig;
//! use motion::{ManualClock, MotionSource, MotionSourceExt, TimingObject};
//!
//! let clock = ManualClock::new(0.0);
//! let base = TimingObject::new(Arc::new(clock.clone()), MotionConfig {
//!     velocity: 1.0,
//!     ..Default::default()
//! }).unwrap();
//! let shifted = base.clone().skew(100.0).time_shift(2.0);
//! clock.set(1.0);
//! assert_eq!(shifted.query().position, 103.0);
//! ```

use contracts::{MotionRange, Vector};
use tokio::sync::watch;

use crate::model::at;
use crate::MotionSource;

/// Reads the inner motion `offset` seconds ahead (negative = behind).
#[derive(Debug, Clone)]
pub struct TimeShift<S> {
    inner: S,
    offset: f64,
}

/// Adds a constant to every position.
#[derive(Debug, Clone)]
pub struct Skew<S> {
    inner: S,
    offset: f64,
}

/// Multiplies position, velocity and acceleration by a factor.
#[derive(Debug, Clone)]
pub struct Scale<S> {
    inner: S,
    factor: f64,
}

impl<S: MotionSource> MotionSource for TimeShift<S> {
    fn vector(&self) -> Vector {
        let v = self.inner.vector();
        Vector {
            timestamp: v.timestamp,
            ..at(&v, v.timestamp + self.offset)
        }
    }

    fn range(&self) -> MotionRange {
        self.inner.range()
    }

    fn now(&self) -> f64 {
        self.inner.now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        self.inner.changes()
    }
}

impl<S: MotionSource> MotionSource for Skew<S> {
    fn vector(&self) -> Vector {
        let v = self.inner.vector();
        Vector {
            position: v.position + self.offset,
            ..v
        }
    }

    fn range(&self) -> MotionRange {
        let r = self.inner.range();
        MotionRange::new(r.low + self.offset, r.high + self.offset)
    }

    fn now(&self) -> f64 {
        self.inner.now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        self.inner.changes()
    }
}

impl<S: MotionSource> MotionSource for Scale<S> {
    fn vector(&self) -> Vector {
        let v = self.inner.vector();
        Vector {
            position: v.position * self.factor,
            velocity: v.velocity * self.factor,
            acceleration: v.acceleration * self.factor,
            timestamp: v.timestamp,
        }
    }

    fn range(&self) -> MotionRange {
        let r = self.inner.range();
        let (a, b) = (r.low * self.factor, r.high * self.factor);
        MotionRange::new(a.min(b), a.max(b))
    }

    fn now(&self) -> f64 {
        self.inner.now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        self.inner.changes()
    }
}

/// Builder methods for wrapping any motion source.
pub trait MotionSourceExt: MotionSource + Sized {
    fn time_shift(self, offset: f64) -> TimeShift<Self> {
        TimeShift {
            inner: self,
            offset,
        }
    }

    fn skew(self, offset: f64) -> Skew<Self> {
        Skew {
            inner: self,
            offset,
        }
    }

    /// `factor` must be finite and non-zero.
    fn scale(self, factor: f64) -> Scale<Self> {
        Scale {
            inner: self,
            factor,
        }
    }
}

impl<S: MotionSource + Sized> MotionSourceExt for S {}
