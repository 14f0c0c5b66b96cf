//! MotionSource trait - the capability the sequencer is driven by
//!
//! A motion source supplies a vector, a legal range, a clock and change
//! notifications. Concrete sources ([`crate::TimingObject`]) and converters
//! ([`crate::convert`]) all implement the same trait, so converters compose
//! by wrapping.

use std::sync::Arc;

use contracts::{MotionRange, Vector};
use tokio::sync::watch;

use crate::model::{at, check_range};

pub trait MotionSource: Send + Sync {
    /// Latest vector snapshot (valid at its own timestamp).
    fn vector(&self) -> Vector;

    fn range(&self) -> MotionRange;

    /// Current time on the source clock, in seconds.
    fn now(&self) -> f64;

    /// Receiver that is notified on every jump or speed/acceleration edit.
    fn changes(&self) -> watch::Receiver<Vector>;

    /// Vector evaluated at `now`, clamped to the range.
    fn query(&self) -> Vector {
        let now = self.now();
        check_range(at(&self.vector(), now), &self.range())
    }
}

impl<S: MotionSource + ?Sized> MotionSource for Arc<S> {
    fn vector(&self) -> Vector {
        (**self).vector()
    }

    fn range(&self) -> MotionRange {
        (**self).range()
    }

    fn now(&self) -> f64 {
        (**self).now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        (**self).changes()
    }

    fn query(&self) -> Vector {
        (**self).query()
    }
}

impl<S: MotionSource + ?Sized> MotionSource for Box<S> {
    fn vector(&self) -> Vector {
        (**self).vector()
    }

    fn range(&self) -> MotionRange {
        (**self).range()
    }

    fn now(&self) -> f64 {
        (**self).now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        (**self).changes()
    }

    fn query(&self) -> Vector {
        (**self).query()
    }
}
