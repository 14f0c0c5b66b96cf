//! TimingObject - concrete, locally controlled motion source
//!
//! Holds the current vector in a `watch` channel: `update` replaces it and
//! wakes every receiver obtained through [`MotionSource::changes`].
//! Clones share the same state.

use std::sync::Arc;
use std::time::Duration;

use contracts::{ContractError, MotionConfig, MotionRange, MotionUpdate, Vector};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::model::{at, check_range, range_delta};
use crate::MotionSource;

#[derive(Clone)]
pub struct TimingObject {
    inner: Arc<Inner>,
}

struct Inner {
    clock: Arc<dyn Clock>,
    range: MotionRange,
    tx: watch::Sender<Vector>,
}

impl TimingObject {
    pub fn new(clock: Arc<dyn Clock>, config: MotionConfig) -> Result<Self, ContractError> {
        let MotionConfig {
            position,
            velocity,
            acceleration,
            range,
        } = config;
        if !(position.is_finite() && velocity.is_finite() && acceleration.is_finite()) {
            return Err(ContractError::config_validation(
                "motion",
                "position, velocity and acceleration must be finite",
            ));
        }
        if range.low.is_nan() || range.high.is_nan() || range.low > range.high {
            return Err(ContractError::config_validation(
                "motion.range",
                format!("invalid range [{}, {}]", range.low, range.high),
            ));
        }
        let now = clock.now();
        let initial = check_range(Vector::new(position, velocity, acceleration, now), &range);
        let (tx, _) = watch::channel(initial);
        Ok(Self {
            inner: Arc::new(Inner { clock, range, tx }),
        })
    }

    /// Apply a motion edit at the current time.
    ///
    /// Fields left out keep their extrapolated value. A position outside the
    /// range is pinned to the violated bound and stopped.
    pub fn update(&self, update: MotionUpdate) -> Result<Vector, ContractError> {
        for (field, value) in [
            ("position", update.position),
            ("velocity", update.velocity),
            ("acceleration", update.acceleration),
        ] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ContractError::config_validation(field, "must be finite"));
            }
        }
        let now = self.inner.clock.now();
        let current = at(&self.vector(), now);
        let next = check_range(
            Vector {
                position: update.position.unwrap_or(current.position),
                velocity: update.velocity.unwrap_or(current.velocity),
                acceleration: update.acceleration.unwrap_or(current.acceleration),
                timestamp: now,
            },
            &self.inner.range,
        );
        info!(vector = %next, "Motion updated");
        self.inner.tx.send_replace(next);
        Ok(next)
    }

    /// Absolute time at which the motion leaves its range, if ever.
    pub fn range_deadline(&self) -> Option<f64> {
        let v = self.vector();
        range_delta(&v, &self.inner.range).map(|(dt, _)| v.timestamp + dt)
    }

    /// Stop at the violated bound once the range deadline has passed.
    ///
    /// Returns the new vector when a stop was applied.
    pub fn enforce_range(&self) -> Option<Vector> {
        let v = self.vector();
        let (dt, bound) = range_delta(&v, &self.inner.range)?;
        let now = self.inner.clock.now();
        // Microsecond tolerance for clocks that wake a hair early.
        if v.timestamp + dt > now + 1e-6 {
            return None;
        }
        let stopped = Vector::at_rest(bound, now);
        debug!(bound, at = now, "Range boundary reached, motion stopped");
        self.inner.tx.send_replace(stopped);
        Some(stopped)
    }

    /// Sleep until each range deadline and stop the motion there.
    ///
    /// Runs until the task is aborted.
    pub async fn run_range_guard(self) {
        let mut rx = self.inner.tx.subscribe();
        loop {
            let wait = self
                .range_deadline()
                .map(|t| (t - self.now()).max(0.0));
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs_f64(wait.unwrap_or(0.0))), if wait.is_some() => {
                    // The stop itself notifies `rx`; mark it seen.
                    if self.enforce_range().is_some() {
                        rx.borrow_and_update();
                    }
                }
            }
        }
    }
}

impl MotionSource for TimingObject {
    fn vector(&self) -> Vector {
        *self.inner.tx.borrow()
    }

    fn range(&self) -> MotionRange {
        self.inner.range
    }

    fn now(&self) -> f64 {
        self.inner.clock.now()
    }

    fn changes(&self) -> watch::Receiver<Vector> {
        self.inner.tx.subscribe()
    }
}

impl std::fmt::Debug for TimingObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimingObject")
            .field("vector", &self.vector())
            .field("range", &self.inner.range)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, SystemClock};

    fn object(clock: &ManualClock, config: MotionConfig) -> TimingObject {
        TimingObject::new(Arc::new(clock.clone()), config).unwrap()
    }

    #[test]
    fn test_update_keeps_extrapolated_fields() {
        let clock = ManualClock::new(0.0);
        let to = object(
            &clock,
            MotionConfig {
                velocity: 2.0,
                ..Default::default()
            },
        );
        clock.set(5.0);
        let v = to.update(MotionUpdate::velocity(-1.0)).unwrap();
        assert_eq!(v, Vector::new(10.0, -1.0, 0.0, 5.0));
        assert_eq!(to.query().position, 10.0);
    }

    #[test]
    fn test_changes_notified() {
        let clock = ManualClock::new(0.0);
        let to = object(&clock, MotionConfig::default());
        let mut rx = to.changes();
        assert!(!rx.has_changed().unwrap());
        to.update(MotionUpdate::jump(50.0)).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().position, 50.0);
    }

    #[test]
    fn test_rejects_non_finite() {
        let clock = ManualClock::new(0.0);
        let to = object(&clock, MotionConfig::default());
        assert!(to.update(MotionUpdate::velocity(f64::NAN)).is_err());
        let bad = MotionConfig {
            range: MotionRange::new(10.0, 0.0),
            ..Default::default()
        };
        assert!(TimingObject::new(Arc::new(clock), bad).is_err());
    }

    #[test]
    fn test_range_enforcement() {
        let clock = ManualClock::new(0.0);
        let to = object(
            &clock,
            MotionConfig {
                velocity: 1.0,
                range: MotionRange::new(0.0, 10.0),
                ..Default::default()
            },
        );
        assert_eq!(to.range_deadline(), Some(10.0));
        clock.set(9.0);
        assert!(to.enforce_range().is_none());
        clock.set(10.5);
        assert_eq!(to.enforce_range(), Some(Vector::at_rest(10.0, 10.5)));
        assert_eq!(to.range_deadline(), None);

        // Jumping outside the range pins to the bound.
        let v = to.update(MotionUpdate::jump(-3.0)).unwrap();
        assert_eq!(v.position, 0.0);
        assert!(!v.is_moving());
    }

    #[tokio::test(start_paused = true)]
    async fn test_range_guard_stops_motion() {
        let to = TimingObject::new(
            Arc::new(SystemClock::new()),
            MotionConfig {
                velocity: 2.0,
                range: MotionRange::new(0.0, 4.0),
                ..Default::default()
            },
        )
        .unwrap();
        let guard = tokio::spawn(to.clone().run_range_guard());
        tokio::time::sleep(Duration::from_secs(3)).await;
        let v = to.vector();
        assert_eq!(v.position, 4.0);
        assert!(!v.is_moving());
        guard.abort();
    }
}
