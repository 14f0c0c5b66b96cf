//! Closed-form kinematics.
//!
//! All functions are pure. Times returned by the solvers are relative to the
//! vector's own timestamp.

use contracts::{Direction, MotionRange, Vector};
use tracing::debug;

/// Rounding granularity for solved crossing times.
pub const EPSILON: f64 = 1e-10;

/// Round to the nearest multiple of [`EPSILON`].
#[inline]
pub fn round_epsilon(x: f64) -> f64 {
    if !x.is_finite() {
        return x;
    }
    (x / EPSILON).round() * EPSILON
}

/// Evaluate `vector` at absolute time `t`.
pub fn at(vector: &Vector, t: f64) -> Vector {
    let dt = t - vector.timestamp;
    Vector {
        position: vector.position
            + vector.velocity * dt
            + 0.5 * vector.acceleration * dt * dt,
        velocity: vector.velocity + vector.acceleration * dt,
        acceleration: vector.acceleration,
        timestamp: t,
    }
}

/// Times (relative, ascending) at which the position equals `x`.
pub fn solve(vector: &Vector, x: f64) -> Vec<f64> {
    let (p, v, a) = (vector.position, vector.velocity, vector.acceleration);
    if a == 0.0 {
        if v == 0.0 {
            return if p == x { vec![0.0] } else { Vec::new() };
        }
        return vec![(x - p) / v];
    }
    let discriminant = v * v - 2.0 * a * (p - x);
    if discriminant < 0.0 {
        Vec::new()
    } else if discriminant == 0.0 {
        vec![-v / a]
    } else {
        let s = discriminant.sqrt();
        let (t1, t2) = ((-v - s) / a, (-v + s) / a);
        if t1 <= t2 {
            vec![t1, t2]
        } else {
            vec![t2, t1]
        }
    }
}

/// Smallest strictly positive solution of `solve`.
pub fn min_positive_solution(vector: &Vector, x: f64) -> Option<f64> {
    solve(vector, x)
        .into_iter()
        .filter(|t| *t > 0.0)
        .min_by(f64::total_cmp)
}

/// Earliest `(dt, boundary)` at which the motion reaches a range bound.
///
/// Infinite bounds are never reached.
pub fn range_delta(vector: &Vector, range: &MotionRange) -> Option<(f64, f64)> {
    [range.low, range.high]
        .into_iter()
        .filter(|b| b.is_finite())
        .filter_map(|b| min_positive_solution(vector, b).map(|dt| (dt, b)))
        .min_by(|a, b| a.0.total_cmp(&b.0))
}

/// Closed position range covered over `[0, dt]`.
pub fn position_envelope(vector: &Vector, dt: f64) -> (f64, f64) {
    let p0 = vector.position;
    let p1 = at(vector, vector.timestamp + dt).position;
    let (mut low, mut high) = (p0.min(p1), p0.max(p1));
    if vector.acceleration != 0.0 {
        let turn = -vector.velocity / vector.acceleration;
        if (0.0..=dt).contains(&turn) {
            let vertex = p0 - vector.velocity * vector.velocity / (2.0 * vector.acceleration);
            low = low.min(vertex);
            high = high.max(vertex);
        }
    }
    (low, high)
}

/// A solved boundary crossing.
#[derive(Debug, Clone, PartialEq)]
pub struct Crossing<T> {
    /// Seconds after the vector timestamp, rounded to [`EPSILON`]
    pub dt: f64,
    pub point: f64,
    pub item: T,
}

/// All crossings of `points` within `[0, dt]`, ascending by time.
pub fn crossings<T, I>(vector: &Vector, dt: f64, points: I) -> Vec<Crossing<T>>
where
    T: Clone,
    I: IntoIterator<Item = (f64, T)>,
{
    let limit = round_epsilon(dt);
    let mut out = Vec::new();
    for (point, item) in points {
        for root in solve(vector, point) {
            let t = round_epsilon(root);
            if t < 0.0 || t > limit {
                // Far roots are the other branch of the parabola; only near
                // misses are worth a diagnostic.
                if t > -1e-6 && t < limit + 1e-6 {
                    debug!(point, root, window = dt, "Dropped crossing outside window");
                }
                continue;
            }
            out.push(Crossing {
                dt: t,
                point,
                item: item.clone(),
            });
        }
    }
    out.sort_by(|a, b| a.dt.total_cmp(&b.dt));
    out
}

/// Direction of travel at absolute time `t`.
pub fn direction(vector: &Vector, t: f64) -> Direction {
    let v = at(vector, t);
    if v.velocity != 0.0 {
        Direction::from_sign(v.velocity)
    } else {
        Direction::from_sign(v.acceleration)
    }
}

/// Position relative to a motion range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeState {
    Inside,
    OutsideLow,
    OutsideHigh,
}

pub fn range_state(position: f64, range: &MotionRange) -> RangeState {
    if position < range.low {
        RangeState::OutsideLow
    } else if position > range.high {
        RangeState::OutsideHigh
    } else {
        RangeState::Inside
    }
}

/// A vector outside its range is pinned to the violated bound and stopped.
pub fn check_range(vector: Vector, range: &MotionRange) -> Vector {
    match range_state(vector.position, range) {
        RangeState::Inside => vector,
        RangeState::OutsideLow => Vector::at_rest(range.low, vector.timestamp),
        RangeState::OutsideHigh => Vector::at_rest(range.high, vector.timestamp),
    }
}
