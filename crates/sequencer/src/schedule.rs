//! Lookahead schedule
//!
//! The schedule covers one time window `[start, start + lookahead)` at a
//! time. On load it fetches every cue endpoint the motion can reach within
//! the window and solves the crossing time of each one. Due tasks are drained
//! in time order; a single armed deadline tells the owner when to come back.

use std::collections::VecDeque;
use std::sync::Arc;

use axis::{Axis, CuePoint};
use contracts::{ContractError, Cue, Endpoint, Interval, MotionRange, SequencerConfig, Vector};
use motion::model::{at, crossings, position_envelope, range_delta, round_epsilon};
use motion::EPSILON;
use observability::record_schedule_load;
use tracing::{debug, instrument};

/// A solved crossing waiting to be delivered.
#[derive(Debug, Clone)]
pub struct Task {
    /// Absolute time of the crossing
    pub due: f64,
    pub point: f64,
    pub endpoint: Endpoint,
    pub cue: Arc<Cue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug)]
pub struct Schedule {
    lookahead: f64,
    window: Option<Window>,
    pos_interval: Option<Interval>,
    queue: VecDeque<Task>,
    timer: Option<f64>,
}

impl Schedule {
    pub fn new(config: &SequencerConfig) -> Result<Self, ContractError> {
        let lookahead = config.lookahead_s;
        if !(lookahead.is_finite() && lookahead > 0.0) {
            return Err(ContractError::config_validation(
                "sequencer.lookahead_s",
                format!("must be a positive number of seconds, got {lookahead}"),
            ));
        }
        Ok(Self {
            lookahead,
            window: None,
            pos_interval: None,
            queue: VecDeque::new(),
            timer: None,
        })
    }

    pub fn lookahead(&self) -> f64 {
        self.lookahead
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    /// Positions reachable within the current window.
    pub fn pos_interval(&self) -> Option<&Interval> {
        self.pos_interval.as_ref()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn next_due(&self) -> Option<f64> {
        self.queue.front().map(|t| t.due)
    }

    /// True once `now` has reached the end of the window, or before the
    /// first window.
    pub fn is_expired(&self, now: f64) -> bool {
        self.window.map_or(true, |w| now >= w.end)
    }

    /// Start a fresh window at `start`. Queued tasks are discarded.
    pub fn advance(&mut self, start: f64, vector: &Vector, range: &MotionRange) {
        let origin = at(vector, start);
        let (low, high) = position_envelope(&origin, self.lookahead);
        let low = round_epsilon(range.clamp(low));
        let high = round_epsilon(range.clamp(high));
        self.pos_interval = Interval::closed(low.min(high), high.max(low)).ok();
        self.window = Some(Window {
            start,
            end: start + self.lookahead,
        });
        self.queue.clear();
    }

    /// Solve crossings for every cue endpoint within the position interval.
    ///
    /// Crossings are dropped when they sit at the very start of the window,
    /// at or after the motion leaves its range, or when the motion only
    /// touches an interval endpoint and turns back. Returns the number of
    /// tasks queued.
    #[instrument(name = "schedule_load", skip_all, fields(window = ?self.window))]
    pub fn load(&mut self, axis: &Axis, vector: &Vector, range: &MotionRange) -> usize {
        let (Some(window), Some(pos)) = (self.window, self.pos_interval) else {
            return 0;
        };
        let origin = at(vector, window.start);
        let range_dt = range_delta(&origin, range).map_or(f64::INFINITY, |(dt, _)| dt);
        let points = axis.get_cue_points_by_interval(&pos);

        let mut tasks = Vec::new();
        let mut dropped = 0;
        for c in crossings(
            &origin,
            self.lookahead,
            points.into_iter().map(|p| (p.point, p)),
        ) {
            if c.dt <= 0.0 || c.dt >= range_dt || is_touch(&c.item, &origin, c.dt) {
                dropped += 1;
                continue;
            }
            tasks.push(Task {
                due: window.start + c.dt,
                point: c.point,
                endpoint: c.item.endpoint,
                cue: c.item.cue,
            });
        }

        let loaded = tasks.len();
        self.queue.extend(tasks);
        self.queue
            .make_contiguous()
            .sort_by(|a, b| a.due.total_cmp(&b.due));
        record_schedule_load(loaded, dropped);
        debug!(loaded, dropped, pos = %pos, "Schedule loaded");
        loaded
    }

    /// Remove and return every task due at or before `now`, in time order.
    pub fn pop(&mut self, now: f64) -> Vec<Task> {
        let mut due = Vec::new();
        while self.queue.front().is_some_and(|t| t.due <= now) {
            if let Some(task) = self.queue.pop_front() {
                due.push(task);
            }
        }
        due
    }

    /// Drain due tasks, rolling the window forward while it has expired.
    ///
    /// Each new window starts where the previous one ended, so crossings are
    /// never skipped after a late wake-up. Leaves the timer armed at the
    /// next due task or the window end, whichever comes first; a stationary
    /// motion cancels it instead.
    pub fn run(
        &mut self,
        now: f64,
        axis: &Axis,
        vector: &Vector,
        range: &MotionRange,
    ) -> Vec<Task> {
        let mut due = self.pop(now);
        if !vector.is_moving() {
            self.cancel();
            return due;
        }
        while self.is_expired(now) {
            let start = self.window.map_or(now, |w| w.end);
            self.advance(start, vector, range);
            self.load(axis, vector, range);
            due.extend(self.pop(now));
        }
        self.arm();
        due
    }

    /// Arm the timer at the next due task, bounded by the window end.
    pub fn arm(&mut self) {
        self.timer = self.window.map(|w| match self.next_due() {
            Some(due) => due.min(w.end),
            None => w.end,
        });
    }

    /// Armed deadline, if any.
    pub fn deadline(&self) -> Option<f64> {
        self.timer
    }

    pub fn cancel(&mut self) {
        self.timer = None;
    }

    /// Consume the armed deadline if it has been reached.
    ///
    /// An early wake-up leaves the timer armed and returns false.
    pub fn on_timer(&mut self, now: f64) -> bool {
        match self.timer {
            Some(target) if now >= target => {
                self.timer = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the window, the queue and the timer.
    pub fn reset(&mut self) {
        self.window = None;
        self.pos_interval = None;
        self.queue.clear();
        self.timer = None;
    }
}

/// Interval endpoints reached with zero velocity are touched, not crossed.
fn is_touch(point: &CuePoint, origin: &Vector, dt: f64) -> bool {
    if point.endpoint.singular {
        return false;
    }
    at(origin, origin.timestamp + dt).velocity.abs() < EPSILON
}
