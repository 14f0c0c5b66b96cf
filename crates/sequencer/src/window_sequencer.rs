//! Window sequencer
//!
//! Tracks the cues overlapping a moving window `[A, B]`, where each end is
//! driven by its own motion source. Both sources must read the same clock.
//! Either end may be the lower one; the window is always `[min, max]`,
//! closed on both sides.
//!
//! # Playback
//!
//! Each end has its own [`Schedule`]. When an end crosses a cue endpoint the
//! outcome depends on three things: whether that end is currently the low
//! end, the high end or level with the other end; its direction of travel;
//! and which kind of endpoint it crossed. See [`window_action`].
//!
//! # Reconciliation
//!
//! Timing changes and cue batches recompute the active set with one overlap
//! lookup over the window. Reconciliation events carry the window's low end
//! as their point and no direction. A moving end parked exactly on a cue
//! endpoint is resolved against the window an instant later, since the
//! schedules never fire a crossing at the start of their window.

use std::cmp::Ordering;
use std::sync::Arc;

use axis::Axis;
use contracts::{
    BatchMap, Cause, ContractError, Cue, CueArg, CueEvent, CueKey, Direction, Handler, Interval,
    MotionRange, Observers, RelationMask, Semantic, SequencerConfig, SubscriptionId, Vector,
};
use indexmap::IndexMap;
use motion::model::{at, direction};
use motion::{MotionSource, EPSILON};
use observability::{record_active_cues, record_event_batch};
use tracing::{debug, info, instrument, warn};

use crate::engine::SEQUENCER_EVENTS;
use crate::ordering::{make_event, reorder, Verb};
use crate::schedule::{Schedule, Task};

/// Where the crossing end sits relative to the other end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndRole {
    Low,
    High,
    /// Both ends at the same position
    Level,
}

/// Kind of cue endpoint being crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Low,
    High,
    Singular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowAction {
    Enter,
    Exit,
    /// The cue remains inside the window
    Stay,
    /// Enter or exit, decided by the motion of the other end
    EnterExit,
}

/// Outcome of one end crossing one cue endpoint.
pub fn window_action(end: EndRole, forwards: bool, endpoint: EndpointRole) -> WindowAction {
    use EndRole as R;
    use EndpointRole as P;
    match (end, forwards, endpoint) {
        (R::Low, _, P::Low) | (R::High, _, P::High) => WindowAction::Stay,
        (R::Low, true, _) | (R::High, false, _) => WindowAction::Exit,
        (R::Low, false, _) | (R::High, true, _) => WindowAction::Enter,
        (R::Level, _, P::Singular) => WindowAction::EnterExit,
        (R::Level, true, P::Low) | (R::Level, false, P::High) => WindowAction::Enter,
        (R::Level, true, P::High) | (R::Level, false, P::Low) => WindowAction::Exit,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    A,
    B,
}

/// A window end: position and the sign of its next move.
type Edge = (f64, i8);

fn edge_cmp(x: &Edge, y: &Edge) -> Ordering {
    x.0.total_cmp(&y.0).then(x.1.cmp(&y.1))
}

/// Whether `interval` overlaps the window an instant after the ends move.
fn overlaps_after(interval: &Interval, a: Edge, b: Edge) -> bool {
    let (lo, hi) = if edge_cmp(&a, &b) == Ordering::Greater {
        (b, a)
    } else {
        (a, b)
    };
    let reaches_low = match interval.high().total_cmp(&lo.0) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => match lo.1.cmp(&0) {
            Ordering::Greater => false,
            Ordering::Less => true,
            Ordering::Equal => interval.high_include(),
        },
    };
    let reaches_high = match interval.low().total_cmp(&hi.0) {
        Ordering::Less => true,
        Ordering::Greater => false,
        Ordering::Equal => match hi.1.cmp(&0) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => interval.low_include(),
        },
    };
    reaches_low && reaches_high
}

fn window_of(a: f64, b: f64) -> Interval {
    let (low, high) = (a.min(b), a.max(b));
    Interval::closed(low, high).unwrap_or_else(|_| Interval::singular(low))
}

/// Restart a schedule at `now`: fresh window, crossings loaded, timer armed.
fn restart(
    schedule: &mut Schedule,
    axis: &Axis,
    vector: &Vector,
    range: &MotionRange,
    now: f64,
) -> Vec<Task> {
    schedule.advance(now, vector, range);
    if vector.is_moving() {
        schedule.load(axis, vector, range);
        schedule.run(now, axis, vector, range)
    } else {
        schedule.cancel();
        Vec::new()
    }
}

pub struct WindowSequencer<A, B> {
    a: A,
    b: B,
    axis: Axis,
    schedule_a: Schedule,
    schedule_b: Schedule,
    active: IndexMap<CueKey, Arc<Cue>>,
    ready: bool,
    observers: Observers<[CueEvent]>,
}

impl<A: MotionSource, B: MotionSource> WindowSequencer<A, B> {
    pub fn new(a: A, b: B, axis: Axis, config: &SequencerConfig) -> Result<Self, ContractError> {
        Ok(Self {
            a,
            b,
            axis,
            schedule_a: Schedule::new(config)?,
            schedule_b: Schedule::new(config)?,
            active: IndexMap::new(),
            ready: false,
            observers: Observers::new(SEQUENCER_EVENTS),
        })
    }

    pub fn source_a(&self) -> &A {
        &self.a
    }

    pub fn source_b(&self) -> &B {
        &self.b
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }

    pub fn active_keys(&self) -> Vec<CueKey> {
        self.active.keys().cloned().collect()
    }

    pub fn active_cues(&self) -> Vec<Arc<Cue>> {
        self.active.values().cloned().collect()
    }

    /// Current window `[min(A, B), max(A, B)]`.
    pub fn window(&self) -> Interval {
        window_of(self.a.query().position, self.b.query().position)
    }

    /// Earliest armed deadline of the two ends.
    pub fn next_deadline(&self) -> Option<f64> {
        match (self.schedule_a.deadline(), self.schedule_b.deadline()) {
            (Some(x), Some(y)) => Some(x.min(y)),
            (x, y) => x.or(y),
        }
    }

    /// Process a change of either motion. The first call yields INIT events.
    #[instrument(name = "window_timing_change", skip(self), fields(ready = self.ready))]
    pub fn on_timing_change(&mut self) -> Vec<CueEvent> {
        let cause = if self.ready {
            Cause::TimingChange
        } else {
            Cause::Init
        };
        self.ready = true;
        let events = self.reevaluate(cause, None);
        self.emit(&events);
        events
    }

    #[instrument(name = "window_update", skip(self, args), fields(entries = args.len()))]
    pub fn update(&mut self, args: Vec<CueArg>) -> Result<Vec<CueEvent>, ContractError> {
        let batch = self.axis.update(args)?;
        Ok(self.on_batch(&batch))
    }

    pub fn remove_cues_by_interval(
        &mut self,
        interval: &Interval,
        semantic: Semantic,
    ) -> Result<Vec<CueEvent>, ContractError> {
        let batch = self.axis.remove_cues_by_interval(interval, semantic)?;
        Ok(self.on_batch(&batch))
    }

    pub fn clear(&mut self) -> Vec<CueEvent> {
        let batch = self.axis.clear();
        self.on_batch(&batch)
    }

    fn on_batch(&mut self, batch: &BatchMap) -> Vec<CueEvent> {
        if !self.ready || batch.is_empty() {
            return Vec::new();
        }
        let events = self.reevaluate(Cause::CueChange, Some(batch));
        self.emit(&events);
        events
    }

    /// Deliver crossings of either end that have come due.
    #[instrument(name = "window_timeout", skip(self))]
    pub fn on_timeout(&mut self) -> Vec<CueEvent> {
        let now = self.a.now();
        let mut tasks = Vec::new();
        if self.schedule_a.on_timer(now) {
            let (vector, range) = (self.a.vector(), self.a.range());
            let due = self.schedule_a.run(now, &self.axis, &vector, &range);
            tasks.extend(due.into_iter().map(|t| (End::A, t)));
        }
        if self.schedule_b.on_timer(now) {
            let (vector, range) = (self.b.vector(), self.b.range());
            let due = self.schedule_b.run(now, &self.axis, &vector, &range);
            tasks.extend(due.into_iter().map(|t| (End::B, t)));
        }
        let events = self.playback(tasks, now);
        self.emit(&events);
        events
    }

    /// Subscribe to "change". A ready sequencer immediately sends the new
    /// subscriber an INIT batch entering every active cue.
    pub fn subscribe(
        &mut self,
        event: &str,
        handler: Handler<[CueEvent]>,
    ) -> Result<SubscriptionId, ContractError> {
        let id = self.observers.subscribe(event, handler)?;
        if self.ready && !self.active.is_empty() {
            let now = self.a.now();
            let low = self.window().low();
            let mut init: Vec<CueEvent> = self
                .active
                .values()
                .map(|cue| {
                    make_event(
                        cue,
                        low,
                        Direction::NoDirection,
                        Cause::Init,
                        Verb::Enter,
                        now,
                        now,
                    )
                })
                .collect();
            reorder(&mut init);
            self.observers.emit_to(id, &init[..]);
        }
        Ok(id)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Stop both schedules and drop all subscribers. The active set is kept.
    pub fn close(&mut self) {
        self.schedule_a.reset();
        self.schedule_b.reset();
        self.observers.clear();
        self.ready = false;
        info!(active = self.active.len(), "Window sequencer closed");
    }

    fn emit(&self, events: &[CueEvent]) {
        record_active_cues(self.active.len());
        if events.is_empty() {
            return;
        }
        record_event_batch(events);
        let failed = self.observers.emit("change", events);
        if failed > 0 {
            warn!(failed, "Some event handlers failed");
        }
    }

    fn reevaluate(&mut self, cause: Cause, batch: Option<&BatchMap>) -> Vec<CueEvent> {
        let va = self.a.query();
        let vb = self.b.query();
        let now = va.timestamp;
        let window = window_of(va.position, vb.position);
        let low = window.low();

        let next: IndexMap<CueKey, Arc<Cue>> = self
            .axis
            .lookup(&window, RelationMask::OVERLAP)
            .into_iter()
            .map(|cue| (cue.key.clone(), cue))
            .collect();

        let mut events = Vec::new();
        let event = |cue: &Arc<Cue>, cause, verb| {
            make_event(cue, low, Direction::NoDirection, cause, verb, now, now)
        };
        for (key, cue) in &self.active {
            if !next.contains_key(key) {
                events.push(event(cue, cause, Verb::Exit));
            }
        }
        for (key, cue) in &next {
            if !self.active.contains_key(key) {
                events.push(event(cue, cause, Verb::Enter));
            }
        }
        if let Some(batch) = batch {
            for (key, change) in batch {
                let (Some(_), Some(new)) = (&change.old, &change.new) else {
                    continue;
                };
                if self.active.contains_key(key) && next.contains_key(key) {
                    events.push(event(new, cause, Verb::Change));
                }
            }
        }
        self.active = next;

        if va.is_moving() || vb.is_moving() {
            self.resolve_parked_ends(&va, &vb, now, &mut events);
        }
        reorder(&mut events);

        let mut tasks: Vec<(End, Task)> = Vec::new();
        let range_a = self.a.range();
        let range_b = self.b.range();
        let due_a = restart(&mut self.schedule_a, &self.axis, &va, &range_a, now);
        tasks.extend(due_a.into_iter().map(|t| (End::A, t)));
        let due_b = restart(&mut self.schedule_b, &self.axis, &vb, &range_b, now);
        tasks.extend(due_b.into_iter().map(|t| (End::B, t)));
        events.extend(self.playback(tasks, now));

        debug!(
            cause = %cause,
            events = events.len(),
            active = self.active.len(),
            window = %window,
            "Window reevaluated"
        );
        events
    }

    /// Cues with an endpoint under a moving end change state the moment the
    /// end leaves it.
    fn resolve_parked_ends(&mut self, va: &Vector, vb: &Vector, now: f64, events: &mut Vec<CueEvent>) {
        let dir_a = direction(va, now);
        let dir_b = direction(vb, now);
        let edge_a = (va.position, dir_a.signum());
        let edge_b = (vb.position, dir_b.signum());

        let mut parked = self.axis.cues_at(va.position);
        parked.extend(self.axis.cues_at(vb.position));
        let mut seen: Vec<CueKey> = Vec::new();
        for cp in parked {
            let key = &cp.cue.key;
            if seen.contains(key) {
                continue;
            }
            seen.push(key.clone());

            let dir = if cp.point == va.position { dir_a } else { dir_b };
            let event = |verb| make_event(&cp.cue, cp.point, dir, Cause::Playback, verb, now, now);
            let after = overlaps_after(&cp.cue.interval, edge_a, edge_b);
            if !after && self.active.shift_remove(key).is_some() {
                events.push(event(Verb::Exit));
            } else if after && !self.active.contains_key(key) {
                self.active.insert(key.clone(), cp.cue.clone());
                events.push(event(Verb::Enter));
            }
        }
    }

    fn playback(&mut self, mut tasks: Vec<(End, Task)>, delivered: f64) -> Vec<CueEvent> {
        if tasks.is_empty() {
            return Vec::new();
        }
        tasks.sort_by(|x, y| x.1.due.total_cmp(&y.1.due));
        let va = self.a.vector();
        let vb = self.b.vector();
        let mut events = Vec::with_capacity(tasks.len());
        for (end, task) in tasks {
            let (this, other) = match end {
                End::A => (&va, &vb),
                End::B => (&vb, &va),
            };
            self.apply_task(&task, this, other, delivered, &mut events);
        }
        reorder(&mut events);
        events
    }

    fn apply_task(
        &mut self,
        task: &Task,
        this: &Vector,
        other: &Vector,
        delivered: f64,
        events: &mut Vec<CueEvent>,
    ) {
        let dir = direction(this, task.due);
        let forwards = dir == Direction::Forwards;
        let other_now = at(other, task.due);
        let role = if (task.point - other_now.position).abs() < EPSILON {
            EndRole::Level
        } else if task.point < other_now.position {
            EndRole::Low
        } else {
            EndRole::High
        };
        let endpoint = if task.endpoint.singular {
            EndpointRole::Singular
        } else if task.endpoint.right {
            EndpointRole::High
        } else {
            EndpointRole::Low
        };

        let enter = match window_action(role, forwards, endpoint) {
            WindowAction::Enter | WindowAction::Stay => true,
            WindowAction::Exit => false,
            // A paused other end holds the point inside the window; a moving
            // one keeps it only when the ends travel apart.
            WindowAction::EnterExit => {
                !other_now.is_moving() || direction(other, task.due) != dir
            }
        };

        let key = &task.cue.key;
        let event = |verb| {
            make_event(
                &task.cue,
                task.point,
                dir,
                Cause::Playback,
                verb,
                task.due,
                delivered,
            )
        };
        if enter && !self.active.contains_key(key) {
            self.active.insert(key.clone(), task.cue.clone());
            events.push(event(Verb::Enter));
        } else if !enter && self.active.shift_remove(key).is_some() {
            events.push(event(Verb::Exit));
        }
    }
}

impl<A, B> std::fmt::Debug for WindowSequencer<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowSequencer")
            .field("axis", &self.axis)
            .field("schedule_a", &self.schedule_a)
            .field("schedule_b", &self.schedule_b)
            .field("active", &self.active.len())
            .field("ready", &self.ready)
            .finish()
    }
}
