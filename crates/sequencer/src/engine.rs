//! Sequencer engine
//!
//! # Reconciliation
//!
//! A timing change or a cue batch recomputes the active set from scratch:
//! the cues covering the current position. The difference with the previous
//! set yields EXIT and ENTER events; cues active on both sides whose stored
//! value changed yield CHANGE events.
//!
//! A position sitting exactly on a cue endpoint needs extra care while
//! moving, because the schedule never fires a crossing at the start of its
//! window:
//! - a singular cue, or a closed endpoint being left, exits immediately
//! - an open endpoint being entered enters immediately
//!
//! # Playback
//!
//! Between reconciliations the schedule delivers crossings. The verb of a
//! crossing follows from the endpoint side and the direction of travel:
//! `-(side * direction)` with LOW = -1 and HIGH = 1, positive meaning ENTER.
//! A singular cue is entered and exited at once.

use std::sync::Arc;

use axis::Axis;
use contracts::{
    BatchMap, Cause, ContractError, Cue, CueArg, CueEvent, CueKey, Direction, Handler, Interval,
    Observers, PointType, RelationMask, Semantic, SequencerConfig, SubscriptionId, Vector,
};
use indexmap::IndexMap;
use motion::model::direction;
use motion::MotionSource;
use observability::{record_active_cues, record_event_batch};
use tracing::{debug, info, instrument, warn};

use crate::ordering::{make_event, reorder, Verb};
use crate::schedule::{Schedule, Task};

/// Events a sequencer emits.
pub const SEQUENCER_EVENTS: &[&str] = &["change"];

pub struct Sequencer<S> {
    source: S,
    axis: Axis,
    schedule: Schedule,
    active: IndexMap<CueKey, Arc<Cue>>,
    ready: bool,
    observers: Observers<[CueEvent]>,
}

impl<S: MotionSource> Sequencer<S> {
    pub fn new(source: S, axis: Axis, config: &SequencerConfig) -> Result<Self, ContractError> {
        Ok(Self {
            source,
            axis,
            schedule: Schedule::new(config)?,
            active: IndexMap::new(),
            ready: false,
            observers: Observers::new(SEQUENCER_EVENTS),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// True after the first timing change has been processed.
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

    /// Absolute time the owner must call [`Self::on_timeout`] at.
    pub fn next_deadline(&self) -> Option<f64> {
        self.schedule.deadline()
    }

    /// Process a new motion vector. The first call yields INIT events.
    #[instrument(name = "sequencer_timing_change", skip(self), fields(ready = self.ready))]
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

    /// Apply a cue batch to the axis and reconcile.
    #[instrument(name = "sequencer_update", skip(self, args), fields(entries = args.len()))]
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

    /// Remove every cue. Active cues exit with cause CUE_CHANGE.
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

    /// Deliver crossings that have come due.
    ///
    /// Does nothing if the armed deadline has not been reached yet.
    #[instrument(name = "sequencer_timeout", skip(self))]
    pub fn on_timeout(&mut self) -> Vec<CueEvent> {
        let now = self.source.now();
        if !self.schedule.on_timer(now) {
            return Vec::new();
        }
        let events = self.playback(now);
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
            let vector = self.source.query();
            let dir = direction(&vector, vector.timestamp);
            let delivered = self.source.now();
            let mut init: Vec<CueEvent> = self
                .active
                .values()
                .map(|cue| {
                    make_event(
                        cue,
                        vector.position,
                        dir,
                        Cause::Init,
                        Verb::Enter,
                        vector.timestamp,
                        delivered,
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

    /// Stop scheduling and drop all subscribers. The active set is kept.
    pub fn close(&mut self) {
        self.schedule.reset();
        self.observers.clear();
        self.ready = false;
        info!(active = self.active.len(), "Sequencer closed");
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
        let vector = self.source.query();
        let range = self.source.range();
        let now = vector.timestamp;
        let pos = vector.position;
        let dir = direction(&vector, now);
        let delivered = self.source.now();

        let next: IndexMap<CueKey, Arc<Cue>> = self
            .axis
            .lookup(&Interval::singular(pos), RelationMask::OVERLAP)
            .into_iter()
            .map(|cue| (cue.key.clone(), cue))
            .collect();

        let mut events = Vec::new();
        let event = |cue: &Arc<Cue>, cause, verb| make_event(cue, pos, dir, cause, verb, now, delivered);
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

        if vector.is_moving() {
            for cp in self.axis.cues_at(pos) {
                let key = &cp.cue.key;
                if cp.endpoint.singular {
                    if self.active.shift_remove(key).is_some() {
                        events.push(event(&cp.cue, Cause::Playback, Verb::Exit));
                    }
                    continue;
                }
                let leaving = match cp.cue.interval.point_type(pos) {
                    PointType::Low => dir == Direction::Backwards,
                    PointType::High => dir == Direction::Forwards,
                    _ => continue,
                };
                if leaving && cp.endpoint.closed {
                    if self.active.shift_remove(key).is_some() {
                        events.push(event(&cp.cue, Cause::Playback, Verb::Exit));
                    }
                } else if !leaving
                    && !cp.endpoint.closed
                    && dir != Direction::NoDirection
                    && !self.active.contains_key(key)
                {
                    self.active.insert(key.clone(), cp.cue.clone());
                    events.push(event(&cp.cue, Cause::Playback, Verb::Enter));
                }
            }
        }
        reorder(&mut events);

        self.schedule.advance(now, &vector, &range);
        if vector.is_moving() {
            self.schedule.load(&self.axis, &vector, &range);
            events.extend(self.playback(now));
        } else {
            self.schedule.cancel();
        }
        debug!(
            cause = %cause,
            events = events.len(),
            active = self.active.len(),
            position = pos,
            "Reevaluated"
        );
        events
    }

    fn playback(&mut self, now: f64) -> Vec<CueEvent> {
        let vector = self.source.vector();
        let range = self.source.range();
        let tasks = self.schedule.run(now, &self.axis, &vector, &range);
        if tasks.is_empty() {
            return Vec::new();
        }
        let delivered = self.source.now();
        let mut events = Vec::with_capacity(tasks.len());
        for task in tasks {
            self.apply_task(&task, &vector, delivered, &mut events);
        }
        reorder(&mut events);
        events
    }

    fn apply_task(
        &mut self,
        task: &Task,
        vector: &Vector,
        delivered: f64,
        events: &mut Vec<CueEvent>,
    ) {
        let dir = direction(vector, task.due);
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
        let key = &task.cue.key;
        let side = match task.cue.interval.point_type(task.point) {
            PointType::Singular => {
                if self.active.shift_remove(key).is_none() {
                    events.push(event(Verb::Enter));
                }
                events.push(event(Verb::Exit));
                return;
            }
            PointType::Low => -1,
            PointType::High => 1,
            other => {
                debug!(key = %key, point = task.point, ?other, "Task point is not a cue endpoint");
                return;
            }
        };
        let verb = -(side * dir.signum());
        if verb > 0 && !self.active.contains_key(key) {
            self.active.insert(key.clone(), task.cue.clone());
            events.push(event(Verb::Enter));
        } else if verb < 0 && self.active.shift_remove(key).is_some() {
            events.push(event(Verb::Exit));
        }
    }
}

impl<S> std::fmt::Debug for Sequencer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("axis", &self.axis)
            .field("schedule", &self.schedule)
            .field("active", &self.active.len())
            .field("ready", &self.ready)
            .finish()
    }
}
