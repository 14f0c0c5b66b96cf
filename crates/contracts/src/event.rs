//! Sequencer output events

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::{Cue, CueKey, Direction, Interval, PointType};

/// What triggered a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    Init,
    TimingChange,
    CueChange,
    Playback,
}

impl Cause {
    pub fn as_str(self) -> &'static str {
        match self {
            Cause::Init => "init",
            Cause::TimingChange => "timing_change",
            Cause::CueChange => "cue_change",
            Cause::Playback => "playback",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of an ordered event batch.
///
/// `enter` and `exit` are both false for a cue that stayed active while its
/// interval or data changed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueEvent {
    pub cue: Arc<Cue>,
    pub point: f64,
    pub point_type: PointType,
    pub direction: Direction,
    pub cause: Cause,
    pub enter: bool,
    pub exit: bool,
    pub due_timestamp: f64,
    pub delivered_timestamp: f64,
}

impl CueEvent {
    #[inline]
    pub fn key(&self) -> &CueKey {
        &self.cue.key
    }

    #[inline]
    pub fn interval(&self) -> &Interval {
        &self.cue.interval
    }

    #[inline]
    pub fn data(&self) -> &Value {
        &self.cue.data
    }

    /// `ENTER`, `EXIT` or `CHANGE`.
    pub fn verb(&self) -> &'static str {
        match (self.enter, self.exit) {
            (true, _) => "ENTER",
            (_, true) => "EXIT",
            _ => "CHANGE",
        }
    }

    /// Seconds between the due time and delivery.
    pub fn lateness(&self) -> f64 {
        self.delivered_timestamp - self.due_timestamp
    }
}

impl fmt::Display for CueEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>10.3} {:<6} {} {} at {} ({:?}, {})",
            self.due_timestamp,
            self.verb(),
            self.cue.key,
            self.cue.interval,
            self.point,
            self.point_type,
            self.cause
        )
    }
}
