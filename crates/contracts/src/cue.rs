//! Cue types and batch deltas

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::{CueKey, Interval};

/// Stored cue. Immutable once stored; updates replace the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub key: CueKey,
    pub interval: Interval,
    #[serde(default)]
    pub data: Value,
}

impl Cue {
    pub fn new(key: impl Into<CueKey>, interval: Interval, data: Value) -> Self {
        Self {
            key: key.into(),
            interval,
            data,
        }
    }
}

/// One entry of an axis update batch.
///
/// | interval | data | effect                                       |
/// |----------|------|----------------------------------------------|
/// | some     | some | upsert both                                  |
/// | some     | none | upsert interval, keep data (null if new)     |
/// | none     | some | replace data of an existing cue              |
/// | none     | none | delete                                       |
///
/// A JSON `null` data field counts as absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CueArg {
    pub key: CueKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CueArg {
    pub fn upsert(key: impl Into<CueKey>, interval: Interval, data: Value) -> Self {
        Self {
            key: key.into(),
            interval: Some(interval),
            data: Some(data),
        }
    }

    pub fn interval(key: impl Into<CueKey>, interval: Interval) -> Self {
        Self {
            key: key.into(),
            interval: Some(interval),
            data: None,
        }
    }

    pub fn data(key: impl Into<CueKey>, data: Value) -> Self {
        Self {
            key: key.into(),
            interval: None,
            data: Some(data),
        }
    }

    pub fn remove(key: impl Into<CueKey>) -> Self {
        Self {
            key: key.into(),
            interval: None,
            data: None,
        }
    }

    /// Resolve this entry against the current cue.
    pub fn apply(self, current: Option<&Arc<Cue>>) -> Option<Arc<Cue>> {
        match (self.interval, self.data, current) {
            (None, None, _) => None,
            (Some(interval), Some(data), _) => Some(Arc::new(Cue {
                key: self.key,
                interval,
                data,
            })),
            (Some(interval), None, old) => Some(Arc::new(Cue {
                key: self.key,
                interval,
                data: old.map(|c| c.data.clone()).unwrap_or(Value::Null),
            })),
            (None, Some(data), Some(old)) => Some(Arc::new(Cue {
                key: self.key,
                interval: old.interval,
                data,
            })),
            (None, Some(_), None) => None,
        }
    }
}

/// Change of a single cue field across a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Delta {
    #[default]
    Noop,
    Insert,
    Replace,
    Delete,
}

impl Delta {
    fn between<T: PartialEq>(old: Option<&T>, new: Option<&T>) -> Self {
        match (old, new) {
            (None, None) => Delta::Noop,
            (None, Some(_)) => Delta::Insert,
            (Some(_), None) => Delta::Delete,
            (Some(a), Some(b)) if a == b => Delta::Noop,
            (Some(_), Some(_)) => Delta::Replace,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CueDelta {
    pub interval: Delta,
    pub data: Delta,
}

impl CueDelta {
    pub fn between(old: Option<&Cue>, new: Option<&Cue>) -> Self {
        Self {
            interval: Delta::between(old.map(|c| &c.interval), new.map(|c| &c.interval)),
            data: Delta::between(old.map(|c| &c.data), new.map(|c| &c.data)),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.interval == Delta::Noop && self.data == Delta::Noop
    }
}

/// Net effect of one batch on one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CueChange {
    pub old: Option<Arc<Cue>>,
    pub new: Option<Arc<Cue>>,
    pub delta: CueDelta,
}

/// Per-key changes of one committed batch, in first-touched order.
pub type BatchMap = IndexMap<CueKey, CueChange>;
