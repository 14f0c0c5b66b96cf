//! Scenario - declarative description of a sequencing session
//!
//! A scenario bundles engine configuration, the initial motion, an initial
//! cue set and a timeline of scripted edits. It is the input format of the
//! `cue-sequencer` CLI.

use serde::{Deserialize, Serialize};

use crate::{AxisConfig, CueArg, MotionConfig, MotionUpdate, SequencerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScenarioVersion {
    #[serde(rename = "v1")]
    #[default]
    V1,
}

/// Top-level scenario document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub version: ScenarioVersion,

    #[serde(default)]
    pub name: String,

    /// Simulated run length in seconds
    #[serde(default = "default_duration")]
    pub duration_s: f64,

    #[serde(default)]
    pub sequencer: SequencerConfig,

    #[serde(default)]
    pub axis: AxisConfig,

    #[serde(default)]
    pub motion: MotionConfig,

    #[serde(default)]
    pub cues: Vec<CueArg>,

    #[serde(default)]
    pub timeline: Vec<TimelineStep>,
}

fn default_duration() -> f64 {
    60.0
}

/// Scripted edit applied at simulated time `at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motion: Option<MotionUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cues: Vec<CueArg>,
}

impl Scenario {
    pub fn cue_count(&self) -> usize {
        self.cues.len()
    }

    pub fn motion_steps(&self) -> usize {
        self.timeline.iter().filter(|s| s.motion.is_some()).count()
    }

    pub fn cue_steps(&self) -> usize {
        self.timeline.iter().filter(|s| !s.cues.is_empty()).count()
    }
}
