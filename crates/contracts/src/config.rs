//! Engine configuration contracts shared across crates.

use serde::{Deserialize, Serialize};

use crate::MotionRange;

/// Sequencer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Lookahead window length in seconds
    #[serde(default = "default_lookahead")]
    pub lookahead_s: f64,
}

fn default_lookahead() -> f64 {
    5.0
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            lookahead_s: default_lookahead(),
        }
    }
}

/// Axis configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Upper length bound of each bucket, ascending, last one infinite.
    #[serde(
        default = "default_size_classes",
        skip_serializing_if = "is_default_size_classes"
    )]
    pub size_classes: Vec<f64>,
}

pub fn default_size_classes() -> Vec<f64> {
    vec![
        0.0,
        10.0,
        100.0,
        1_000.0,
        10_000.0,
        100_000.0,
        f64::INFINITY,
    ]
}

#[allow(clippy::ptr_arg)]
fn is_default_size_classes(classes: &Vec<f64>) -> bool {
    *classes == default_size_classes()
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            size_classes: default_size_classes(),
        }
    }
}

/// Initial motion state
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionConfig {
    #[serde(default)]
    pub position: f64,
    #[serde(default)]
    pub velocity: f64,
    #[serde(default)]
    pub acceleration: f64,
    #[serde(default)]
    pub range: MotionRange,
}

/// Partial motion edit; absent fields keep their extrapolated value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceleration: Option<f64>,
}

impl MotionUpdate {
    pub fn jump(position: f64) -> Self {
        Self {
            position: Some(position),
            ..Self::default()
        }
    }

    pub fn velocity(velocity: f64) -> Self {
        Self {
            velocity: Some(velocity),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.velocity.is_none() && self.acceleration.is_none()
    }
}
