//! # Axis
//!
//! Keyed cue store with sub-linear interval queries.
//!
//! Cues are partitioned by interval length into buckets. Each bucket keeps a
//! point map (axis value to cues touching it) next to a sorted point array, so
//! a query costs one binary search per bucket plus the size of the result.
//!
//! ## Example
//!
//! ```
//! use axis::Axis;
//! use contracts::{AxisConfig, CueArg, Interval, Semantic};
//!
//! let mut axis = Axis::new(&AxisConfig::default()).unwrap();
//! axis.update(vec![CueArg::interval("a", Interval::new(10.0, 20.0).unwrap())])
//!     .unwrap();
//! let hits = axis.get_cues_by_interval(&Interval::singular(15.0), Semantic::Overlap);
//! assert_eq!(hits.len(), 1);
//! ```

#[allow(clippy::module_inception)]
mod axis;
mod bucket;
mod integrity;
mod point_index;

pub use axis::{Axis, CuePoint, AXIS_EVENTS};
pub use integrity::{BucketStats, IntegrityError, IntegrityReport};
pub use point_index::PointIndex;
