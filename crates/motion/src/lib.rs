//! # Motion
//!
//! Kinematic model and motion sources.
//!
//! - [`model`]: pure closed-form functions over [`contracts::Vector`]
//! - [`Clock`]: monotonic time in seconds, real or manual
//! - [`MotionSource`]: vector + range + clock + change notification
//! - [`TimingObject`]: locally controlled source
//! - [`convert`]: time-shift / skew / scale wrappers

mod clock;
pub mod convert;
pub mod model;
mod source;
mod timing_object;

pub use clock::{Clock, ManualClock, SystemClock};
pub use convert::{MotionSourceExt, Scale, Skew, TimeShift};
pub use model::{Crossing, RangeState, EPSILON};
pub use source::MotionSource;
pub use timing_object::TimingObject;
