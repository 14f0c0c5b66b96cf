//! # Contracts
//!
//! Shared value types and interfaces of the cue sequencer. Every other crate
//! depends on this one; it depends on none of them.
//!
//! ## Time Model
//! - Timestamps are monotonic seconds (`f64`) supplied by the motion source clock
//! - Positions are unitless axis coordinates
//!
//! ## Axis Model
//! - Intervals compare through the endpoint algebra in [`endpoint`]
//! - Cues are keyed by [`CueKey`] and only change through batches of [`CueArg`]

mod config;
mod cue;
mod cue_key;
pub mod endpoint;
mod error;
mod event;
mod interval;
mod observers;
mod relation;
mod scenario;
mod vector;

pub use config::*;
pub use cue::*;
pub use cue_key::CueKey;
pub use endpoint::Endpoint;
pub use error::*;
pub use event::*;
pub use interval::*;
pub use observers::{Handler, Observers, SubscriptionId};
pub use relation::*;
pub use scenario::*;
pub use vector::*;
