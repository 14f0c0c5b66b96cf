//! # Sequencer
//!
//! Turns a motion source and an axis of cues into an ordered stream of
//! enter/exit events.
//!
//! - [`Schedule`]: lookahead window of solved crossings with one armed deadline
//! - [`Sequencer`]: active cue set, reconciliation and playback
//! - [`WindowSequencer`]: cues overlapping a window whose ends follow two motions
//! - [`DriverHandle`]: runs a sequencer on a tokio task
//!
//! ## Usage
//!
//! ```ignore
//! let mut seq = Sequencer::new(timing_object, axis, &SequencerConfig::default())?;
//! seq.subscribe("change", Arc::new(|events: &[CueEvent]| {
//!     for e in events {
//!         println!("{e}");
//!     }
//!     Ok(())
//! }))?;
//! seq.on_timing_change();
//! // call seq.on_timeout() at seq.next_deadline(), or hand it to a driver
//! ```

mod driver;
mod engine;
mod ordering;
mod schedule;
mod window_sequencer;

pub use driver::{Command, DriverError, DriverHandle, UpdateReply};
pub use engine::{Sequencer, SEQUENCER_EVENTS};
pub use ordering::{rank, reorder, Verb};
pub use schedule::{Schedule, Task, Window};
pub use window_sequencer::{window_action, EndRole, EndpointRole, WindowAction, WindowSequencer};
