//! Control-rate side of the tone stack
//!
//! A [`ControlLoop`] polls a `ControlSource` on a fixed tokio interval and
//! applies whatever readings it returns through an `EqualizerControl`.

pub mod polling;
pub mod sources;

pub use polling::ControlLoop;
pub use sources::{ControlError, FileControls, FixedControls};
