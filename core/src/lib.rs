//! Core signal-processing and localization for the acoustic TDOA platform.
//!
//! The modules cover the measurement-to-location pipeline: receiver-side
//! pulse detection against an absolute clock reference, server-side event
//! correlation, hyperbolic and least-squares position solving, and validity
//! checking of the resulting solutions.

pub mod clock;
pub mod correlate;
pub mod detect;
pub mod events;
pub mod geodesy;
pub mod math;
pub mod prelude;
pub mod queue;
pub mod solve;
pub mod telemetry;
pub mod validate;

pub use prelude::{ProcessingStage, StageInput, StageOutput};
