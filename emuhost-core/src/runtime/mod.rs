//! Step-driving glue for emuhost-core.
//!
//! Responsibilities:
//! - Run the core for exactly one step with the session's bridge bound.
//! - Drain the captured frame and audio into caller-owned sinks.
//! - Query the core's AV timing (sample rate, frame rate).
//!
//! Pacing is left to the caller's loop.

pub mod runner;
pub mod timing;

pub use runner::FrameRunner;
pub use timing::{DEFAULT_SAMPLE_RATE, synced_sample_rate};
