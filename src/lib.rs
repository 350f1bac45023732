//! Record a VNC session as video and post-process it for web playback.
//!
//! A [`Recorder`] manages the lifecycle of an external framebuffer capture
//! process; once recording stops, a [`PostProcessor`] re-encodes the capture,
//! measures its duration, generates per-second navigation cuepoints and
//! injects them into the container, leaving a single seekable output file.

pub mod capture;
pub mod config;
pub mod cuepoints;
pub mod error;
pub mod pipeline;
pub mod probe;
pub mod recorder;

pub use config::{Codec, SessionConfig};
pub use error::{CastError, Result};
pub use pipeline::PostProcessor;
pub use recorder::{Recorder, RecorderStatus, StopOutcome};
