//! Screen capture
//!
//! The capture backend trait, the adapter the player talks to, and the
//! backends that ship with the crate.

pub mod adapter;
pub mod frame_log;
pub mod traits;

pub use adapter::{CaptureAdapter, CaptureEvent};
pub use frame_log::FrameLogCapture;
pub use traits::{
    CaptureError, CaptureResult, CaptureService, NoCapture, RecordingArtifact, RecordingHandle,
};
