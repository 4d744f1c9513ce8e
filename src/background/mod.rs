//! Background visuals
//!
//! Cycles question backgrounds with crossfade transitions.

pub mod rotator;

pub use rotator::{BackgroundRotator, BackgroundSurface, LoggingSurface, TransitionStart};
