//! Quiz playback
//!
//! The orchestrator runs the quiz session by session; the UI talks to it
//! through a [`PlayerHandle`] and renders the published [`PlaybackSnapshot`].

pub mod countdown;
pub mod orchestrator;
mod session;
pub mod state;


pub use countdown::{Countdown, CountdownId};
pub use orchestrator::{Orchestrator, PlayerHandle};
pub use state::{
    OptionMark, OptionView, PlaybackPhase, PlaybackSnapshot, QuestionOutcome, QuestionView,
    RecordingStatus, Reveal, RevealMessage, SessionToken, TimerUrgency, Verdict,
};
