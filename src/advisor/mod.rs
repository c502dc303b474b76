//! The shift advisory engine: session lifecycle, alert gating and the loop tying them
//! to a telemetry source and an audio sink.

pub mod gate;
pub mod poll_loop;
pub mod session;

pub use gate::AlertGate;
pub use poll_loop::{Clock, LoopConfig, LoopSummary, PollLoop, SystemClock};
pub use session::{SessionState, SessionTracker};
