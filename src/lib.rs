// Library interface for shiftindicator
// This allows integration tests to access internal modules

pub mod advisor;
pub mod audio;
pub mod config;
pub mod errors;
pub mod shiftpoints;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use advisor::{AlertGate, LoopConfig, LoopSummary, PollLoop, SessionTracker};
pub use audio::{AudioSink, LogAudioSink};
pub use config::Settings;
pub use errors::ShiftIndicatorError;
pub use shiftpoints::{Resolution, ShiftpointTable, ThresholdLookup};
pub use telemetry::{
    ReplayTelemetrySource, SessionMetadata, TelemetryRecord, TelemetrySample, TelemetrySource,
};
