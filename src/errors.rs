// Error types for shiftindicator

use crate::telemetry::TelemetryRecord;
use snafu::Snafu;
use std::{io, path::PathBuf, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum ShiftIndicatorError {
    // Settings errors
    #[snafu(display("Could not find settings file, searched: {searched}"))]
    NoConfigFile { searched: String },
    #[snafu(display("Error reading settings file {}", path.display()))]
    ConfigIOError { path: PathBuf, source: io::Error },
    #[snafu(display("Malformed settings file {}", path.display()))]
    ConfigParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[snafu(display("Invalid setting: {field} - {reason}"))]
    InvalidConfig { field: String, reason: String },

    // Sound errors
    #[snafu(display("Could not find sound file {sound}"))]
    SoundNotFound { sound: String },
    #[snafu(display("Error decoding sound file {}: {description}", path.display()))]
    SoundDecodeError { path: PathBuf, description: String },
    #[snafu(display("Audio output error: {description}"))]
    AudioOutputError { description: String },

    // Errors for the telemetry sources
    #[snafu(display("Could not connect to telemetry source: {description}"))]
    TelemetryConnectionError { description: String },
    #[snafu(display("Telemetry source error: {description}"))]
    TelemetryProducerError { description: String },
    #[snafu(display("Could not read session metadata: {description}"))]
    SessionMetadataError { description: String },
    #[snafu(display("Telemetry source has no more data"))]
    TelemetryExhausted,

    // Errors for the telemetry recorder
    #[snafu(display("Error writing telemetry recording"))]
    WriterError { source: io::Error },
    #[snafu(display("Error reading telemetry recording {}", path.display()))]
    RecordingIOError { path: PathBuf, source: io::Error },
    #[snafu(display("Malformed record on line {line} of {}", path.display()))]
    RecordingParseError {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[snafu(display("Error broadcasting telemetry record"))]
    TelemetryBroadcastError {
        source: Box<SendError<TelemetryRecord>>,
    },
}

impl From<SendError<TelemetryRecord>> for ShiftIndicatorError {
    fn from(value: SendError<TelemetryRecord>) -> Self {
        ShiftIndicatorError::TelemetryBroadcastError {
            source: Box::new(value),
        }
    }
}
