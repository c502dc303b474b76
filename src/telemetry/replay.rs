use std::{
    collections::VecDeque,
    io::BufRead,
    path::{Path, PathBuf},
};

use log::debug;

use crate::ShiftIndicatorError;

use super::{SessionMetadata, TelemetryRecord, TelemetrySample, TelemetrySource};

/// Replays a telemetry recording as if it came from a live simulator.
///
/// Records are consumed in order. `Session` records silently replace the metadata
/// returned by `session_metadata()`, `Gap` records yield an empty poll and `Disconnect` records
/// drop the connection until the next `connect()`. Once every record has been consumed
/// the source reports `TelemetryExhausted`.
///
/// This enables:
/// - Running the advisory loop without a running simulator
/// - Reproducible test scenarios for the decision engine
pub struct ReplayTelemetrySource {
    records: VecDeque<TelemetryRecord>,
    metadata: Option<SessionMetadata>,
    connected: bool,
}

impl ReplayTelemetrySource {
    pub fn from_records(records: impl IntoIterator<Item = TelemetryRecord>) -> Self {
        Self {
            records: records.into_iter().collect(),
            metadata: None,
            connected: false,
        }
    }

    /// Load a recording in JSON Lines format, as produced by `run --record`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid record.
    /// Blank lines are ignored.
    pub fn from_file(file: &Path) -> Result<Self, ShiftIndicatorError> {
        let io_error = |e| ShiftIndicatorError::RecordingIOError {
            path: PathBuf::from(file),
            source: e,
        };
        let reader = std::io::BufReader::new(std::fs::File::open(file).map_err(io_error)?);

        let mut records = Vec::new();
        for (line_no, line) in reader.lines().enumerate() {
            let line = line.map_err(io_error)?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| {
                ShiftIndicatorError::RecordingParseError {
                    path: PathBuf::from(file),
                    line: line_no + 1,
                    source: e,
                }
            })?;
            records.push(record);
        }
        debug!("Loaded {} records from {}", records.len(), file.display());

        Ok(Self::from_records(records))
    }

    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    /// Consume leading session records so metadata is up to date before sampling.
    fn absorb_session_records(&mut self) {
        while let Some(TelemetryRecord::Session(_)) = self.records.front() {
            if let Some(TelemetryRecord::Session(metadata)) = self.records.pop_front() {
                self.metadata = Some(metadata);
            }
        }
    }
}

impl TelemetrySource for ReplayTelemetrySource {
    fn connect(&mut self) -> Result<(), ShiftIndicatorError> {
        if self.records.is_empty() {
            return Err(ShiftIndicatorError::TelemetryExhausted);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn session_metadata(&mut self) -> Result<SessionMetadata, ShiftIndicatorError> {
        self.absorb_session_records();
        self.metadata
            .clone()
            .ok_or(ShiftIndicatorError::SessionMetadataError {
                description: "Recording has no session record before its first sample"
                    .to_string(),
            })
    }

    fn sample(&mut self) -> Result<Option<TelemetrySample>, ShiftIndicatorError> {
        self.absorb_session_records();
        match self.records.pop_front() {
            None => Err(ShiftIndicatorError::TelemetryExhausted),
            Some(TelemetryRecord::Sample(sample)) => Ok(Some(sample)),
            Some(TelemetryRecord::Gap) => Ok(None),
            Some(TelemetryRecord::Disconnect) => {
                self.connected = false;
                Ok(None)
            }
            Some(TelemetryRecord::Session(metadata)) => {
                self.metadata = Some(metadata);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::DriverEntry;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn session(car_path: &str) -> TelemetryRecord {
        TelemetryRecord::Session(SessionMetadata {
            player_car_idx: 0,
            drivers: vec![DriverEntry {
                car_idx: 0,
                car_path: car_path.to_string(),
                car_screen_name: String::new(),
            }],
            default_shift_rpm: None,
        })
    }

    fn sample(gear: i32, rpm: f32) -> TelemetryRecord {
        TelemetryRecord::Sample(TelemetrySample {
            gear,
            rpm,
            clutch: 1.,
        })
    }

    #[test]
    fn test_replay_sequence() {
        let mut source = ReplayTelemetrySource::from_records(vec![
            session("gt3rs"),
            sample(2, 5000.),
            TelemetryRecord::Gap,
            TelemetryRecord::Disconnect,
        ]);
        assert!(!source.is_connected());
        source.connect().unwrap();
        assert!(source.is_connected());

        let metadata = source.session_metadata().unwrap();
        assert_eq!(metadata.player_entry().unwrap().car_path, "gt3rs");

        assert_eq!(source.sample().unwrap().unwrap().rpm, 5000.);
        assert!(source.sample().unwrap().is_none());
        assert!(source.is_connected());
        assert!(source.sample().unwrap().is_none());
        assert!(!source.is_connected());

        assert!(matches!(
            source.sample(),
            Err(ShiftIndicatorError::TelemetryExhausted)
        ));
        assert!(matches!(
            source.connect(),
            Err(ShiftIndicatorError::TelemetryExhausted)
        ));
    }

    #[test]
    fn test_missing_session_record() {
        let mut source = ReplayTelemetrySource::from_records(vec![sample(1, 3000.)]);
        source.connect().unwrap();
        assert!(matches!(
            source.session_metadata(),
            Err(ShiftIndicatorError::SessionMetadataError { .. })
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"type":"session","player_car_idx":4,"drivers":[{{"car_idx":4,"car_path":"kart1"}}]}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"type":"sample","gear":5,"rpm":9100.0,"clutch":1.0}}"#).unwrap();
        writeln!(file, r#"{{"type":"disconnect"}}"#).unwrap();

        let mut source = ReplayTelemetrySource::from_file(file.path()).unwrap();
        assert_eq!(source.remaining(), 3);
        source.connect().unwrap();
        assert_eq!(
            source.session_metadata().unwrap().player_entry().unwrap().car_path,
            "kart1"
        );
        assert_eq!(source.sample().unwrap().unwrap().gear, 5);
    }

    #[test]
    fn test_from_file_reports_bad_line() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"gap"}}"#).unwrap();
        writeln!(file, r#"{{"type":"warp"}}"#).unwrap();

        match ReplayTelemetrySource::from_file(file.path()) {
            Err(ShiftIndicatorError::RecordingParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result: {:?}", other.map(|s| s.remaining())),
        }
    }
}
