use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::mpsc::Receiver,
};

use log::{error, info};

use crate::{ShiftIndicatorError, telemetry::TelemetryRecord};

/// Write every received record as one JSON line until all senders are dropped.
pub fn write_records(
    file: &Path,
    record_receiver: Receiver<TelemetryRecord>,
) -> Result<usize, ShiftIndicatorError> {
    let recording_file =
        File::create(file).map_err(|e| ShiftIndicatorError::WriterError { source: e })?;
    let mut recording_writer = BufWriter::new(recording_file);
    let mut written = 0;
    for record in &record_receiver {
        let line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                error!("Could not serialize telemetry record: {}", e);
                continue;
            }
        };
        writeln!(recording_writer, "{}", line)
            .map_err(|e| ShiftIndicatorError::WriterError { source: e })?;
        written += 1;
    }
    recording_writer
        .flush()
        .map_err(|e| ShiftIndicatorError::WriterError { source: e })?;
    info!("Wrote {} records to {}", written, file.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ReplayTelemetrySource, TelemetrySample, TelemetrySource};
    use std::{sync::mpsc, thread};
    use tempfile::TempDir;

    #[test]
    fn test_written_records_replay() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.jsonl");

        let (sender, receiver) = mpsc::channel();
        let writer_path = path.clone();
        let writer = thread::spawn(move || write_records(&writer_path, receiver));

        sender
            .send(TelemetryRecord::Sample(TelemetrySample {
                gear: 2,
                rpm: 6100.,
                clutch: 1.,
            }))
            .unwrap();
        sender.send(TelemetryRecord::Gap).unwrap();
        drop(sender);

        assert_eq!(writer.join().unwrap().unwrap(), 2);

        let mut replay = ReplayTelemetrySource::from_file(&path).unwrap();
        replay.connect().unwrap();
        assert_eq!(replay.sample().unwrap().unwrap().rpm, 6100.);
        assert_eq!(replay.sample().unwrap(), None);
    }
}
