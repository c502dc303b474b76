//! Alert sound decoding using symphonia
//!
//! The whole file is decoded once at startup so that playback never touches the disk.

use std::{path::Path, time::Duration};

use log::{debug, warn};
use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CODEC_TYPE_NULL, DecoderOptions},
    errors::Error as SymphoniaError,
    formats::FormatOptions,
    io::MediaSourceStream,
    meta::MetadataOptions,
    probe::Hint,
};

use crate::ShiftIndicatorError;

/// A decoded sound held in memory as interleaved f32 samples.
#[derive(Debug, Clone)]
pub struct SoundClip {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

impl SoundClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: usize) -> Self {
        Self {
            samples,
            sample_rate,
            channels: channels.max(1),
        }
    }

    /// Decode an entire audio file.
    ///
    /// # Errors
    /// - Failed to open file
    /// - Unsupported audio format
    /// - No decodable audio track
    pub fn decode(path: &Path) -> Result<Self, ShiftIndicatorError> {
        let decode_error = |description: String| ShiftIndicatorError::SoundDecodeError {
            path: path.to_path_buf(),
            description,
        };
        debug!("Decoding sound file: {}", path.display());

        let file = std::fs::File::open(path)
            .map_err(|e| decode_error(format!("Failed to open file: {}", e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| decode_error(format!("Failed to probe format: {}", e)))?;
        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decode_error("No audio track found".to_string()))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| decode_error("Sample rate not found".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| decode_error(format!("Failed to create decoder: {}", e)))?;

        let mut samples = Vec::new();
        let mut channels = track.codec_params.channels.map(|c| c.count());

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    warn!("Error reading packet: {}", e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    channels.get_or_insert(spec.channels.count());
                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buffer.samples());
                }
                Err(e) => {
                    warn!("Decode error: {}", e);
                    continue;
                }
            }
        }

        let channels =
            channels.ok_or_else(|| decode_error("Channel count not found".to_string()))?;
        if samples.is_empty() {
            return Err(decode_error("File contains no audio".to_string()));
        }

        debug!(
            "Decoded {} frames at {} Hz, {} channel(s)",
            samples.len() / channels,
            sample_rate,
            channels
        );
        Ok(Self::new(samples, sample_rate, channels))
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Sample of `frame` for output channel `channel`. Output channels past the
    /// clip's last channel repeat the last one, so mono clips play on every speaker.
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channel = channel.min(self.channels - 1);
        self.samples
            .get(frame * self.channels + channel)
            .copied()
            .unwrap_or(0.)
    }
}
