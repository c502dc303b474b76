//! Alert playback using cpal
//!
//! The output stream is opened once and keeps running, emitting silence while idle.
//! `play()` only rewinds the shared playhead, so the caller never waits for playback.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
};

use cpal::{
    Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use log::{debug, error, info};

use crate::ShiftIndicatorError;

use super::{AudioSink, clip::SoundClip};

/// Position in the clip, in source frames. `None` while idle.
type Playhead = Arc<Mutex<Option<f64>>>;

pub struct CpalAudioSink {
    playhead: Playhead,
    error_flag: Arc<AtomicBool>,
    _stream: Stream,
}

impl CpalAudioSink {
    /// Open the default output device and start an idle stream for `clip`.
    pub fn new(clip: SoundClip, volume: f32) -> Result<Self, ShiftIndicatorError> {
        let host = cpal::default_host();
        let device =
            host.default_output_device()
                .ok_or_else(|| ShiftIndicatorError::AudioOutputError {
                    description: "No default output device found".to_string(),
                })?;
        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let supported = device.default_output_config().map_err(|e| {
            ShiftIndicatorError::AudioOutputError {
                description: format!("Failed to get default config: {}", e),
            }
        })?;
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        let clip = Arc::new(clip);
        let playhead: Playhead = Arc::new(Mutex::new(None));
        let error_flag = Arc::new(AtomicBool::new(false));
        let stream = match sample_format {
            SampleFormat::F32 => {
                build_stream::<f32>(&device, &config, &clip, &playhead, volume, &error_flag)?
            }
            SampleFormat::I16 => {
                build_stream::<i16>(&device, &config, &clip, &playhead, volume, &error_flag)?
            }
            SampleFormat::U16 => {
                build_stream::<u16>(&device, &config, &clip, &playhead, volume, &error_flag)?
            }
            SampleFormat::I32 => {
                build_stream::<i32>(&device, &config, &clip, &playhead, volume, &error_flag)?
            }
            sample_format => {
                return Err(ShiftIndicatorError::AudioOutputError {
                    description: format!("Unsupported sample format: {:?}", sample_format),
                });
            }
        };

        stream
            .play()
            .map_err(|e| ShiftIndicatorError::AudioOutputError {
                description: format!("Failed to start stream: {}", e),
            })?;

        Ok(Self {
            playhead,
            error_flag,
            _stream: stream,
        })
    }
}

impl AudioSink for CpalAudioSink {
    fn play(&mut self) -> Result<(), ShiftIndicatorError> {
        if self.error_flag.load(Ordering::SeqCst) {
            return Err(ShiftIndicatorError::AudioOutputError {
                description: "Audio stream failed".to_string(),
            });
        }
        let mut playhead = self
            .playhead
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *playhead = Some(0.);
        Ok(())
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    clip: &Arc<SoundClip>,
    playhead: &Playhead,
    volume: f32,
    error_flag: &Arc<AtomicBool>,
) -> Result<Stream, ShiftIndicatorError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    // nearest-neighbour rate conversion, good enough for a short cue
    let step = clip.sample_rate() as f64 / config.sample_rate.0 as f64;
    let clip = Arc::clone(clip);
    let playhead = Arc::clone(playhead);
    let error_flag = Arc::clone(error_flag);

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut playhead = playhead
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                for frame in data.chunks_mut(channels) {
                    match *playhead {
                        Some(position) if (position as usize) < clip.frames() => {
                            let source_frame = position as usize;
                            for (channel, out) in frame.iter_mut().enumerate() {
                                let value = (clip.sample(source_frame, channel) * volume)
                                    .clamp(-1.0, 1.0);
                                *out = T::from_sample(value);
                            }
                            *playhead = Some(position + step);
                        }
                        _ => {
                            *playhead = None;
                            frame.fill(T::EQUILIBRIUM);
                        }
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                error_flag.store(true, Ordering::SeqCst);
            },
            None,
        )
        .map_err(|e| ShiftIndicatorError::AudioOutputError {
            description: format!("Failed to build stream: {}", e),
        })
}
