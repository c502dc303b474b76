pub mod clip;
pub mod output;

pub use clip::SoundClip;
pub use output::CpalAudioSink;

use log::info;

use crate::ShiftIndicatorError;

/// Something that can play the alert sound.
pub trait AudioSink {
    /// Start playing the alert. Returns as soon as playback is scheduled; `Ok` does not
    /// mean the sound has finished.
    fn play(&mut self) -> Result<(), ShiftIndicatorError>;
}

impl<T: AudioSink + ?Sized> AudioSink for Box<T> {
    fn play(&mut self) -> Result<(), ShiftIndicatorError> {
        (**self).play()
    }
}

/// Sink used in mute mode: alerts only show up in the log.
#[derive(Debug, Default)]
pub struct LogAudioSink {
    plays: usize,
}

impl LogAudioSink {
    pub fn plays(&self) -> usize {
        self.plays
    }
}

impl AudioSink for LogAudioSink {
    fn play(&mut self) -> Result<(), ShiftIndicatorError> {
        self.plays += 1;
        info!("Shift! (alert #{})", self.plays);
        Ok(())
    }
}
