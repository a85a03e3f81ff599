//! Real-time playback on the default audio device.

use pmf_audio::{AudioError, AudioOutput, CpalOutput};
use pmf_engine::OutputConfig;
use pmf_ir::Song;
use thiserror::Error;

use crate::player::{ControlHandle, Player};
use crate::LoadError;

#[derive(Debug, Error)]
pub enum LiveError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Audio(#[from] AudioError),
}

/// A [`Player`] running inside the device callback.
pub struct LivePlayback {
    output: CpalOutput,
    control: ControlHandle,
}

impl LivePlayback {
    /// Open the default device and start playing `song` at the device rate.
    ///
    /// Everything in `config` except the sample rate is kept.
    pub fn start(song: Song, config: OutputConfig) -> Result<Self, LiveError> {
        let mut output = CpalOutput::new()?;
        let config = OutputConfig {
            sample_rate: output.sample_rate(),
            ..config
        };
        let (mut player, control) = Player::new(config);
        player.load_song(song)?;
        // Queued before the stream exists, so the first callback starts it
        player.start().map_err(|_| LoadError::QueueFull)?;

        output.build_stream(player)?;
        output.start()?;
        Ok(Self { output, control })
    }

    /// Transport commands and song swaps for the running player.
    pub fn control(&mut self) -> &mut ControlHandle {
        &mut self.control
    }

    pub fn is_finished(&self) -> bool {
        self.control.is_finished()
    }

    /// Pause the device stream and drop the player.
    pub fn stop(mut self) -> Result<(), AudioError> {
        self.output.stop()
    }
}
