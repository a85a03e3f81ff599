//! Headless player for PMF songs.
//!
//! Provides a unified API for loading songs, playback, and rendering
//! that the CLI and tests share. [`Player`] owns the engine, a
//! [`ControlHandle`] steers it from another thread, and [`LivePlayback`]
//! runs it on the default audio device.

mod live;
mod player;
mod wav;

use thiserror::Error;

// Re-export common types so callers don't need pmf-ir/pmf-engine directly.
pub use pmf_engine::{Command, Frame, Interpolation, OutputChannels, OutputConfig, Position, Transport};
pub use pmf_formats::FormatError;
pub use pmf_ir::{Song, ValidationError};

pub use live::{LiveError, LivePlayback};
pub use player::{ControlHandle, Player, CONTROL_QUEUE_LEN};
pub use wav::{frames_to_wav, write_wav};

/// Why a song could not be loaded. The previous song is kept.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("song is invalid: {0}")]
    Invalid(#[from] ValidationError),
    #[error("command queue is full")]
    QueueFull,
}
