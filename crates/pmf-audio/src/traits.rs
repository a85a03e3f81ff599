//! Audio output traits and error types.

use thiserror::Error;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
    /// `start` was called before a source was attached
    #[error("no stream has been built")]
    NoStream,
}

/// Produces interleaved `i16` audio on demand.
///
/// Implementors are moved into the device callback, so `render` must not
/// block or allocate.
pub trait RenderSource: Send + 'static {
    /// Interleaved samples per frame (1 or 2).
    fn channels(&self) -> usize;

    /// Fill `out` and return the number of frames written.
    fn render(&mut self, out: &mut [i16]) -> usize;
}

/// Trait for audio output backends.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// Attach the source the device callback pulls from.
    fn build_stream<S: RenderSource>(&mut self, source: S) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}
