//! CPAL-based audio output backend.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};

use crate::traits::{AudioError, AudioOutput, RenderSource};

/// Scratch buffer length in frames. Larger callbacks are rendered in pieces.
const SCRATCH_FRAMES: usize = 4096;

/// CPAL-based audio output.
///
/// The source is moved into the device callback and rendered there, so the
/// callback is the only thing driving playback forward.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    stream: Option<Stream>,
}

impl CpalOutput {
    /// Open the default output device at its default configuration.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config: StreamConfig = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceInit(e.to_string()))?
            .into();

        log::info!(
            "audio device '{}': {} Hz, {} channels",
            device.name().unwrap_or_else(|_| "unknown".into()),
            config.sample_rate.0,
            config.channels
        );

        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// Device channel count.
    pub fn channels(&self) -> u16 {
        self.config.channels
    }
}

impl AudioOutput for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn build_stream<S: RenderSource>(&mut self, mut source: S) -> Result<(), AudioError> {
        let device_channels = self.config.channels as usize;
        let source_channels = source.channels().max(1);
        let mut scratch = vec![0i16; SCRATCH_FRAMES * source_channels];

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for block in data.chunks_mut(SCRATCH_FRAMES * device_channels) {
                        let frames = block.len() / device_channels;
                        let pcm = &mut scratch[..frames * source_channels];
                        source.render(pcm);
                        for (out, frame) in block
                            .chunks_mut(device_channels)
                            .zip(pcm.chunks(source_channels))
                        {
                            write_frame(out, frame);
                        }
                    }
                },
                |err| log::error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::StreamCreate(e.to_string()))?;

        self.stream = Some(stream);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        let stream = self.stream.as_ref().ok_or(AudioError::NoStream)?;
        stream.play().map_err(|e| AudioError::Playback(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        if let Some(ref stream) = self.stream {
            stream.pause().map_err(|e| AudioError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}

/// Write one source frame into one device frame.
///
/// Mono sources are copied to both sides, a mono device gets the average,
/// and channels beyond the second are silent.
fn write_frame(out: &mut [f32], frame: &[i16]) {
    let (left, right) = match *frame {
        [left, right, ..] => (left, right),
        [mono] => (mono, mono),
        [] => (0, 0),
    };
    let left = left as f32 / 32768.0;
    let right = right as f32 / 32768.0;
    if let [mono] = &mut *out {
        *mono = (left + right) * 0.5;
        return;
    }
    for (i, sample) in out.iter_mut().enumerate() {
        *sample = match i {
            0 => left,
            1 => right,
            _ => 0.0,
        };
    }
}
