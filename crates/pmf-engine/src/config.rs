//! Output configuration.

/// Output channel layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputChannels {
    Mono,
    #[default]
    Stereo,
}

impl OutputChannels {
    /// Interleaved samples per frame.
    pub const fn count(self) -> usize {
        match self {
            OutputChannels::Mono => 1,
            OutputChannels::Stereo => 2,
        }
    }
}

/// Sample fetch mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// How the engine renders: rate, layout, interpolation and gain staging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputConfig {
    pub sample_rate: u32,
    pub channels: OutputChannels,
    pub interpolation: Interpolation,
    /// Frames over which gain changes are smoothed (0 disables ramping)
    pub volume_ramp: u16,
    /// Master gain, 256 = unity
    pub master_gain: u16,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: OutputChannels::Stereo,
            interpolation: Interpolation::Linear,
            volume_ramp: 32,
            master_gain: 256,
        }
    }
}

impl OutputConfig {
    /// Default configuration at a different sample rate.
    pub fn with_sample_rate(sample_rate: u32) -> Self {
        Self { sample_rate, ..Self::default() }
    }
}
