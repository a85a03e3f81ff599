//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Default C-4 playback rate of Amiga samples.
pub const DEFAULT_C4_SPEED: u32 = 8363;

/// A sample definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<22>,
    /// Audio data
    pub data: SampleData,
    /// Loop start position (in frames)
    pub loop_start: u32,
    /// Loop end position (in frames, exclusive)
    pub loop_end: u32,
    /// Loop type
    pub loop_type: LoopType,
    /// Default volume (0-64)
    pub default_volume: u8,
    /// Default panning (-64 to +64, 0 = center), `None` keeps the channel pan
    pub default_pan: Option<i8>,
    /// Frequency of C-4 in Hz (typically 8363 for MOD)
    pub c4_speed: u32,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono8(Vec::new()),
            loop_start: 0,
            loop_end: 0,
            loop_type: LoopType::None,
            default_volume: 64,
            default_pan: None,
            c4_speed: DEFAULT_C4_SPEED,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample has a loop.
    pub fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None && self.loop_end > self.loop_start
    }
}

/// Sample audio data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SampleData {
    /// 8-bit mono samples
    Mono8(Vec<i8>),
    /// 16-bit mono samples
    Mono16(Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bits per stored sample.
    pub fn bits(&self) -> u8 {
        match self {
            SampleData::Mono8(_) => 8,
            SampleData::Mono16(_) => 16,
        }
    }

    /// Get a sample value at position, scaled to 16 bits. Out of range reads 0.
    #[inline]
    pub fn get_mono(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
        }
    }

    /// Blend `pos` toward `next` by a 16-bit fraction.
    ///
    /// The caller picks `next` so loops interpolate across the loop seam.
    #[inline]
    pub fn get_interpolated(&self, pos: usize, next: usize, frac: u16) -> i16 {
        let a = self.get_mono(pos) as i32;
        let b = self.get_mono(next) as i32;
        (a + (((b - a) * frac as i32) >> 16)) as i16
    }
}

/// Sample loop type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// No loop
    #[default]
    None,
    /// Forward loop
    Forward,
    /// Ping-pong (bidirectional) loop
    PingPong,
}
