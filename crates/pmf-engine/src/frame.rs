//! Audio frame type.

use crate::config::OutputChannels;

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Read one frame from interleaved engine output.
    ///
    /// Mono output is duplicated into both sides.
    pub fn from_interleaved(samples: &[i16], layout: OutputChannels) -> Self {
        match (layout, samples) {
            (OutputChannels::Stereo, [left, right, ..]) => Self { left: *left, right: *right },
            (OutputChannels::Mono, [value, ..]) => Self::mono(*value),
            _ => Self::silence(),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.left == 0 && self.right == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interleaved_layouts() {
        assert_eq!(
            Frame::from_interleaved(&[3, -4], OutputChannels::Stereo),
            Frame { left: 3, right: -4 }
        );
        assert_eq!(Frame::from_interleaved(&[9], OutputChannels::Mono), Frame::mono(9));
        assert!(Frame::from_interleaved(&[1], OutputChannels::Stereo).is_silent());
    }
}
