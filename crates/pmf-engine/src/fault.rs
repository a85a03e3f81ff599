//! Playback faults.
//!
//! A fault means a song reached the renderer with an index that validation
//! should have rejected. The affected channel goes silent and playback goes on.

/// An internal invariant violation seen during playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackFault {
    #[error("order {order} names a missing pattern")]
    MissingPattern { order: u16 },
    #[error("channel {channel} references missing instrument {instrument}")]
    MissingInstrument { channel: u8, instrument: u8 },
    #[error("channel {channel} references missing sample {sample}")]
    MissingSample { channel: u8, sample: u8 },
}

/// Running tally of faults, readable outside the render path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultLog {
    count: u32,
    last: Option<PlaybackFault>,
}

impl FaultLog {
    pub fn record(&mut self, fault: PlaybackFault) {
        self.count = self.count.saturating_add(1);
        self.last = Some(fault);
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn last(&self) -> Option<PlaybackFault> {
        self.last
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
