//! Song structure and order list types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::{Cell, Pattern};
use crate::sample::Sample;

/// Most channels a song may declare.
pub const MAX_CHANNELS: usize = 64;

/// Highest pattern index an order entry can name.
pub const MAX_PATTERN_INDEX: u8 = 0xFD;

/// Global volume ceiling.
pub const GLOBAL_VOLUME_MAX: u8 = 128;

/// A complete song.
///
/// Playback never mutates a song; everything time-dependent lives in the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Initial tempo in BPM (32-255)
    pub initial_tempo: u8,
    /// Initial speed (ticks per row)
    pub initial_speed: u8,
    /// Initial global volume (0-128)
    pub global_volume: u8,
    /// Per-channel settings, one entry per channel
    pub channels: Vec<ChannelSettings>,
    /// Order list
    pub order: Vec<OrderEntry>,
    /// Order index to continue from after the end of the order list (None = stop)
    pub restart: Option<u16>,
    /// Patterns
    pub patterns: Vec<Pattern>,
    /// Instruments
    pub instruments: Vec<Instrument>,
    /// Samples
    pub samples: Vec<Sample>,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            initial_tempo: 125,
            initial_speed: 6,
            global_volume: GLOBAL_VOLUME_MAX,
            channels: Vec::new(),
            order: Vec::new(),
            restart: None,
            patterns: Vec::new(),
            instruments: Vec::new(),
            samples: Vec::new(),
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Create a song with a given number of centered channels.
    pub fn with_channels(title: &str, num_channels: u8) -> Self {
        let mut song = Self::new(title);
        song.channels = (0..num_channels).map(|_| ChannelSettings::default()).collect();
        song
    }

    /// Apply classic Amiga panning: L R R L.
    pub fn set_amiga_panning(&mut self) {
        for (i, ch) in self.channels.iter_mut().enumerate() {
            ch.initial_pan = if i % 4 == 0 || i % 4 == 3 { -64 } else { 64 };
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> u8 {
        self.channels.len() as u8
    }

    /// Append an empty pattern sized for this song, returning its index.
    pub fn add_pattern(&mut self, rows: u16) -> u8 {
        self.patterns.push(Pattern::new(rows, self.num_channels()));
        (self.patterns.len() - 1) as u8
    }

    /// Get a pattern by index.
    ///
    /// Indices are checked by [`Song::validate`]; out of range panics.
    pub fn pattern(&self, index: u8) -> &Pattern {
        &self.patterns[index as usize]
    }

    /// Get an instrument by zero-based index.
    pub fn instrument(&self, index: u8) -> &Instrument {
        &self.instruments[index as usize]
    }

    /// Get a sample by index.
    pub fn sample(&self, index: u8) -> &Sample {
        &self.samples[index as usize]
    }

    /// Index of the first order entry at or after `from` that plays a pattern.
    ///
    /// Skip markers are passed over; an end marker or the end of the list stops the search.
    pub fn next_playable_order(&self, from: usize) -> Option<usize> {
        for (i, entry) in self.order.iter().enumerate().skip(from) {
            match entry {
                OrderEntry::Pattern(_) => return Some(i),
                OrderEntry::Skip => continue,
                OrderEntry::End => return None,
            }
        }
        None
    }

    /// Check every index the player dereferences.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.channels.is_empty() || self.channels.len() > MAX_CHANNELS {
            return Err(ValidationError::ChannelCount(self.channels.len()));
        }
        let channels = self.num_channels();

        for (index, pattern) in self.patterns.iter().enumerate() {
            if pattern.channels != channels
                || pattern.rows == 0
                || pattern.rows > crate::pattern::MAX_ROWS
                || pattern.data.len() != pattern.rows as usize * channels as usize
            {
                return Err(ValidationError::PatternShape { pattern: index });
            }
            for (pos, cell) in pattern.data.iter().enumerate() {
                self.validate_cell(cell).map_err(|kind| ValidationError::Cell {
                    pattern: index,
                    row: pos / channels as usize,
                    channel: pos % channels as usize,
                    kind,
                })?;
            }
        }

        for (order, entry) in self.order.iter().enumerate() {
            if let OrderEntry::Pattern(p) = *entry {
                if p > MAX_PATTERN_INDEX || p as usize >= self.patterns.len() {
                    return Err(ValidationError::OrderPattern { order, pattern: p });
                }
            }
        }
        if let Some(restart) = self.restart {
            if restart as usize >= self.order.len() {
                return Err(ValidationError::Restart(restart));
            }
        }

        for (index, inst) in self.instruments.iter().enumerate() {
            if let Some(&sample) = inst
                .sample_map
                .iter()
                .find(|&&s| s != crate::NO_SAMPLE && s as usize >= self.samples.len())
            {
                return Err(ValidationError::SampleMap { instrument: index, sample });
            }
            for env in [&inst.volume_envelope, &inst.panning_envelope].into_iter().flatten() {
                if !envelope_is_valid(env) {
                    return Err(ValidationError::Envelope { instrument: index });
                }
            }
        }

        for (index, sample) in self.samples.iter().enumerate() {
            if sample.loop_type != crate::LoopType::None
                && (sample.loop_start >= sample.loop_end || sample.loop_end as usize > sample.len())
            {
                return Err(ValidationError::LoopBounds { sample: index });
            }
        }

        Ok(())
    }

    fn validate_cell(&self, cell: &Cell) -> Result<(), CellError> {
        if let crate::Note::On(n) = cell.note {
            if n > crate::MAX_NOTE {
                return Err(CellError::Note(n));
            }
        }
        if cell.instrument as usize > self.instruments.len() {
            return Err(CellError::Instrument(cell.instrument));
        }
        Ok(())
    }
}

fn envelope_is_valid(env: &crate::Envelope) -> bool {
    let len = env.points.len();
    if len == 0 {
        return false;
    }
    let increasing = env.points.windows(2).all(|w| w[0].tick < w[1].tick);
    let in_range = env.points.iter().all(|p| p.value <= crate::ENVELOPE_MAX);
    let sustain_ok = env.sustain.map_or(true, |s| (s as usize) < len);
    let loop_ok = env
        .loop_range
        .map_or(true, |r| r.start <= r.end && (r.end as usize) < len);
    increasing && in_range && sustain_ok && loop_ok
}

/// Why a song failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("song declares {0} channels (expected 1-64)")]
    ChannelCount(usize),
    #[error("pattern {pattern} has the wrong shape")]
    PatternShape { pattern: usize },
    #[error("pattern {pattern} row {row} channel {channel}: {kind}")]
    Cell {
        pattern: usize,
        row: usize,
        channel: usize,
        kind: CellError,
    },
    #[error("order {order} references missing pattern {pattern}")]
    OrderPattern { order: usize, pattern: u8 },
    #[error("restart order {0} is past the end of the order list")]
    Restart(u16),
    #[error("instrument {instrument} maps a note to missing sample {sample}")]
    SampleMap { instrument: usize, sample: u8 },
    #[error("instrument {instrument} has a malformed envelope")]
    Envelope { instrument: usize },
    #[error("sample {sample} has loop points outside its data")]
    LoopBounds { sample: usize },
}

/// A cell-level validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CellError {
    #[error("note {0} out of range")]
    Note(u8),
    #[error("instrument {0} does not exist")]
    Instrument(u8),
}

/// An entry in the order list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderEntry {
    /// Play pattern with this index
    Pattern(u8),
    /// Skip marker (+++), continue to next
    Skip,
    /// End of song marker (---)
    End,
}

/// Per-channel settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Initial panning (-64 to +64, 0 = center)
    pub initial_pan: i8,
    /// Initial volume (0-64)
    pub initial_vol: u8,
    /// Is the channel muted?
    pub muted: bool,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            initial_pan: 0,
            initial_vol: 64,
            muted: false,
        }
    }
}
