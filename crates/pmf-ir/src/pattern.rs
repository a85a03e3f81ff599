//! Pattern and cell types for tracker sequences.

use alloc::vec::Vec;
use crate::effects::{Effect, VolumeCommand};

/// Highest playable note (B-9).
pub const MAX_NOTE: u8 = 119;

/// Number of effect columns carried by every cell.
pub const CELL_EFFECTS: usize = 2;

/// Longest pattern supported.
pub const MAX_ROWS: u16 = 256;

/// A note value in a pattern cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    /// No note
    #[default]
    None,
    /// Note on (0-119, where 48 = C-4 plays at the sample's c4_speed)
    On(u8),
    /// Note off / key release
    Off,
    /// Note fade (start fadeout, keep envelope sustain)
    Fade,
    /// Note cut (silence immediately)
    Cut,
}

impl Note {
    /// Create a note from octave (0-9) and semitone (0-11).
    pub const fn from_octave_semitone(octave: u8, semitone: u8) -> Self {
        Note::On(octave * 12 + semitone)
    }

    /// Get the octave (0-9) if this is a note on.
    pub const fn octave(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n / 12),
            _ => None,
        }
    }

    /// Get the semitone (0-11) if this is a note on.
    pub const fn semitone(self) -> Option<u8> {
        match self {
            Note::On(n) => Some(n % 12),
            _ => None,
        }
    }
}

/// A single cell in a pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// Note value
    pub note: Note,
    /// Instrument number (0 = none, 1-255 = instrument index + 1)
    pub instrument: u8,
    /// Volume column command
    pub volume: VolumeCommand,
    /// Effect column commands
    pub effects: [Effect; CELL_EFFECTS],
}

impl Cell {
    /// Create an empty cell.
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: VolumeCommand::None,
            effects: [Effect::None; CELL_EFFECTS],
        }
    }

    /// Returns true if the cell is completely empty.
    pub fn is_empty(&self) -> bool {
        self.note == Note::None
            && self.instrument == 0
            && self.volume == VolumeCommand::None
            && self.effects.iter().all(|e| *e == Effect::None)
    }

    /// Store `effect` in the first free effect column.
    ///
    /// Returns false when every column is already occupied.
    pub fn push_effect(&mut self, effect: Effect) -> bool {
        match self.effects.iter_mut().find(|e| **e == Effect::None) {
            Some(slot) => {
                *slot = effect;
                true
            }
            None => false,
        }
    }

    /// Iterate over the non-empty effect columns.
    pub fn active_effects(&self) -> impl Iterator<Item = &Effect> {
        self.effects.iter().filter(|e| **e != Effect::None)
    }
}

/// A pattern containing rows of cells across channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Pattern {
    /// Number of rows (1-256)
    pub rows: u16,
    /// Number of channels
    pub channels: u8,
    /// Pattern data, stored row-major: data[row * channels + channel]
    pub data: Vec<Cell>,
}

impl Pattern {
    /// Create a new pattern with empty cells.
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    /// Get a reference to a cell.
    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// Get a mutable reference to a cell.
    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Cell {
        debug_assert!(row < self.rows);
        debug_assert!(channel < self.channels);
        &mut self.data[row as usize * self.channels as usize + channel as usize]
    }

    /// All cells of a row, or `None` past the last row.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        let width = self.channels as usize;
        let start = row as usize * width;
        self.data.get(start..start + width)
    }
}
