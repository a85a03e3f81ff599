//! Song data model for the PMF tracker player.
//!
//! This crate defines the in-memory song representation shared by the
//! format converters, the PMF codec, and the playback engine. Converters
//! produce a [`Song`], the engine consumes it read-only.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod instrument;
mod pattern;
mod sample;
pub mod song;

pub use effects::{Effect, VolumeCommand};
pub use instrument::{
    AutoVibrato, Envelope, EnvelopePoint, Instrument, LoopRange, ENVELOPE_MAX,
    MAX_ENVELOPE_POINTS, NOTE_SLOTS, NO_SAMPLE,
};
pub use pattern::{Cell, Note, Pattern, CELL_EFFECTS, MAX_NOTE, MAX_ROWS};
pub use sample::{LoopType, Sample, SampleData, DEFAULT_C4_SPEED};
pub use song::{
    CellError, ChannelSettings, OrderEntry, Song, ValidationError, GLOBAL_VOLUME_MAX,
    MAX_CHANNELS, MAX_PATTERN_INDEX,
};
