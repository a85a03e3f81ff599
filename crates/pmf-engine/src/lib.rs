//! Playback engine for PMF songs.
//!
//! Sequences a [`pmf_ir::Song`] row by row and tick by tick, drives one
//! [`ChannelVoice`] per channel and mixes them into interleaved `i16` PCM.
//! Everything the render path needs is allocated when the [`Engine`] is built.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod config;
mod engine;
mod envelope_state;
mod fault;
mod frame;
pub mod frequency;
mod memory;
mod mixer;
pub mod oscillator;
mod sequencer;
mod voice;

pub use config::{Interpolation, OutputChannels, OutputConfig};
pub use engine::{Command, Engine, Transport, COMMAND_QUEUE_LEN};
pub use envelope_state::EnvelopeState;
pub use fault::{FaultLog, PlaybackFault};
pub use frame::Frame;
pub use memory::{EffectMemory, MemorySlot};
pub use mixer::Mixer;
pub use sequencer::{PlaybackCursor, Position, Sequencer};
pub use voice::{ChannelVoice, Globals, TickContext, VoiceState, FADE_MAX, MIN_TEMPO};
