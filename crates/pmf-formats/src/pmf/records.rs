//! On-disk records of a PMF file.
//!
//! These mirror the byte layout one to one. Conversion to and from
//! [`pmf_ir::Song`] happens in the reader and writer.

use binrw::binrw;

pub(crate) const MAGIC: [u8; 4] = *b"PMF\x1A";
pub(crate) const VERSION: u16 = 1;

/// Bytes before the section directory.
pub(crate) const HEADER_LEN: u64 = 46;
pub(crate) const SECTION_ENTRY_LEN: u64 = 12;

pub(crate) const TAG_CHANNELS: [u8; 4] = *b"CHAN";
pub(crate) const TAG_ORDER: [u8; 4] = *b"ORDR";
pub(crate) const TAG_PATTERNS: [u8; 4] = *b"PATT";
pub(crate) const TAG_INSTRUMENTS: [u8; 4] = *b"INST";
pub(crate) const TAG_SAMPLES: [u8; 4] = *b"SMPL";

pub(crate) const RESTART_NONE: u16 = 0xFFFF;
pub(crate) const ORDER_SKIP: u8 = 0xFE;
pub(crate) const ORDER_END: u8 = 0xFF;
pub(crate) const PAN_NONE: u8 = 0xFF;

pub(crate) const CHANNEL_MUTED: u8 = 0x01;

pub(crate) const ENV_PRESENT: u8 = 0x01;
pub(crate) const ENV_SUSTAIN: u8 = 0x02;
pub(crate) const ENV_LOOP: u8 = 0x04;

// Cell stream
pub(crate) const ROW_END: u8 = 0x00;
pub(crate) const MASK_NOTE: u8 = 0x01;
pub(crate) const MASK_INSTRUMENT: u8 = 0x02;
pub(crate) const MASK_VOLUME: u8 = 0x04;
pub(crate) const MASK_EFFECT0: u8 = 0x08;
pub(crate) const MASK_EFFECT1: u8 = 0x10;
pub(crate) const MASK_ALL: u8 = 0x1F;
pub(crate) const NOTE_FADE: u8 = 0xFD;
pub(crate) const NOTE_CUT: u8 = 0xFE;
pub(crate) const NOTE_OFF: u8 = 0xFF;

/// Magic and version, read on their own so each can fail distinctly.
#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct Preamble {
    pub magic: [u8; 4],
    pub version: u16,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct HeaderBody {
    pub channels: u8,
    pub speed: u8,
    pub tempo: u8,
    pub global_volume: u8,
    pub restart: u16,
    pub title: [u8; 32],
    #[br(temp)]
    #[bw(calc = sections.len() as u16)]
    section_count: u16,
    #[br(count = section_count)]
    pub sections: Vec<SectionEntry>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SectionEntry {
    pub tag: [u8; 4],
    pub offset: u32,
    pub length: u32,
}

impl SectionEntry {
    pub fn end(&self) -> u64 {
        self.offset as u64 + self.length as u64
    }
}

#[binrw]
#[brw(little)]
#[br(import(channels: u8))]
#[derive(Debug)]
pub(crate) struct ChannelSection {
    #[br(count = channels)]
    pub channels: Vec<ChannelRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct ChannelRecord {
    pub pan: i8,
    pub volume: u8,
    pub flags: u8,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct OrderSection {
    #[br(temp)]
    #[bw(calc = entries.len() as u16)]
    count: u16,
    #[br(count = count)]
    pub entries: Vec<u8>,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct PatternSection {
    #[br(temp)]
    #[bw(calc = patterns.len() as u16)]
    count: u16,
    #[br(count = count)]
    pub patterns: Vec<PatternRecord>,
}

/// One pattern: a row count and its packed cell stream.
#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct PatternRecord {
    pub rows: u16,
    #[br(temp)]
    #[bw(calc = data.len() as u32)]
    length: u32,
    #[br(count = length)]
    pub data: Vec<u8>,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct InstrumentSection {
    #[br(temp)]
    #[bw(calc = instruments.len() as u16)]
    count: u16,
    #[br(count = count)]
    pub instruments: Vec<InstrumentRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) struct InstrumentRecord {
    pub name: [u8; 22],
    pub fadeout: u16,
    pub vibrato_waveform: u8,
    pub vibrato_sweep: u8,
    pub vibrato_depth: u8,
    pub vibrato_rate: u8,
    pub sample_map: SampleMapRecord,
    pub volume_envelope: EnvelopeRecord,
    pub panning_envelope: EnvelopeRecord,
}

#[binrw]
#[brw(little)]
#[derive(Debug)]
pub(crate) enum SampleMapRecord {
    #[brw(magic = 0u8)]
    Single(u8),
    #[brw(magic = 1u8)]
    Table([u8; 120]),
}

#[binrw]
#[brw(little)]
#[derive(Debug, Default)]
pub(crate) struct EnvelopeRecord {
    pub flags: u8,
    pub sustain: u8,
    pub loop_start: u8,
    pub loop_end: u8,
    #[br(temp)]
    #[bw(calc = points.len() as u8)]
    count: u8,
    #[br(count = count)]
    pub points: Vec<PointRecord>,
}

#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PointRecord {
    pub tick: u16,
    pub value: u8,
}

/// Fixed part of a sample record. `length` frames of `bits`-wide PCM follow
/// it directly; the section starts with a `u16` sample count.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone)]
pub(crate) struct SampleHeader {
    pub name: [u8; 22],
    pub length: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub loop_type: u8,
    pub bits: u8,
    pub volume: u8,
    pub pan: u8,
    pub c4_speed: u32,
}

impl SampleHeader {
    /// Bytes per PCM frame, or `None` for an unknown width.
    pub fn frame_bytes(&self) -> Option<u64> {
        match self.bits {
            8 => Some(1),
            16 => Some(2),
            _ => None,
        }
    }
}
