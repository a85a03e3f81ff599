//! Scream Tracker 3 (S3M) format parser.
//!
//! Instruments and patterns are located through parapointers (offsets in
//! 16-byte paragraphs). Only enabled PCM channels become song channels;
//! cells on any other channel slot are dropped.

use pmf_ir::{
    Cell, Effect, Instrument, LoopType, Note, OrderEntry, Pattern, Sample, SampleData, Song,
    VolumeCommand, DEFAULT_C4_SPEED, GLOBAL_VOLUME_MAX, MAX_NOTE,
};

use crate::byte_reader::ByteReader;
use crate::effect_parser::bcd_row;
use crate::mod_format::clamp_loop;
use crate::FormatError;

const HEADER_LEN: usize = 0x60;
pub(crate) const SIGNATURE_OFFSET: usize = 0x2C;
const CHANNEL_SETTINGS_OFFSET: usize = 0x40;
const CHANNEL_SLOTS: usize = 32;
const ROWS: u16 = 64;
const PAN_TABLE_PRESENT: u8 = 252;
const MIN_TEMPO: u8 = 32;

const ORDER_SKIP: u8 = 254;
const ORDER_END: u8 = 255;

/// Returns true if the S3M signature is in place.
pub(crate) fn is_s3m(data: &[u8]) -> bool {
    data.get(SIGNATURE_OFFSET..SIGNATURE_OFFSET + 4) == Some(&b"SCRM"[..])
}

/// Load an S3M file from bytes.
pub fn load_s3m(data: &[u8]) -> Result<Song, FormatError> {
    if data.len() < HEADER_LEN {
        return Err(FormatError::UnexpectedEof { offset: data.len() });
    }
    if !is_s3m(data) {
        return Err(FormatError::InvalidHeader {
            offset: SIGNATURE_OFFSET,
        });
    }

    let mut r = ByteReader::new(data);
    let title = r.read_name::<32>(28)?;
    r.skip(1)?;
    if r.read_u8()? != 16 {
        return Err(FormatError::InvalidHeader { offset: 0x1D });
    }
    r.skip(2)?;
    let order_count = r.read_u16_le()? as usize;
    let instrument_count = r.read_u16_le()? as usize;
    let pattern_count = r.read_u16_le()? as usize;
    let _flags = r.read_u16_le()?;
    let _tracker = r.read_u16_le()?;
    let signed_samples = match r.read_u16_le()? {
        1 => true,
        2 => false,
        _ => return Err(FormatError::UnsupportedVersion { offset: 0x2A }),
    };
    r.skip(4)?;
    let global_volume = r.read_u8()?;
    let speed = r.read_u8()?;
    let tempo = r.read_u8()?;
    let stereo = r.read_u8()? & 0x80 != 0;
    r.skip(1)?;
    let default_pan = r.read_u8()?;

    if instrument_count > u8::MAX as usize || pattern_count > ORDER_SKIP as usize {
        return Err(FormatError::InvalidHeader { offset: 0x22 });
    }

    r.seek(CHANNEL_SETTINGS_OFFSET)?;
    let settings = r.read_array::<CHANNEL_SLOTS>()?;
    let orders = r.read_bytes(order_count)?;
    let instrument_ptrs = read_parapointers(&mut r, instrument_count)?;
    let pattern_ptrs = read_parapointers(&mut r, pattern_count)?;
    let pan_table = if default_pan == PAN_TABLE_PRESENT {
        Some(r.read_array::<CHANNEL_SLOTS>()?)
    } else {
        None
    };

    // Map enabled PCM channel slots onto consecutive song channels
    let mut channel_map = [None; CHANNEL_SLOTS];
    let mut pans = Vec::new();
    for (slot, &setting) in settings.iter().enumerate() {
        if setting >= 16 {
            continue;
        }
        channel_map[slot] = Some(pans.len() as u8);
        let nibble = match pan_table.map(|t| t[slot]) {
            Some(p) if p & 0x20 != 0 => Some(p & 0x0F),
            _ if stereo => Some(if setting < 8 { 0x3 } else { 0xC }),
            _ => None,
        };
        pans.push(nibble.map_or(0, pan_from_nibble));
    }
    if pans.is_empty() {
        return Err(FormatError::InvalidHeader {
            offset: CHANNEL_SETTINGS_OFFSET,
        });
    }

    let mut song = Song::with_channels(&title, pans.len() as u8);
    for (channel, pan) in song.channels.iter_mut().zip(pans) {
        channel.initial_pan = pan;
    }
    song.global_volume = (global_volume.min(64) * 2).min(GLOBAL_VOLUME_MAX);
    song.initial_speed = if speed == 0 || speed == 0xFF { 6 } else { speed };
    song.initial_tempo = if tempo < MIN_TEMPO {
        log::debug!("S3M tempo {tempo} out of range, using 125");
        125
    } else {
        tempo
    };

    song.order = orders
        .iter()
        .map(|&o| match o {
            ORDER_SKIP => OrderEntry::Skip,
            ORDER_END => OrderEntry::End,
            p if (p as usize) < pattern_count => OrderEntry::Pattern(p),
            p => {
                log::warn!("S3M order names missing pattern {p}, skipped");
                OrderEntry::Skip
            }
        })
        .collect();

    for (i, &ptr) in instrument_ptrs.iter().enumerate() {
        let sample = parse_sample(data, ptr, signed_samples, i)?;
        song.instruments
            .push(Instrument::with_sample(&sample.name, i as u8));
        song.samples.push(sample);
    }

    let channels = song.num_channels();
    for &ptr in &pattern_ptrs {
        let pattern = parse_pattern(data, ptr, &channel_map, channels, instrument_count)?;
        song.patterns.push(pattern);
    }

    song.validate()?;
    log::debug!(
        "loaded S3M '{}': {} channels, {} patterns, {} samples",
        song.title,
        channels,
        song.patterns.len(),
        song.samples.len()
    );
    Ok(song)
}

fn read_parapointers(r: &mut ByteReader, count: usize) -> Result<Vec<usize>, FormatError> {
    (0..count)
        .map(|_| r.read_u16_le().map(|p| p as usize * 16))
        .collect()
}

/// S3M pan nibble (0 left, 15 right) to -64..=64.
fn pan_from_nibble(nibble: u8) -> i8 {
    (nibble.min(15) as i32 * 128 / 15 - 64) as i8
}

/// Parse an instrument header and its sample data.
fn parse_sample(data: &[u8], offset: usize, signed: bool, index: usize) -> Result<Sample, FormatError> {
    if offset == 0 {
        return Ok(Sample::default());
    }
    let mut r = ByteReader::new(data);
    r.seek(offset)?;
    let kind = r.read_u8()?;
    r.skip(12)?;
    let mem_hi = r.read_u8()? as usize;
    let mem_lo = r.read_u16_le()? as usize;
    let length = r.read_u32_le()? as usize;
    let loop_start = r.read_u32_le()?;
    let loop_end = r.read_u32_le()?;
    let volume = r.read_u8()?;
    r.skip(1)?;
    let packing = r.read_u8()?;
    let flags = r.read_u8()?;
    let c2spd = r.read_u32_le()?;
    r.skip(12)?;
    let name = r.read_name::<22>(28)?;

    let mut sample = Sample::new(&name);
    sample.default_volume = volume.min(64);
    sample.c4_speed = if c2spd == 0 { DEFAULT_C4_SPEED } else { c2spd };

    match kind {
        1 => {}
        0 => return Ok(sample),
        _ => {
            log::info!("S3M instrument {} is not a PCM sample, left silent", index + 1);
            return Ok(sample);
        }
    }
    if packing != 0 {
        log::warn!("S3M sample {} uses packing {packing}, left silent", index + 1);
        return Ok(sample);
    }
    if flags & 0x02 != 0 {
        log::debug!("S3M sample {} is stereo, keeping the left channel", index + 1);
    }

    let wide = flags & 0x04 != 0;
    let mut pcm = ByteReader::new(data);
    pcm.seek(((mem_hi << 16) | mem_lo) * 16)?;
    let bytes = pcm.read_available(if wide { length * 2 } else { length });
    sample.data = decode_pcm(bytes, wide, signed);

    if flags & 0x01 != 0 {
        sample.loop_type = LoopType::Forward;
        sample.loop_start = loop_start;
        sample.loop_end = loop_end;
    }
    clamp_loop(&mut sample, index);
    Ok(sample)
}

fn decode_pcm(bytes: &[u8], wide: bool, signed: bool) -> SampleData {
    let flip8 = if signed { 0 } else { 0x80 };
    let flip16 = if signed { 0 } else { 0x8000 };
    if wide {
        SampleData::Mono16(
            bytes
                .chunks_exact(2)
                .map(|b| (u16::from_le_bytes([b[0], b[1]]) ^ flip16) as i16)
                .collect(),
        )
    } else {
        SampleData::Mono8(bytes.iter().map(|&b| (b ^ flip8) as i8).collect())
    }
}

/// Unpack a 64-row pattern. A null parapointer is an empty pattern.
fn parse_pattern(
    data: &[u8],
    offset: usize,
    channel_map: &[Option<u8>; CHANNEL_SLOTS],
    channels: u8,
    instrument_count: usize,
) -> Result<Pattern, FormatError> {
    let mut pattern = Pattern::new(ROWS, channels);
    if offset == 0 {
        return Ok(pattern);
    }
    let mut r = ByteReader::new(data);
    r.seek(offset)?;
    let _packed_len = r.read_u16_le()?;

    for row in 0..ROWS {
        loop {
            let what = r.read_u8()?;
            if what == 0 {
                break;
            }
            let mut cell = Cell::empty();
            if what & 0x20 != 0 {
                cell.note = parse_note(r.read_u8()?);
                cell.instrument = r.read_u8()?;
                if cell.instrument as usize > instrument_count {
                    log::warn!("S3M cell names instrument {}, dropped", cell.instrument);
                    cell.instrument = 0;
                }
            }
            if what & 0x40 != 0 {
                cell.volume = VolumeCommand::Volume(r.read_u8()?.min(64));
            }
            if what & 0x80 != 0 {
                let (cmd, info) = (r.read_u8()?, r.read_u8()?);
                cell.effects[0] = parse_s3m_effect(cmd, info);
            }
            if let Some(channel) = channel_map[(what & 0x1F) as usize] {
                *pattern.cell_mut(row, channel) = cell;
            }
        }
    }
    Ok(pattern)
}

/// High nibble octave, low nibble semitone.
fn parse_note(byte: u8) -> Note {
    match byte {
        255 => Note::None,
        254 => Note::Cut,
        n => {
            let (octave, semitone) = (n >> 4, n & 0x0F);
            let note = octave * 12 + semitone;
            if semitone > 11 || note > MAX_NOTE {
                log::debug!("S3M note {n:#04x} out of range, dropped");
                Note::None
            } else {
                Note::On(note)
            }
        }
    }
}

/// Map an S3M effect letter (1 = A) to the shared effect set.
fn parse_s3m_effect(cmd: u8, info: u8) -> Effect {
    let (hi, lo) = (info >> 4, info & 0x0F);
    match cmd {
        1 if info > 0 => Effect::SetSpeed(info),
        2 => Effect::PositionJump(info),
        3 => Effect::PatternBreak(bcd_row(info)),
        4 => Effect::VolumeSlide(info),
        5 => match hi {
            0xF => Effect::FinePortaDown(lo),
            0xE => Effect::ExtraFinePortaDown(lo),
            _ => Effect::PortaDown(info),
        },
        6 => match hi {
            0xF => Effect::FinePortaUp(lo),
            0xE => Effect::ExtraFinePortaUp(lo),
            _ => Effect::PortaUp(info),
        },
        7 => Effect::TonePorta(info),
        8 => Effect::Vibrato { speed: hi, depth: lo },
        9 => Effect::Tremor { on: hi, off: lo },
        10 => Effect::Arpeggio { x: hi, y: lo },
        11 => Effect::VibratoVolSlide(info),
        12 => Effect::TonePortaVolSlide(info),
        15 => Effect::SampleOffset(info),
        17 => Effect::Retrigger {
            interval: lo,
            volume_change: hi,
        },
        18 => Effect::Tremolo { speed: hi, depth: lo },
        19 => match hi {
            0x2 => Effect::SetFinetune(lo as i8 - 8),
            0x3 => Effect::SetVibratoWaveform(lo),
            0x4 => Effect::SetTremoloWaveform(lo),
            0x8 => Effect::SetPanPosition(lo),
            0xB => Effect::PatternLoop(lo),
            0xC => Effect::NoteCut(lo),
            0xD => Effect::NoteDelay(lo),
            0xE => Effect::PatternDelay(lo),
            _ => Effect::None,
        },
        20 if info >= MIN_TEMPO => Effect::SetTempo(info),
        21 => Effect::FineVibrato { speed: hi, depth: lo },
        22 => Effect::SetGlobalVolume(info.min(64) * 2),
        _ => Effect::None,
    }
}
