//! ProTracker MOD format parser.

use pmf_ir::{
    Cell, Instrument, LoopType, Note, OrderEntry, Pattern, Sample, SampleData, Song,
    DEFAULT_C4_SPEED, MAX_CHANNELS,
};

use crate::byte_reader::ByteReader;
use crate::effect_parser::parse_effect;
use crate::FormatError;

const SAMPLE_COUNT: usize = 31;
const SIGNATURE_OFFSET: usize = 1080;
const PATTERN_OFFSET: usize = 1084;
const ROWS: u16 = 64;

/// Channel count for a MOD signature, if it is one we read.
pub(crate) fn channels_for_signature(sig: &[u8]) -> Option<u8> {
    let channels = match sig {
        b"M.K." | b"M!K!" | b"FLT4" | b"4CHN" => 4,
        [n @ b'1'..=b'9', b'C', b'H', b'N'] => n - b'0',
        [hi @ b'1'..=b'9', lo @ b'0'..=b'9', b'C', b'H'] => (hi - b'0') * 10 + (lo - b'0'),
        _ => return None,
    };
    (channels as usize <= MAX_CHANNELS).then_some(channels)
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Song, FormatError> {
    if data.len() < PATTERN_OFFSET {
        return Err(FormatError::UnexpectedEof { offset: data.len() });
    }
    let num_channels = channels_for_signature(&data[SIGNATURE_OFFSET..PATTERN_OFFSET])
        .ok_or(FormatError::InvalidHeader {
            offset: SIGNATURE_OFFSET,
        })?;

    let mut r = ByteReader::new(data);
    let title = r.read_name::<32>(20)?;
    let mut song = Song::with_channels(&title, num_channels);
    song.set_amiga_panning();

    let mut headers = Vec::with_capacity(SAMPLE_COUNT);
    for i in 0..SAMPLE_COUNT {
        let header = parse_sample_header(&mut r)?;
        song.instruments
            .push(Instrument::with_sample(&header.sample.name, i as u8));
        headers.push(header);
    }

    let song_length = r.read_u8()?.clamp(1, 128) as usize;
    let restart = r.read_u8()? as usize;
    let order_table = r.read_array::<128>()?;
    song.order = order_table[..song_length]
        .iter()
        .map(|&p| OrderEntry::Pattern(p))
        .collect();
    song.restart = (restart < song_length).then_some(restart as u16);

    // Every pattern named in the table is stored, played or not
    let pattern_count = order_table.iter().max().copied().unwrap_or(0) as usize + 1;
    r.seek(PATTERN_OFFSET)?;
    for _ in 0..pattern_count {
        song.patterns.push(parse_pattern(&mut r, num_channels)?);
    }

    for (i, header) in headers.into_iter().enumerate() {
        let bytes = r.read_available(header.length);
        if bytes.len() < header.length {
            log::warn!(
                "MOD sample {} truncated: {} of {} bytes present",
                i + 1,
                bytes.len(),
                header.length
            );
        }
        let mut sample = header.sample;
        sample.data = SampleData::Mono8(bytes.iter().map(|&b| b as i8).collect());
        clamp_loop(&mut sample, i);
        song.samples.push(sample);
    }

    song.validate()?;
    log::debug!(
        "loaded MOD '{}': {} channels, {} patterns",
        song.title,
        num_channels,
        song.patterns.len()
    );
    Ok(song)
}

struct SampleHeader {
    sample: Sample,
    length: usize,
}

/// Parse a sample header (30 bytes).
fn parse_sample_header(r: &mut ByteReader) -> Result<SampleHeader, FormatError> {
    let name = r.read_name::<22>(22)?;
    let length = r.read_u16_be()? as usize * 2;
    let finetune = crate::effect_parser::signed_nibble(r.read_u8()? & 0x0F);
    let volume = r.read_u8()?;
    let loop_start = r.read_u16_be()? as u32 * 2;
    let loop_length = r.read_u16_be()? as u32 * 2;

    let mut sample = Sample::new(&name);
    sample.default_volume = volume.min(64);
    sample.c4_speed = finetune_c4_speed(finetune);

    if loop_length > 2 {
        sample.loop_start = loop_start;
        sample.loop_end = loop_start + loop_length;
        sample.loop_type = LoopType::Forward;
    }

    Ok(SampleHeader { sample, length })
}

/// Each finetune step is an eighth of a semitone.
pub(crate) fn finetune_c4_speed(finetune: i8) -> u32 {
    if finetune == 0 {
        return DEFAULT_C4_SPEED;
    }
    let factor = libm::powf(2.0, finetune as f32 / 96.0);
    (DEFAULT_C4_SPEED as f32 * factor) as u32
}

/// Clamp loop points to the sample data (common in real MOD files).
pub(crate) fn clamp_loop(sample: &mut Sample, index: usize) {
    if sample.loop_type == LoopType::None {
        return;
    }
    let len = sample.len() as u32;
    if sample.loop_end > len {
        log::debug!(
            "sample {}: loop end {} clamped to length {}",
            index + 1,
            sample.loop_end,
            len
        );
        sample.loop_end = len;
    }
    if sample.loop_start >= sample.loop_end {
        sample.loop_type = LoopType::None;
        sample.loop_start = 0;
        sample.loop_end = 0;
    }
}

/// Parse a pattern: 64 rows of 4-byte cells.
fn parse_pattern(r: &mut ByteReader, num_channels: u8) -> Result<Pattern, FormatError> {
    let mut pattern = Pattern::new(ROWS, num_channels);
    for row in 0..ROWS {
        for ch in 0..num_channels {
            let at = r.pos();
            let cell = parse_cell(r.read_array()?);
            if cell.instrument as usize > SAMPLE_COUNT {
                log::warn!("MOD cell at {at:#x} names sample {}, dropped", cell.instrument);
                *pattern.cell_mut(row, ch) = Cell {
                    instrument: 0,
                    ..cell
                };
            } else {
                *pattern.cell_mut(row, ch) = cell;
            }
        }
    }
    Ok(pattern)
}

/// Parse a single pattern cell (4 bytes).
fn parse_cell(data: [u8; 4]) -> Cell {
    // Byte 0: upper 4 bits of sample number, upper 4 bits of period
    // Byte 1: lower 8 bits of period
    // Byte 2: lower 4 bits of sample number, effect command
    // Byte 3: effect parameter
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
    let sample = (data[0] & 0xF0) | (data[2] >> 4);

    let mut cell = Cell::empty();
    cell.note = period_to_note(period);
    cell.instrument = sample;
    cell.effects[0] = parse_effect(data[2] & 0x0F, data[3]);
    cell
}

/// Amiga periods for octaves 0-4 (finetune 0).
const PERIODS: [u16; 60] = [
    1712, 1616, 1525, 1440, 1357, 1281, 1209, 1141, 1077, 1017, 961, 907, // Octave 0
    856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // Octave 1
    428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // Octave 2
    214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // Octave 3
    107, 101, 95, 90, 85, 80, 76, 71, 67, 64, 60, 57, // Octave 4
];

/// First table entry is note 24, so period 428 is note 48 (C-4).
const FIRST_NOTE: usize = 24;

/// Convert an Amiga period to the closest note.
fn period_to_note(period: u16) -> Note {
    if period == 0 {
        return Note::None;
    }
    let best = PERIODS
        .iter()
        .enumerate()
        .min_by_key(|&(_, &p)| (period as i32 - p as i32).unsigned_abs())
        .map_or(0, |(i, _)| i);
    Note::On((best + FIRST_NOTE) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmf_ir::Effect;

    /// A minimal module: one pattern, one looping sample.
    fn build_mod(sig: &[u8; 4], channels: usize) -> Vec<u8> {
        let mut data = vec![0u8; 20];
        data[..4].copy_from_slice(b"test");
        for i in 0..SAMPLE_COUNT {
            let mut header = [0u8; 30];
            if i == 0 {
                header[..4].copy_from_slice(b"kick");
                header[22..24].copy_from_slice(&8u16.to_be_bytes()); // 16 bytes
                header[24] = 0x0F; // finetune -1
                header[25] = 48;
                header[26..28].copy_from_slice(&2u16.to_be_bytes());
                header[28..30].copy_from_slice(&8u16.to_be_bytes()); // runs past the end
            }
            data.extend_from_slice(&header);
        }
        data.push(1); // song length
        data.push(127); // restart
        data.extend_from_slice(&[0u8; 128]);
        data.extend_from_slice(sig);

        let mut pattern = vec![0u8; 64 * channels * 4];
        // Row 0, channel 0: C-4 (period 428), sample 1, volume slide A04
        pattern[..4].copy_from_slice(&[0x01, 0xAC, 0x1A, 0x04]);
        // Row 1, channel 1: sample 17 with no note, F06
        pattern[channels * 4 + 4..channels * 4 + 8].copy_from_slice(&[0x10, 0x00, 0x1F, 0x06]);
        data.extend_from_slice(&pattern);
        data.extend((0..16).map(|i| i as u8));
        data
    }

    #[test]
    fn test_period_to_note() {
        assert_eq!(period_to_note(428), Note::On(48));
        assert_eq!(period_to_note(1712), Note::On(24));
        assert_eq!(period_to_note(57), Note::On(83));
        assert_eq!(period_to_note(430), Note::On(48));
        assert_eq!(period_to_note(0), Note::None);
    }

    #[test]
    fn signatures() {
        assert_eq!(channels_for_signature(b"M.K."), Some(4));
        assert_eq!(channels_for_signature(b"6CHN"), Some(6));
        assert_eq!(channels_for_signature(b"16CH"), Some(16));
        assert_eq!(channels_for_signature(b"99CH"), None);
        assert_eq!(channels_for_signature(b"ABCD"), None);
    }

    #[test]
    fn loads_minimal_module() {
        let song = load_mod(&build_mod(b"M.K.", 4)).unwrap();
        assert_eq!(song.title.as_str(), "test");
        assert_eq!(song.num_channels(), 4);
        assert_eq!(song.channels[0].initial_pan, -64);
        assert_eq!(song.channels[1].initial_pan, 64);
        assert_eq!(song.channels[3].initial_pan, -64);
        assert_eq!(song.order, vec![OrderEntry::Pattern(0)]);
        assert_eq!(song.restart, None);
        assert_eq!(song.instruments.len(), 31);

        let cell = song.patterns[0].cell(0, 0);
        assert_eq!(cell.note, Note::On(48));
        assert_eq!(cell.instrument, 1);
        assert_eq!(cell.effects[0], Effect::VolumeSlide(0x04));

        let cell = song.patterns[0].cell(1, 1);
        assert_eq!(cell.note, Note::None);
        assert_eq!(cell.instrument, 17);
        assert_eq!(cell.effects[0], Effect::SetSpeed(6));
    }

    #[test]
    fn sample_loop_is_clamped_and_finetune_applied() {
        let song = load_mod(&build_mod(b"M.K.", 4)).unwrap();
        let kick = &song.samples[0];
        assert_eq!(kick.name.as_str(), "kick");
        assert_eq!(kick.len(), 16);
        assert_eq!(kick.default_volume, 48);
        assert_eq!((kick.loop_start, kick.loop_end), (4, 16));
        assert!(kick.c4_speed < DEFAULT_C4_SPEED && kick.c4_speed > 8300);
    }

    #[test]
    fn eight_channel_signature() {
        let song = load_mod(&build_mod(b"8CHN", 8)).unwrap();
        assert_eq!(song.num_channels(), 8);
        assert_eq!(song.patterns[0].cell(1, 1).instrument, 17);
    }

    #[test]
    fn unknown_signature_and_short_input_fail() {
        assert!(matches!(
            load_mod(&build_mod(b"WHAT", 4)),
            Err(FormatError::InvalidHeader { offset: 1080 })
        ));
        assert!(matches!(
            load_mod(&[0u8; 100]),
            Err(FormatError::UnexpectedEof { offset: 100 })
        ));
        let data = build_mod(b"M.K.", 4);
        assert!(matches!(
            load_mod(&data[..2000]),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
