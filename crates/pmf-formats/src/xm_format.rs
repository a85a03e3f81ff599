//! FastTracker 2 (XM) format parser.
//!
//! Instruments own several samples; their keymaps are rewritten to index
//! the song-wide sample list. Relative note and finetune are folded into
//! each sample's `c4_speed`, since playback always uses Amiga periods.

use pmf_ir::{
    AutoVibrato, Cell, Effect, Envelope, Instrument, LoopRange, LoopType, Note, OrderEntry,
    Pattern, Sample, SampleData, Song, VolumeCommand, DEFAULT_C4_SPEED, ENVELOPE_MAX,
    MAX_CHANNELS, MAX_PATTERN_INDEX, MAX_ROWS, NO_SAMPLE,
};

use crate::byte_reader::ByteReader;
use crate::effect_parser::parse_effect;
use crate::FormatError;

pub(crate) const XM_MAGIC: &[u8; 17] = b"Extended Module: ";
const XM_VERSION: u16 = 0x0104;
const VERSION_OFFSET: usize = 58;
const HEADER_OFFSET: usize = 60;
const KEYMAP_NOTES: usize = 96;
const ENVELOPE_POINTS: usize = 12;
const NOTE_KEY_OFF: u8 = 97;
const MIN_TEMPO: u16 = 32;

/// Returns true if `data` starts with the XM magic.
pub(crate) fn is_xm(data: &[u8]) -> bool {
    data.starts_with(XM_MAGIC)
}

/// Load an XM file from bytes.
pub fn load_xm(data: &[u8]) -> Result<Song, FormatError> {
    if data.len() < HEADER_OFFSET {
        return Err(FormatError::UnexpectedEof { offset: data.len() });
    }
    if !is_xm(data) {
        return Err(FormatError::InvalidHeader { offset: 0 });
    }

    let mut r = ByteReader::new(data);
    r.seek(XM_MAGIC.len())?;
    let title = r.read_name::<32>(20)?;
    r.skip(1 + 20)?;
    let version = r.read_u16_le()?;
    if version != XM_VERSION {
        return Err(FormatError::UnsupportedVersion {
            offset: VERSION_OFFSET,
        });
    }

    // The header size counts from its own field
    let header_size = r.read_u32_le()? as usize;
    let song_length = r.read_u16_le()? as usize;
    let restart = r.read_u16_le()? as usize;
    let channels = r.read_u16_le()? as usize;
    let pattern_count = r.read_u16_le()? as usize;
    let instrument_count = r.read_u16_le()? as usize;
    let flags = r.read_u16_le()?;
    let speed = r.read_u16_le()?;
    let bpm = r.read_u16_le()?;
    let order_table = r.read_array::<256>()?;

    if channels == 0 || channels > MAX_CHANNELS {
        return Err(FormatError::InvalidHeader { offset: 68 });
    }
    if pattern_count > MAX_PATTERN_INDEX as usize + 1 {
        return Err(FormatError::InvalidHeader { offset: 70 });
    }
    if instrument_count > u8::MAX as usize {
        return Err(FormatError::InvalidHeader { offset: 72 });
    }
    if flags & 0x01 != 0 {
        log::info!("XM uses the linear frequency table, playing with Amiga periods");
    }

    let mut song = Song::with_channels(&title, channels as u8);
    song.initial_speed = if speed == 0 { 6 } else { speed.min(255) as u8 };
    song.initial_tempo = bpm.clamp(MIN_TEMPO, 255) as u8;

    let song_length = song_length.min(order_table.len());
    song.order = order_table[..song_length]
        .iter()
        .map(|&p| {
            if (p as usize) < pattern_count {
                OrderEntry::Pattern(p)
            } else {
                log::warn!("XM order names missing pattern {p}, skipped");
                OrderEntry::Skip
            }
        })
        .collect();
    song.restart = (restart < song_length).then_some(restart as u16);

    r.seek(HEADER_OFFSET + header_size)?;
    for _ in 0..pattern_count {
        let pattern = parse_pattern(&mut r, channels as u8, instrument_count)?;
        song.patterns.push(pattern);
    }

    for i in 0..instrument_count {
        let inst = parse_instrument(&mut r, &mut song.samples, i)?;
        song.instruments.push(inst);
    }

    song.validate()?;
    log::debug!(
        "loaded XM '{}': {} channels, {} patterns, {} instruments, {} samples",
        song.title,
        channels,
        song.patterns.len(),
        song.instruments.len(),
        song.samples.len()
    );
    Ok(song)
}

/// Parse one pattern header and unpack its cells.
fn parse_pattern(r: &mut ByteReader, channels: u8, instrument_count: usize) -> Result<Pattern, FormatError> {
    // The header length includes its own field
    let start = r.pos();
    let header_len = r.read_u32_le()? as usize;
    let _packing = r.read_u8()?;
    let rows = r.read_u16_le()?;
    let packed_size = r.read_u16_le()? as usize;
    if rows == 0 || rows > MAX_ROWS {
        return Err(FormatError::InvalidHeader { offset: start + 5 });
    }
    r.seek(start + header_len)?;

    let mut pattern = Pattern::new(rows, channels);
    if packed_size == 0 {
        return Ok(pattern);
    }
    let end = r.pos() + packed_size;
    for row in 0..rows {
        for ch in 0..channels {
            let raw = unpack_cell(r)?;
            *pattern.cell_mut(row, ch) = convert_cell(raw, instrument_count);
        }
    }
    if r.pos() > end {
        return Err(FormatError::InvalidHeader { offset: end });
    }
    r.seek(end)?;
    Ok(pattern)
}

#[derive(Clone, Copy, Debug, Default)]
struct RawCell {
    note: u8,
    instrument: u8,
    volume: u8,
    effect: u8,
    param: u8,
}

/// A set high bit makes the first byte a mask of the fields that follow.
fn unpack_cell(r: &mut ByteReader) -> Result<RawCell, FormatError> {
    let first = r.read_u8()?;
    if first & 0x80 == 0 {
        return Ok(RawCell {
            note: first,
            instrument: r.read_u8()?,
            volume: r.read_u8()?,
            effect: r.read_u8()?,
            param: r.read_u8()?,
        });
    }
    let mut cell = RawCell::default();
    if first & 0x01 != 0 {
        cell.note = r.read_u8()?;
    }
    if first & 0x02 != 0 {
        cell.instrument = r.read_u8()?;
    }
    if first & 0x04 != 0 {
        cell.volume = r.read_u8()?;
    }
    if first & 0x08 != 0 {
        cell.effect = r.read_u8()?;
    }
    if first & 0x10 != 0 {
        cell.param = r.read_u8()?;
    }
    Ok(cell)
}

fn convert_cell(raw: RawCell, instrument_count: usize) -> Cell {
    let mut cell = Cell::empty();
    cell.note = match raw.note {
        0 => Note::None,
        n @ 1..=96 => Note::On(n - 1),
        NOTE_KEY_OFF => Note::Off,
        n => {
            log::debug!("XM note {n} out of range, dropped");
            Note::None
        }
    };
    cell.instrument = if raw.instrument as usize > instrument_count {
        log::warn!("XM cell names instrument {}, dropped", raw.instrument);
        0
    } else {
        raw.instrument
    };
    cell.volume = volume_column(raw.volume);
    cell.effects[0] = xm_effect(raw.effect, raw.param);
    cell
}

/// Volume column byte to a volume command.
fn volume_column(v: u8) -> VolumeCommand {
    let x = v & 0x0F;
    match v {
        0x10..=0x50 => VolumeCommand::Volume(v - 0x10),
        0x60..=0x6F => VolumeCommand::VolumeSlideDown(x),
        0x70..=0x7F => VolumeCommand::VolumeSlideUp(x),
        0x80..=0x8F => VolumeCommand::FineVolSlideDown(x),
        0x90..=0x9F => VolumeCommand::FineVolSlideUp(x),
        0xA0..=0xAF => VolumeCommand::VibratoSpeed(x),
        0xB0..=0xBF => VolumeCommand::Vibrato(x),
        0xC0..=0xCF => VolumeCommand::Panning((x as u16 * 64 / 15) as u8),
        0xD0..=0xDF => VolumeCommand::PanSlideLeft(x),
        0xE0..=0xEF => VolumeCommand::PanSlideRight(x),
        0xF0..=0xFF => VolumeCommand::TonePorta(x << 4),
        _ => VolumeCommand::None,
    }
}

/// XM effects: `0`..`F` as in ProTracker, then lettered extensions.
fn xm_effect(effect: u8, param: u8) -> Effect {
    let (hi, lo) = (param >> 4, param & 0x0F);
    match effect {
        0x0..=0xF => parse_effect(effect, param),
        16 => Effect::SetGlobalVolume(param.min(64) * 2),
        17 => Effect::GlobalVolumeSlide(param),
        20 => Effect::KeyOff(param),
        21 => Effect::SetEnvelopePosition(param),
        25 => Effect::PanningSlide(param),
        27 => Effect::Retrigger {
            interval: lo,
            volume_change: hi,
        },
        29 => Effect::Tremor { on: hi, off: lo },
        33 => match hi {
            1 => Effect::ExtraFinePortaUp(lo),
            2 => Effect::ExtraFinePortaDown(lo),
            _ => Effect::None,
        },
        _ => Effect::None,
    }
}

struct SampleHeader {
    length: usize,
    loop_start: usize,
    loop_length: usize,
    volume: u8,
    finetune: i8,
    kind: u8,
    pan: u8,
    relative_note: i8,
    name: arrayvec::ArrayString<22>,
}

impl SampleHeader {
    fn wide(&self) -> bool {
        self.kind & 0x10 != 0
    }
}

/// Parse an instrument, appending its samples to `samples`.
fn parse_instrument(r: &mut ByteReader, samples: &mut Vec<Sample>, index: usize) -> Result<Instrument, FormatError> {
    let start = r.pos();
    let size = r.read_u32_le()? as usize;
    let name = r.read_name::<22>(22)?;
    let _kind = r.read_u8()?;
    let sample_count = r.read_u16_le()? as usize;

    let mut inst = Instrument::new(&name);
    if sample_count == 0 {
        r.seek(start + size)?;
        return Ok(inst);
    }

    let sample_header_size = r.read_u32_le()? as usize;
    let keymap = r.read_array::<KEYMAP_NOTES>()?;
    let volume_points = read_envelope_points(r)?;
    let panning_points = read_envelope_points(r)?;
    let [vol_count, pan_count, vol_sustain, vol_loop_start, vol_loop_end, pan_sustain, pan_loop_start, pan_loop_end, vol_type, pan_type, vib_type, vib_sweep, vib_depth, vib_rate] =
        r.read_array::<14>()?;
    let fadeout = r.read_u16_le()?;
    r.seek(start + size)?;

    let first = samples.len();
    if first + sample_count > NO_SAMPLE as usize {
        return Err(FormatError::UnsupportedFormat("XM with more than 254 samples"));
    }

    for (note, slot) in inst.sample_map.iter_mut().enumerate() {
        let entry = keymap[note.min(KEYMAP_NOTES - 1)] as usize;
        *slot = if entry < sample_count {
            (first + entry) as u8
        } else {
            NO_SAMPLE
        };
    }

    inst.volume_envelope = build_envelope(
        &volume_points[..(vol_count as usize).min(ENVELOPE_POINTS)],
        vol_sustain,
        (vol_loop_start, vol_loop_end),
        vol_type,
        index,
    );
    inst.panning_envelope = build_envelope(
        &panning_points[..(pan_count as usize).min(ENVELOPE_POINTS)],
        pan_sustain,
        (pan_loop_start, pan_loop_end),
        pan_type,
        index,
    );
    inst.fadeout = (fadeout as u32 * 2).min(u16::MAX as u32) as u16;
    inst.vibrato = AutoVibrato {
        waveform: vib_type,
        sweep: vib_sweep,
        depth: vib_depth,
        rate: vib_rate,
    };

    let mut headers = Vec::with_capacity(sample_count);
    for _ in 0..sample_count {
        let at = r.pos();
        headers.push(parse_sample_header(r)?);
        r.seek(at + sample_header_size)?;
    }
    for header in headers {
        let bytes = r.read_available(header.length);
        if bytes.len() < header.length {
            log::warn!(
                "XM instrument {} sample '{}' truncated: {} of {} bytes",
                index + 1,
                header.name,
                bytes.len(),
                header.length
            );
        }
        samples.push(build_sample(&header, bytes));
    }
    Ok(inst)
}

fn read_envelope_points(r: &mut ByteReader) -> Result<[(u16, u16); ENVELOPE_POINTS], FormatError> {
    let mut points = [(0, 0); ENVELOPE_POINTS];
    for point in &mut points {
        *point = (r.read_u16_le()?, r.read_u16_le()?);
    }
    Ok(points)
}

/// An envelope, or `None` when disabled or unusable.
fn build_envelope(
    points: &[(u16, u16)],
    sustain: u8,
    (loop_start, loop_end): (u8, u8),
    kind: u8,
    instrument: usize,
) -> Option<Envelope> {
    if kind & 0x01 == 0 || points.is_empty() {
        return None;
    }
    if points.windows(2).any(|w| w[0].0 >= w[1].0) {
        log::warn!("XM instrument {} envelope ticks not increasing, dropped", instrument + 1);
        return None;
    }
    let mut env = Envelope::new();
    for &(tick, value) in points {
        env.add_point(tick, value.min(ENVELOPE_MAX as u16) as u8);
    }
    let len = points.len() as u8;
    if kind & 0x02 != 0 && sustain < len {
        env.sustain = Some(sustain);
    }
    if kind & 0x04 != 0 && loop_start <= loop_end && loop_end < len {
        env.loop_range = Some(LoopRange {
            start: loop_start,
            end: loop_end,
        });
    }
    Some(env)
}

fn parse_sample_header(r: &mut ByteReader) -> Result<SampleHeader, FormatError> {
    Ok(SampleHeader {
        length: r.read_u32_le()? as usize,
        loop_start: r.read_u32_le()? as usize,
        loop_length: r.read_u32_le()? as usize,
        volume: r.read_u8()?,
        finetune: r.read_i8()?,
        kind: r.read_u8()?,
        pan: r.read_u8()?,
        relative_note: {
            let note = r.read_i8()?;
            r.skip(1)?;
            note
        },
        name: r.read_name::<22>(22)?,
    })
}

fn build_sample(header: &SampleHeader, bytes: &[u8]) -> Sample {
    let mut sample = Sample::new(&header.name);
    sample.default_volume = header.volume.min(64);
    sample.default_pan = Some((header.pan as i32 * 128 / 255 - 64) as i8);
    sample.c4_speed = xm_c4_speed(header.relative_note, header.finetune);
    sample.data = decode_delta(bytes, header.wide());

    let unit = if header.wide() { 2 } else { 1 };
    let loop_start = (header.loop_start / unit) as u32;
    let loop_end = ((header.loop_start + header.loop_length) / unit) as u32;
    sample.loop_type = match header.kind & 0x03 {
        _ if header.loop_length == 0 => LoopType::None,
        1 => LoopType::Forward,
        2 => LoopType::PingPong,
        _ => LoopType::None,
    };
    if sample.loop_type != LoopType::None {
        sample.loop_start = loop_start;
        sample.loop_end = loop_end;
        let len = sample.len() as u32;
        if sample.loop_end > len {
            log::debug!("XM sample '{}': loop end clamped to {len}", header.name);
            sample.loop_end = len;
        }
        if sample.loop_start >= sample.loop_end {
            sample.loop_type = LoopType::None;
            sample.loop_start = 0;
            sample.loop_end = 0;
        }
    }
    sample
}

/// XM sample data stores the difference to the previous frame.
fn decode_delta(bytes: &[u8], wide: bool) -> SampleData {
    if wide {
        let mut acc = 0i16;
        SampleData::Mono16(
            bytes
                .chunks_exact(2)
                .map(|b| {
                    acc = acc.wrapping_add(i16::from_le_bytes([b[0], b[1]]));
                    acc
                })
                .collect(),
        )
    } else {
        let mut acc = 0i8;
        SampleData::Mono8(
            bytes
                .iter()
                .map(|&b| {
                    acc = acc.wrapping_add(b as i8);
                    acc
                })
                .collect(),
        )
    }
}

/// Relative note in semitones plus finetune in 1/128 semitone.
fn xm_c4_speed(relative_note: i8, finetune: i8) -> u32 {
    if relative_note == 0 && finetune == 0 {
        return DEFAULT_C4_SPEED;
    }
    let semitones = relative_note as f32 + finetune as f32 / 128.0;
    let speed = DEFAULT_C4_SPEED as f32 * libm::powf(2.0, semitones / 12.0);
    (speed as u32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le16(out: &mut Vec<u8>, v: u16) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn le32(out: &mut Vec<u8>, v: u32) {
        out.extend_from_slice(&v.to_le_bytes());
    }

    fn name(out: &mut Vec<u8>, s: &str, width: usize) {
        let mut field = vec![0u8; width];
        field[..s.len()].copy_from_slice(s.as_bytes());
        out.extend_from_slice(&field);
    }

    fn build_xm() -> Vec<u8> {
        let mut xm = XM_MAGIC.to_vec();
        name(&mut xm, "xm test", 20);
        xm.push(0x1A);
        name(&mut xm, "FastTracker v2.00", 20);
        le16(&mut xm, XM_VERSION);
        le32(&mut xm, 276);
        le16(&mut xm, 2); // song length
        le16(&mut xm, 1); // restart
        le16(&mut xm, 2); // channels
        le16(&mut xm, 1); // patterns
        le16(&mut xm, 1); // instruments
        le16(&mut xm, 0); // flags
        le16(&mut xm, 3); // speed
        le16(&mut xm, 140); // bpm
        let mut orders = [0u8; 256];
        orders[1] = 5;
        xm.extend_from_slice(&orders);

        let cells: Vec<u8> = vec![
            // Row 0 ch 0: packed C-4, instrument 1, volume 32, A40
            0x9F, 49, 1, 0x30, 0xA, 0x40,
            // Row 0 ch 1: unpacked key off, pan column, G20
            97, 0, 0xC8, 16, 0x20,
            // Row 1 ch 0: empty
            0x80,
            // Row 1 ch 1: X12
            0x98, 33, 0x12,
        ];
        le32(&mut xm, 9);
        xm.push(0);
        le16(&mut xm, 2);
        le16(&mut xm, cells.len() as u16);
        xm.extend_from_slice(&cells);

        let inst = xm.len();
        le32(&mut xm, 263);
        name(&mut xm, "pad", 22);
        xm.push(0);
        le16(&mut xm, 2);
        le32(&mut xm, 40);
        let mut keymap = [0u8; 96];
        keymap[48..].fill(1);
        xm.extend_from_slice(&keymap);
        let mut env = [0u8; 48];
        for (i, (tick, value)) in [(0u16, 64u16), (10, 32), (20, 0)].iter().enumerate() {
            env[i * 4..i * 4 + 2].copy_from_slice(&tick.to_le_bytes());
            env[i * 4 + 2..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
        }
        xm.extend_from_slice(&env);
        xm.extend_from_slice(&[0u8; 48]);
        // counts, sustain/loop points, types, auto-vibrato
        xm.extend_from_slice(&[3, 1, 1, 0, 1, 0, 0, 0, 0x03, 0, 0, 0, 0, 0]);
        le16(&mut xm, 256);
        xm.resize(inst + 263, 0);

        // Sample 0: 8-bit forward loop over all four frames
        le32(&mut xm, 4);
        le32(&mut xm, 0);
        le32(&mut xm, 4);
        xm.extend_from_slice(&[64, 0, 0x01, 128, 0, 0]);
        name(&mut xm, "lo", 22);
        // Sample 1: 16-bit ping-pong, an octave up
        le32(&mut xm, 8);
        le32(&mut xm, 2);
        le32(&mut xm, 4);
        xm.extend_from_slice(&[32, 0, 0x12, 0, 12, 0]);
        name(&mut xm, "hi", 22);

        xm.extend_from_slice(&[10, 5, (-20i8) as u8, 0]);
        for delta in [1000i16, 1000, -3000, 0] {
            xm.extend_from_slice(&delta.to_le_bytes());
        }
        xm
    }

    #[test]
    fn loads_minimal_module() {
        let song = load_xm(&build_xm()).unwrap();
        assert_eq!(song.title.as_str(), "xm test");
        assert_eq!(song.num_channels(), 2);
        assert_eq!((song.initial_speed, song.initial_tempo), (3, 140));
        assert_eq!(song.order, vec![OrderEntry::Pattern(0), OrderEntry::Skip]);
        assert_eq!(song.restart, Some(1));

        let p = &song.patterns[0];
        assert_eq!(p.rows, 2);
        let c = p.cell(0, 0);
        assert_eq!(c.note, Note::On(48));
        assert_eq!(c.instrument, 1);
        assert_eq!(c.volume, VolumeCommand::Volume(32));
        assert_eq!(c.effects[0], Effect::VolumeSlide(0x40));
        let c = p.cell(0, 1);
        assert_eq!(c.note, Note::Off);
        assert_eq!(c.volume, VolumeCommand::Panning(34));
        assert_eq!(c.effects[0], Effect::SetGlobalVolume(64));
        assert!(p.cell(1, 0).is_empty());
        assert_eq!(p.cell(1, 1).effects[0], Effect::ExtraFinePortaUp(2));
    }

    #[test]
    fn instrument_keymap_and_envelope() {
        let song = load_xm(&build_xm()).unwrap();
        let inst = &song.instruments[0];
        assert_eq!(inst.name.as_str(), "pad");
        assert_eq!(inst.sample_for(47), Some(0));
        assert_eq!(inst.sample_for(48), Some(1));
        assert_eq!(inst.sample_for(110), Some(1));
        assert_eq!(inst.fadeout, 512);
        let env = inst.volume_envelope.as_ref().unwrap();
        assert_eq!(env.points.len(), 3);
        assert_eq!(env.sustain, Some(1));
        assert_eq!(env.loop_range, None);
        assert!(inst.panning_envelope.is_none());
    }

    #[test]
    fn samples_are_delta_decoded() {
        let song = load_xm(&build_xm()).unwrap();
        let lo = &song.samples[0];
        assert_eq!(lo.data, SampleData::Mono8(vec![10, 15, -5, -5]));
        assert_eq!(lo.loop_type, LoopType::Forward);
        assert_eq!((lo.loop_start, lo.loop_end), (0, 4));
        assert_eq!(lo.default_pan, Some(0));
        assert_eq!(lo.c4_speed, DEFAULT_C4_SPEED);

        let hi = &song.samples[1];
        assert_eq!(hi.data, SampleData::Mono16(vec![1000, 2000, -1000, -1000]));
        assert_eq!(hi.loop_type, LoopType::PingPong);
        assert_eq!((hi.loop_start, hi.loop_end), (1, 3));
        assert_eq!(hi.default_pan, Some(-64));
        assert_eq!(hi.c4_speed, DEFAULT_C4_SPEED * 2);
    }

    #[test]
    fn volume_column_ranges() {
        assert_eq!(volume_column(0x10), VolumeCommand::Volume(0));
        assert_eq!(volume_column(0x50), VolumeCommand::Volume(64));
        assert_eq!(volume_column(0x65), VolumeCommand::VolumeSlideDown(5));
        assert_eq!(volume_column(0xB3), VolumeCommand::Vibrato(3));
        assert_eq!(volume_column(0xF2), VolumeCommand::TonePorta(0x20));
        assert_eq!(volume_column(0x05), VolumeCommand::None);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let mut data = build_xm();
        data[VERSION_OFFSET] = 0x03;
        assert!(matches!(
            load_xm(&data),
            Err(FormatError::UnsupportedVersion { offset: 58 })
        ));
    }

    #[test]
    fn truncated_pattern_is_eof() {
        let data = build_xm();
        assert!(matches!(
            load_xm(&data[..HEADER_OFFSET + 276 + 12]),
            Err(FormatError::UnexpectedEof { .. })
        ));
    }
}
