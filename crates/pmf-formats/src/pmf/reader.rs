//! PMF decoding.

use std::io::{Cursor, Read, Seek, SeekFrom};

use binrw::io::{TakeSeek, TakeSeekExt};
use binrw::{BinRead, BinReaderExt};
use pmf_ir::{
    AutoVibrato, Cell, ChannelSettings, Effect, Envelope, Instrument, LoopRange, LoopType, Note,
    OrderEntry, Pattern, Sample, SampleData, Song, VolumeCommand, MAX_CHANNELS,
    MAX_ENVELOPE_POINTS, MAX_NOTE, MAX_ROWS,
};

use super::error::DecodeError;
use super::records::*;
use crate::text::name_from_bytes;

/// Load a PMF song from memory.
pub fn load(bytes: &[u8]) -> Result<Song, DecodeError> {
    load_from(Cursor::new(bytes))
}

/// Load a PMF song from a seekable stream.
pub fn load_from<R: Read + Seek>(mut reader: R) -> Result<Song, DecodeError> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    reader.seek(SeekFrom::Start(0))?;

    let preamble: Preamble = reader.read_le()?;
    if preamble.magic != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    if preamble.version != VERSION {
        return Err(DecodeError::VersionUnsupported {
            found: preamble.version,
        });
    }
    let header: HeaderBody = reader.read_le()?;

    if header.channels == 0 || header.channels as usize > MAX_CHANNELS {
        return Err(DecodeError::corrupt(format!(
            "header declares {} channels",
            header.channels
        )));
    }

    let directory = Directory::new(&header.sections, file_len)?;

    let mut song = Song::new("");
    song.title = name_from_bytes(&header.title);
    song.initial_speed = header.speed;
    song.initial_tempo = header.tempo;
    song.global_volume = header.global_volume;
    song.restart = (header.restart != RESTART_NONE).then_some(header.restart);

    let channels: ChannelSection =
        directory.read_section(&mut reader, TAG_CHANNELS, (header.channels,))?;
    song.channels = channels.channels.iter().map(decode_channel).collect();

    let order: OrderSection = directory.read_section(&mut reader, TAG_ORDER, ())?;
    song.order = order.entries.iter().map(|&b| decode_order(b)).collect();

    let patterns: PatternSection = directory.read_section(&mut reader, TAG_PATTERNS, ())?;
    song.patterns = patterns
        .patterns
        .iter()
        .enumerate()
        .map(|(i, p)| decode_pattern(i, p, header.channels))
        .collect::<Result<_, _>>()?;

    let instruments: InstrumentSection =
        directory.read_section(&mut reader, TAG_INSTRUMENTS, ())?;
    song.instruments = instruments
        .instruments
        .into_iter()
        .enumerate()
        .map(|(i, r)| decode_instrument(i, r))
        .collect::<Result<_, _>>()?;

    song.samples = directory.read_samples(&mut reader)?;

    song.validate()
        .map_err(|e| DecodeError::CorruptIndex(e.to_string()))?;

    log::debug!(
        "loaded PMF '{}': {} channels, {} orders, {} patterns, {} instruments, {} samples",
        song.title,
        song.num_channels(),
        song.order.len(),
        song.patterns.len(),
        song.instruments.len(),
        song.samples.len()
    );
    Ok(song)
}

/// The known sections of a file, checked against its length.
struct Directory {
    channels: SectionEntry,
    order: SectionEntry,
    patterns: SectionEntry,
    instruments: SectionEntry,
    samples: SectionEntry,
}

impl Directory {
    fn new(entries: &[SectionEntry], file_len: u64) -> Result<Self, DecodeError> {
        let mut found: [Option<SectionEntry>; 5] = [None; 5];
        for entry in entries {
            let slot = match entry.tag {
                TAG_CHANNELS => 0,
                TAG_ORDER => 1,
                TAG_PATTERNS => 2,
                TAG_INSTRUMENTS => 3,
                TAG_SAMPLES => 4,
                other => {
                    log::info!("skipping unknown PMF section {:?}", String::from_utf8_lossy(&other));
                    continue;
                }
            };
            if found[slot].is_some() {
                return Err(DecodeError::corrupt(format!(
                    "duplicate section {}",
                    String::from_utf8_lossy(&entry.tag)
                )));
            }
            if entry.end() > file_len {
                return Err(DecodeError::Truncated);
            }
            found[slot] = Some(*entry);
        }

        let take = |slot: usize, tag: [u8; 4]| {
            found[slot].ok_or_else(|| {
                DecodeError::corrupt(format!("missing section {}", String::from_utf8_lossy(&tag)))
            })
        };
        Ok(Self {
            channels: take(0, TAG_CHANNELS)?,
            order: take(1, TAG_ORDER)?,
            patterns: take(2, TAG_PATTERNS)?,
            instruments: take(3, TAG_INSTRUMENTS)?,
            samples: take(4, TAG_SAMPLES)?,
        })
    }

    fn entry(&self, tag: [u8; 4]) -> &SectionEntry {
        match tag {
            TAG_CHANNELS => &self.channels,
            TAG_ORDER => &self.order,
            TAG_PATTERNS => &self.patterns,
            TAG_INSTRUMENTS => &self.instruments,
            _ => &self.samples,
        }
    }

    /// Position `reader` at a section and confine it to the declared length.
    fn open<'r, R: Read + Seek>(&self, reader: &'r mut R, tag: [u8; 4]) -> Result<TakeSeek<&'r mut R>, DecodeError> {
        let entry = self.entry(tag);
        reader.seek(SeekFrom::Start(entry.offset as u64))?;
        Ok(reader.take_seek(entry.length as u64))
    }

    /// Read one section, confined to the bytes its directory entry declares.
    fn read_section<R, T>(&self, reader: &mut R, tag: [u8; 4], args: T::Args<'_>) -> Result<T, DecodeError>
    where
        R: Read + Seek,
        T: BinRead,
    {
        let mut section = self.open(reader, tag)?;
        T::read_le_args(&mut section, args).map_err(|err| section_error(err, tag))
    }

    /// Read the sample section. Each sample's PCM goes straight from the
    /// stream into the buffer the song keeps.
    fn read_samples<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<Sample>, DecodeError> {
        let mut section = self.open(reader, TAG_SAMPLES)?;
        let count: u16 = section.read_le().map_err(|e| section_error(e, TAG_SAMPLES))?;
        let mut samples = Vec::new();
        for index in 0..count as usize {
            let header: SampleHeader = section.read_le().map_err(|e| section_error(e, TAG_SAMPLES))?;
            let frame_bytes = header.frame_bytes().ok_or_else(|| {
                DecodeError::corrupt(format!("sample {index} has {}-bit data", header.bits))
            })?;
            if header.length as u64 * frame_bytes > section.limit() {
                return Err(overrun(TAG_SAMPLES));
            }
            let data = read_pcm(&mut section, &header)?;
            samples.push(decode_sample(index, header, data)?);
        }
        Ok(samples)
    }
}

fn overrun(tag: [u8; 4]) -> DecodeError {
    DecodeError::corrupt(format!(
        "section {} overruns its declared length",
        String::from_utf8_lossy(&tag)
    ))
}

fn section_error(err: binrw::Error, tag: [u8; 4]) -> DecodeError {
    if err.is_eof() {
        overrun(tag)
    } else {
        DecodeError::from(err)
    }
}

/// Staging size for PCM reads.
const PCM_CHUNK: usize = 4096;

fn read_pcm<R: Read>(reader: &mut R, header: &SampleHeader) -> Result<SampleData, DecodeError> {
    let length = header.length as usize;
    let mut chunk = [0u8; PCM_CHUNK];
    if header.bits == 8 {
        let mut pcm = Vec::with_capacity(length);
        while pcm.len() < length {
            let n = (length - pcm.len()).min(PCM_CHUNK);
            reader.read_exact(&mut chunk[..n])?;
            pcm.extend(chunk[..n].iter().map(|&b| b as i8));
        }
        Ok(SampleData::Mono8(pcm))
    } else {
        let mut pcm = Vec::with_capacity(length);
        while pcm.len() < length {
            let n = (length - pcm.len()).min(PCM_CHUNK / 2);
            reader.read_exact(&mut chunk[..n * 2])?;
            pcm.extend(
                chunk[..n * 2]
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]])),
            );
        }
        Ok(SampleData::Mono16(pcm))
    }
}

fn decode_channel(record: &ChannelRecord) -> ChannelSettings {
    ChannelSettings {
        initial_pan: record.pan.clamp(-64, 64),
        initial_vol: record.volume.min(64),
        muted: record.flags & CHANNEL_MUTED != 0,
    }
}

fn decode_order(byte: u8) -> OrderEntry {
    match byte {
        ORDER_SKIP => OrderEntry::Skip,
        ORDER_END => OrderEntry::End,
        p => OrderEntry::Pattern(p),
    }
}

/// Unpack a pattern's cell stream.
fn decode_pattern(index: usize, record: &PatternRecord, channels: u8) -> Result<Pattern, DecodeError> {
    if record.rows == 0 || record.rows > MAX_ROWS {
        return Err(DecodeError::corrupt(format!(
            "pattern {index} has {} rows",
            record.rows
        )));
    }
    let mut pattern = Pattern::new(record.rows, channels);
    let mut stream = CellStream {
        data: &record.data,
        pos: 0,
        pattern: index,
    };

    for row in 0..record.rows {
        loop {
            let channel = stream.next()?;
            if channel == ROW_END {
                break;
            }
            if channel > channels {
                return Err(stream.error(format_args!("channel {channel} out of range")));
            }
            *pattern.cell_mut(row, channel - 1) = stream.cell()?;
        }
    }

    if stream.pos != record.data.len() {
        return Err(stream.error(format_args!("trailing bytes after the last row")));
    }
    Ok(pattern)
}

struct CellStream<'a> {
    data: &'a [u8],
    pos: usize,
    pattern: usize,
}

impl CellStream<'_> {
    fn next(&mut self) -> Result<u8, DecodeError> {
        let byte = self
            .data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.error(format_args!("cell data ends mid-row")))?;
        self.pos += 1;
        Ok(byte)
    }

    fn error(&self, what: std::fmt::Arguments<'_>) -> DecodeError {
        DecodeError::corrupt(format!("pattern {} at byte {}: {what}", self.pattern, self.pos))
    }

    fn cell(&mut self) -> Result<Cell, DecodeError> {
        let mask = self.next()?;
        if mask & !MASK_ALL != 0 {
            return Err(self.error(format_args!("bad cell mask {mask:#04x}")));
        }
        let mut cell = Cell::empty();

        if mask & MASK_NOTE != 0 {
            cell.note = match self.next()? {
                n if n <= MAX_NOTE => Note::On(n),
                NOTE_FADE => Note::Fade,
                NOTE_CUT => Note::Cut,
                NOTE_OFF => Note::Off,
                n => return Err(self.error(format_args!("bad note {n}"))),
            };
        }
        if mask & MASK_INSTRUMENT != 0 {
            cell.instrument = self.next()?;
        }
        if mask & MASK_VOLUME != 0 {
            let (code, param) = (self.next()?, self.next()?);
            cell.volume = VolumeCommand::from_raw(code, param)
                .ok_or_else(|| self.error(format_args!("bad volume command {code}")))?;
        }
        for (slot, bit) in [MASK_EFFECT0, MASK_EFFECT1].into_iter().enumerate() {
            if mask & bit != 0 {
                let (code, param) = (self.next()?, self.next()?);
                cell.effects[slot] = Effect::from_raw(code, param).unwrap_or_else(|| {
                    log::warn!(
                        "pattern {}: unknown effect code {code:#04x}, ignoring",
                        self.pattern
                    );
                    Effect::None
                });
            }
        }
        Ok(cell)
    }
}

fn decode_instrument(index: usize, record: InstrumentRecord) -> Result<Instrument, DecodeError> {
    let mut inst = Instrument::default();
    inst.name = name_from_bytes(&record.name);
    inst.fadeout = record.fadeout;
    inst.vibrato = AutoVibrato {
        waveform: record.vibrato_waveform,
        sweep: record.vibrato_sweep,
        depth: record.vibrato_depth,
        rate: record.vibrato_rate,
    };
    match record.sample_map {
        SampleMapRecord::Single(sample) => inst.set_single_sample(sample),
        SampleMapRecord::Table(map) => inst.sample_map = map,
    }
    inst.volume_envelope = decode_envelope(index, &record.volume_envelope)?;
    inst.panning_envelope = decode_envelope(index, &record.panning_envelope)?;
    Ok(inst)
}

fn decode_envelope(instrument: usize, record: &EnvelopeRecord) -> Result<Option<Envelope>, DecodeError> {
    if record.flags & ENV_PRESENT == 0 {
        return Ok(None);
    }
    if record.points.len() > MAX_ENVELOPE_POINTS {
        return Err(DecodeError::corrupt(format!(
            "instrument {instrument} envelope has {} points",
            record.points.len()
        )));
    }
    let mut env = Envelope::new();
    for point in &record.points {
        env.add_point(point.tick, point.value);
    }
    if record.flags & ENV_SUSTAIN != 0 {
        env.sustain = Some(record.sustain);
    }
    if record.flags & ENV_LOOP != 0 {
        env.loop_range = Some(LoopRange {
            start: record.loop_start,
            end: record.loop_end,
        });
    }
    Ok(Some(env))
}

fn decode_sample(index: usize, record: SampleHeader, data: SampleData) -> Result<Sample, DecodeError> {
    let loop_type = match record.loop_type {
        0 => LoopType::None,
        1 => LoopType::Forward,
        2 => LoopType::PingPong,
        other => {
            return Err(DecodeError::corrupt(format!(
                "sample {index} has loop type {other}"
            )))
        }
    };
    let mut sample = Sample::default();
    sample.name = name_from_bytes(&record.name);
    sample.loop_start = record.loop_start;
    sample.loop_end = record.loop_end;
    sample.loop_type = loop_type;
    sample.default_volume = record.volume.min(64);
    sample.default_pan = match record.pan {
        PAN_NONE => None,
        p => Some((p.min(128) as i16 - 64) as i8),
    };
    sample.c4_speed = record.c4_speed;
    sample.data = data;
    Ok(sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(rows: u16, data: &[u8]) -> PatternRecord {
        PatternRecord {
            rows,
            data: data.to_vec(),
        }
    }

    #[test]
    fn sparse_cells_land_in_their_channel() {
        let record = pattern(2, &[0, 2, MASK_NOTE | MASK_INSTRUMENT, 60, 3, 0]);
        let decoded = decode_pattern(0, &record, 2).unwrap();
        assert!(decoded.cell(0, 0).is_empty());
        assert_eq!(decoded.cell(1, 1).note, Note::On(60));
        assert_eq!(decoded.cell(1, 1).instrument, 3);
    }

    #[test]
    fn unknown_effect_decodes_to_none() {
        let record = pattern(1, &[1, MASK_EFFECT0 | MASK_EFFECT1, 0x7F, 5, 0x1C, 3, 0]);
        let decoded = decode_pattern(0, &record, 1).unwrap();
        assert_eq!(decoded.cell(0, 0).effects, [Effect::None, Effect::SetSpeed(3)]);
    }

    #[test]
    fn malformed_streams_are_rejected() {
        let cases: &[(&str, PatternRecord)] = &[
            ("mask", pattern(1, &[1, 0x20, 0])),
            ("channel", pattern(1, &[3, MASK_NOTE, 10, 0])),
            ("note", pattern(1, &[1, MASK_NOTE, 150, 0])),
            ("volume", pattern(1, &[1, MASK_VOLUME, 99, 0, 0])),
            ("short", pattern(2, &[0])),
            ("trailing", pattern(1, &[0, 0])),
            ("rows", pattern(0, &[])),
        ];
        for (name, record) in cases {
            assert!(
                matches!(decode_pattern(0, record, 2), Err(DecodeError::CorruptIndex(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn envelope_flags_select_sustain_and_loop() {
        let record = EnvelopeRecord {
            flags: ENV_PRESENT | ENV_LOOP,
            sustain: 1,
            loop_start: 0,
            loop_end: 1,
            points: vec![PointRecord { tick: 0, value: 64 }, PointRecord { tick: 4, value: 0 }],
        };
        let env = decode_envelope(0, &record).unwrap().unwrap();
        assert_eq!(env.sustain, None);
        assert_eq!(env.loop_range, Some(LoopRange { start: 0, end: 1 }));

        let absent = EnvelopeRecord {
            flags: 0,
            ..record
        };
        assert_eq!(decode_envelope(0, &absent).unwrap(), None);
    }
}
