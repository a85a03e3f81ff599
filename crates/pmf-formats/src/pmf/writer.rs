//! PMF encoding.

use std::io::{Cursor, Seek, Write};

use binrw::BinWrite;
use pmf_ir::{Cell, Envelope, Instrument, LoopType, Note, OrderEntry, Pattern, Sample, SampleData, Song};

use super::error::EncodeError;
use super::records::*;
use crate::text::name_to_bytes;

/// Encode a song as a PMF file in memory.
pub fn encode(song: &Song) -> Result<Vec<u8>, EncodeError> {
    let mut out = Cursor::new(Vec::new());
    write_to(song, &mut out)?;
    Ok(out.into_inner())
}

/// Write a song as a PMF file.
///
/// The song is validated first; a song that would not load back is refused.
pub fn write_to<W: Write + Seek>(song: &Song, mut writer: W) -> Result<(), EncodeError> {
    song.validate()?;

    let payloads = [
        (TAG_CHANNELS, section_bytes(&channel_section(song))?),
        (TAG_ORDER, section_bytes(&order_section(song)?)?),
        (TAG_PATTERNS, section_bytes(&pattern_section(song)?)?),
        (TAG_INSTRUMENTS, section_bytes(&instrument_section(song))?),
        (TAG_SAMPLES, sample_section(song)?),
    ];

    let mut offset = HEADER_LEN + SECTION_ENTRY_LEN * payloads.len() as u64;
    let mut sections = Vec::with_capacity(payloads.len());
    for (tag, bytes) in &payloads {
        let length = u32::try_from(bytes.len()).map_err(|_| EncodeError::TooLarge("section"))?;
        let start = u32::try_from(offset).map_err(|_| EncodeError::TooLarge("file"))?;
        sections.push(SectionEntry {
            tag: *tag,
            offset: start,
            length,
        });
        offset += length as u64;
    }

    let header = HeaderBody {
        channels: song.num_channels(),
        speed: song.initial_speed,
        tempo: song.initial_tempo,
        global_volume: song.global_volume,
        restart: song.restart.unwrap_or(RESTART_NONE),
        title: name_to_bytes(&song.title),
        sections,
    };

    Preamble {
        magic: MAGIC,
        version: VERSION,
    }
    .write_le(&mut writer)?;
    header.write_le(&mut writer)?;
    for (_, bytes) in &payloads {
        writer.write_all(bytes)?;
    }
    Ok(())
}

fn section_bytes<T>(section: &T) -> Result<Vec<u8>, EncodeError>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut out = Cursor::new(Vec::new());
    section.write_le(&mut out)?;
    Ok(out.into_inner())
}

fn channel_section(song: &Song) -> ChannelSection {
    ChannelSection {
        channels: song
            .channels
            .iter()
            .map(|ch| ChannelRecord {
                pan: ch.initial_pan,
                volume: ch.initial_vol,
                flags: if ch.muted { CHANNEL_MUTED } else { 0 },
            })
            .collect(),
    }
}

fn order_section(song: &Song) -> Result<OrderSection, EncodeError> {
    if song.order.len() > u16::MAX as usize {
        return Err(EncodeError::TooLarge("order list"));
    }
    let entries = song
        .order
        .iter()
        .map(|entry| match *entry {
            OrderEntry::Pattern(p) => p,
            OrderEntry::Skip => ORDER_SKIP,
            OrderEntry::End => ORDER_END,
        })
        .collect();
    Ok(OrderSection { entries })
}

fn pattern_section(song: &Song) -> Result<PatternSection, EncodeError> {
    if song.patterns.len() > u16::MAX as usize {
        return Err(EncodeError::TooLarge("pattern list"));
    }
    let patterns = song.patterns.iter().map(encode_pattern).collect::<Result<_, _>>()?;
    Ok(PatternSection { patterns })
}

/// Pack a pattern into the row-terminated cell stream. Empty cells are omitted.
fn encode_pattern(pattern: &Pattern) -> Result<PatternRecord, EncodeError> {
    let mut data = Vec::new();
    for row in 0..pattern.rows {
        let cells = pattern.row(row).unwrap_or_default();
        for (channel, cell) in cells.iter().enumerate() {
            if !cell.is_empty() {
                data.push(channel as u8 + 1);
                encode_cell(cell, &mut data);
            }
        }
        data.push(ROW_END);
    }
    if data.len() > u32::MAX as usize {
        return Err(EncodeError::TooLarge("pattern data"));
    }
    Ok(PatternRecord {
        rows: pattern.rows,
        data,
    })
}

fn encode_cell(cell: &Cell, out: &mut Vec<u8>) {
    let mask_at = out.len();
    out.push(0);
    let mut mask = 0;

    let note = match cell.note {
        Note::None => None,
        Note::On(n) => Some(n),
        Note::Fade => Some(NOTE_FADE),
        Note::Cut => Some(NOTE_CUT),
        Note::Off => Some(NOTE_OFF),
    };
    if let Some(note) = note {
        mask |= MASK_NOTE;
        out.push(note);
    }
    if cell.instrument != 0 {
        mask |= MASK_INSTRUMENT;
        out.push(cell.instrument);
    }
    if cell.volume != pmf_ir::VolumeCommand::None {
        mask |= MASK_VOLUME;
        let (code, param) = cell.volume.to_raw();
        out.extend_from_slice(&[code, param]);
    }
    for (effect, bit) in cell.effects.iter().zip([MASK_EFFECT0, MASK_EFFECT1]) {
        if *effect != pmf_ir::Effect::None {
            mask |= bit;
            let (code, param) = effect.to_raw();
            out.extend_from_slice(&[code, param]);
        }
    }
    out[mask_at] = mask;
}

fn instrument_section(song: &Song) -> InstrumentSection {
    InstrumentSection {
        instruments: song.instruments.iter().map(encode_instrument).collect(),
    }
}

fn encode_instrument(inst: &Instrument) -> InstrumentRecord {
    InstrumentRecord {
        name: name_to_bytes(&inst.name),
        fadeout: inst.fadeout,
        vibrato_waveform: inst.vibrato.waveform,
        vibrato_sweep: inst.vibrato.sweep,
        vibrato_depth: inst.vibrato.depth,
        vibrato_rate: inst.vibrato.rate,
        sample_map: match inst.single_sample() {
            Some(sample) => SampleMapRecord::Single(sample),
            None => SampleMapRecord::Table(inst.sample_map),
        },
        volume_envelope: encode_envelope(inst.volume_envelope.as_ref()),
        panning_envelope: encode_envelope(inst.panning_envelope.as_ref()),
    }
}

fn encode_envelope(env: Option<&Envelope>) -> EnvelopeRecord {
    let Some(env) = env else {
        return EnvelopeRecord::default();
    };
    let mut record = EnvelopeRecord {
        flags: ENV_PRESENT,
        points: env
            .points
            .iter()
            .map(|p| PointRecord {
                tick: p.tick,
                value: p.value,
            })
            .collect(),
        ..EnvelopeRecord::default()
    };
    if let Some(sustain) = env.sustain {
        record.flags |= ENV_SUSTAIN;
        record.sustain = sustain;
    }
    if let Some(range) = env.loop_range {
        record.flags |= ENV_LOOP;
        record.loop_start = range.start;
        record.loop_end = range.end;
    }
    record
}

/// Sample headers interleaved with their PCM, written from the song's buffers.
fn sample_section(song: &Song) -> Result<Vec<u8>, EncodeError> {
    let count = u16::try_from(song.samples.len()).map_err(|_| EncodeError::TooLarge("sample list"))?;
    let mut out = Cursor::new(Vec::new());
    count.write_le(&mut out)?;
    for sample in &song.samples {
        sample_header(sample)?.write_le(&mut out)?;
        match &sample.data {
            SampleData::Mono8(v) => v.write_le(&mut out)?,
            SampleData::Mono16(v) => v.write_le(&mut out)?,
        }
    }
    Ok(out.into_inner())
}

fn sample_header(sample: &Sample) -> Result<SampleHeader, EncodeError> {
    let length = u32::try_from(sample.len()).map_err(|_| EncodeError::TooLarge("sample data"))?;
    Ok(SampleHeader {
        name: name_to_bytes(&sample.name),
        length,
        loop_start: sample.loop_start,
        loop_end: sample.loop_end,
        loop_type: match sample.loop_type {
            LoopType::None => 0,
            LoopType::Forward => 1,
            LoopType::PingPong => 2,
        },
        bits: sample.data.bits(),
        volume: sample.default_volume,
        pan: match sample.default_pan {
            None => PAN_NONE,
            Some(p) => (p.clamp(-64, 64) as i16 + 64) as u8,
        },
        c4_speed: sample.c4_speed,
    })
}
