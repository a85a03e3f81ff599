//! WAV encoding for 16-bit PCM.

use pmf_engine::{Frame, OutputChannels};
use std::io::Write;

/// Write `frames` as a 16-bit PCM WAV. Mono output keeps the left side.
pub fn write_wav(
    w: &mut impl Write,
    frames: &[Frame],
    sample_rate: u32,
    layout: OutputChannels,
) -> std::io::Result<()> {
    let num_channels = layout.count() as u16;
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = u32::try_from(frames.len() * block_align as usize)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "WAV data over 4 GiB"))?;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;
    write_data_chunk(w, frames, layout, data_size)
}

/// Encode `frames` into an in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32, layout: OutputChannels) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + frames.len() * 4);
    // Only the size check can fail, and a Vec cannot hold that much audio
    if write_wav(&mut buf, frames, sample_rate, layout).is_err() {
        buf.clear();
    }
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}

fn write_data_chunk(
    w: &mut impl Write,
    frames: &[Frame],
    layout: OutputChannels,
    data_size: u32,
) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        if layout == OutputChannels::Stereo {
            w.write_all(&frame.right.to_le_bytes())?;
        }
    }
    Ok(())
}
