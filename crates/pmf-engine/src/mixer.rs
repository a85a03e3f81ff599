//! Sample mixer.
//!
//! Renders a span of frames from resolved voice state. The sequencer never runs
//! inside a span, so every voice's increment and gains are constant across it
//! apart from the volume ramp.

use pmf_ir::{LoopType, Sample, Song};

use crate::config::{Interpolation, OutputChannels, OutputConfig};
use crate::fault::{FaultLog, PlaybackFault};
use crate::voice::{ChannelVoice, GAIN_BITS};

/// Mixes active voices into interleaved `i16` output.
#[derive(Clone, Copy, Debug)]
pub struct Mixer {
    interpolation: Interpolation,
    channels: OutputChannels,
    master_gain: u16,
}

impl Mixer {
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            interpolation: config.interpolation,
            channels: config.channels,
            master_gain: config.master_gain,
        }
    }

    /// Interleaved samples per output frame.
    pub fn stride(&self) -> usize {
        self.channels.count()
    }

    /// Mix `out.len() / stride` frames.
    ///
    /// A voice whose sample has gone missing is idled and recorded in `faults`.
    pub fn mix(
        &self,
        song: &Song,
        voices: &mut [ChannelVoice],
        global_volume: u8,
        faults: &mut FaultLog,
        out: &mut [i16],
    ) {
        let stride = self.stride();
        for frame in out.chunks_exact_mut(stride) {
            let mut left = 0i32;
            let mut right = 0i32;

            for voice in voices.iter_mut() {
                if !voice.is_active() {
                    continue;
                }
                let Some(index) = voice.sample else {
                    voice.cut();
                    continue;
                };
                let Some(sample) = song.samples.get(index as usize) else {
                    faults.record(PlaybackFault::MissingSample {
                        channel: voice.channel,
                        sample: index,
                    });
                    voice.cut();
                    continue;
                };

                let value = self.fetch(sample, voice) as i32;
                let (left_gain, right_gain) = voice.next_gains();
                left += (value * left_gain) >> GAIN_BITS;
                right += (value * right_gain) >> GAIN_BITS;

                if !advance_cursor(voice, sample) {
                    voice.cut();
                }
            }

            let left = self.master(left, global_volume);
            let right = self.master(right, global_volume);
            match self.channels {
                OutputChannels::Stereo => {
                    frame[0] = saturate(left);
                    frame[1] = saturate(right);
                }
                OutputChannels::Mono => frame[0] = saturate((left + right) / 2),
            }
        }
    }

    #[inline]
    fn master(&self, value: i32, global_volume: u8) -> i64 {
        let value = (value as i64 * global_volume as i64) >> 7;
        (value * self.master_gain as i64) >> 8
    }

    #[inline]
    fn fetch(&self, sample: &Sample, voice: &ChannelVoice) -> i16 {
        let index = (voice.position >> 16) as usize;
        match self.interpolation {
            Interpolation::Nearest => sample.data.get_mono(index),
            Interpolation::Linear => {
                let frac = (voice.position & 0xFFFF) as u16;
                sample
                    .data
                    .get_interpolated(index, next_index(sample, index), frac)
            }
        }
    }
}

#[inline]
fn saturate(value: i64) -> i16 {
    value.clamp(i16::MIN as i64, i16::MAX as i64) as i16
}

/// Loop bounds clamped to the sample length, or `None` when not looping.
#[inline]
fn loop_bounds(sample: &Sample) -> Option<(u64, u64)> {
    if !sample.has_loop() {
        return None;
    }
    let end = (sample.loop_end as u64).min(sample.len() as u64);
    let start = sample.loop_start as u64;
    (start < end).then_some((start, end))
}

/// Frame blended with `index` under linear interpolation.
#[inline]
fn next_index(sample: &Sample, index: usize) -> usize {
    match loop_bounds(sample) {
        Some((start, end)) if index as u64 + 1 >= end => match sample.loop_type {
            LoopType::PingPong => index,
            _ => start as usize,
        },
        _ => index + 1,
    }
}

/// Step a voice's cursor by its increment, wrapping at loop points.
///
/// Returns false when a one-shot sample has run out.
pub(crate) fn advance_cursor(voice: &mut ChannelVoice, sample: &Sample) -> bool {
    let inc = voice.increment as u64;
    let Some((start, end)) = loop_bounds(sample) else {
        voice.position += inc;
        return (voice.position >> 16) < sample.len() as u64;
    };

    let lo = start << 16;
    let hi = end << 16;
    let span = hi - lo;

    if voice.forward {
        let pos = voice.position + inc;
        if pos < hi {
            voice.position = pos;
            return true;
        }
        let over = pos - hi;
        match sample.loop_type {
            LoopType::PingPong => {
                let o = over % (2 * span);
                if o < span {
                    voice.position = hi - 1 - o;
                    voice.forward = false;
                } else {
                    voice.position = lo + (o - span);
                }
            }
            _ => voice.position = lo + over % span,
        }
    } else if voice.position >= lo + inc {
        voice.position -= inc;
    } else {
        let under = lo + inc - voice.position;
        let o = under % (2 * span);
        if o < span {
            voice.position = lo + o;
            voice.forward = true;
        } else {
            voice.position = hi - 1 - (o - span);
        }
    }
    true
}
