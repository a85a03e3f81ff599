//! Instrument and envelope types.

use arrayvec::{ArrayString, ArrayVec};

/// Number of note slots in an instrument's sample map.
pub const NOTE_SLOTS: usize = 120;

/// Sample map entry for notes that play nothing.
pub const NO_SAMPLE: u8 = u8::MAX;

/// Largest number of breakpoints an envelope can hold.
pub const MAX_ENVELOPE_POINTS: usize = 25;

/// Envelope values run from 0 to this value.
pub const ENVELOPE_MAX: u8 = 64;

/// An instrument definition.
#[derive(Clone, Debug, PartialEq)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<22>,
    /// Sample mapping: note (0-119) -> sample index, or [`NO_SAMPLE`]
    pub sample_map: [u8; NOTE_SLOTS],
    /// Volume envelope
    pub volume_envelope: Option<Envelope>,
    /// Panning envelope (32 = center)
    pub panning_envelope: Option<Envelope>,
    /// Fadeout amount subtracted from a 65536 scale each tick after release (0 = no fade)
    pub fadeout: u16,
    /// Auto-vibrato applied to every note of this instrument
    pub vibrato: AutoVibrato,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            sample_map: [NO_SAMPLE; NOTE_SLOTS],
            volume_envelope: None,
            panning_envelope: None,
            fadeout: 0,
            vibrato: AutoVibrato::default(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Instrument playing one sample across the whole keyboard.
    pub fn with_sample(name: &str, sample_index: u8) -> Self {
        let mut inst = Self::new(name);
        inst.set_single_sample(sample_index);
        inst
    }

    /// Set all notes to map to a single sample.
    pub fn set_single_sample(&mut self, sample_index: u8) {
        self.sample_map.fill(sample_index);
    }

    /// Sample index played for `note`, if any.
    pub fn sample_for(&self, note: u8) -> Option<u8> {
        match self.sample_map.get(note as usize) {
            Some(&NO_SAMPLE) | None => None,
            Some(&idx) => Some(idx),
        }
    }

    /// Returns `Some(index)` when every note maps to the same sample.
    pub fn single_sample(&self) -> Option<u8> {
        let first = self.sample_map[0];
        self.sample_map.iter().all(|&s| s == first).then_some(first)
    }
}

/// Instrument auto-vibrato (XM style). A depth of zero disables it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    /// Waveform type (0=sine, 1=square, 2=ramp down, 3=ramp up)
    pub waveform: u8,
    /// Ticks until full depth is reached
    pub sweep: u8,
    /// Vibrato depth
    pub depth: u8,
    /// Phase advance per tick
    pub rate: u8,
}

/// Envelope loop between two point indices (inclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRange {
    pub start: u8,
    pub end: u8,
}

/// A volume or panning envelope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Envelope {
    /// Envelope points, ordered by strictly increasing tick
    pub points: ArrayVec<EnvelopePoint, MAX_ENVELOPE_POINTS>,
    /// Sustain point index (None = no sustain)
    pub sustain: Option<u8>,
    /// Loop range (None = no loop)
    pub loop_range: Option<LoopRange>,
}

impl Envelope {
    /// Create a new empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point to the envelope. Points past the capacity are dropped.
    pub fn add_point(&mut self, tick: u16, value: u8) {
        let _ = self.points.try_push(EnvelopePoint { tick, value });
    }

    /// Builder-style helper used by converters and tests.
    pub fn from_points(points: &[(u16, u8)]) -> Self {
        let mut env = Self::new();
        for &(tick, value) in points {
            env.add_point(tick, value);
        }
        env
    }

    /// Tick of the last point.
    pub fn last_tick(&self) -> u16 {
        self.points.last().map_or(0, |p| p.tick)
    }

    /// Interpolated value at `tick` within `segment` (the point index at or
    /// before `tick`), in 8.8 fixed point.
    pub fn segment_value(&self, segment: usize, tick: u16) -> u16 {
        let Some(prev) = self.points.get(segment) else {
            return 0;
        };
        let Some(next) = self.points.get(segment + 1) else {
            return (prev.value as u16) << 8;
        };
        if tick <= prev.tick || next.tick <= prev.tick {
            return (prev.value as u16) << 8;
        }
        if tick >= next.tick {
            return (next.value as u16) << 8;
        }
        let t = (tick - prev.tick) as i32;
        let d = (next.tick - prev.tick) as i32;
        let a = (prev.value as i32) << 8;
        let b = (next.value as i32) << 8;
        (a + (b - a) * t / d) as u16
    }

    /// Get the interpolated value at a given tick, in 8.8 fixed point.
    pub fn value_at(&self, tick: u16) -> u16 {
        let segment = self
            .points
            .iter()
            .rposition(|p| p.tick <= tick)
            .unwrap_or(0);
        self.segment_value(segment, tick)
    }
}

/// A point in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// Tick position (0-65535)
    pub tick: u16,
    /// Value (0-64)
    pub value: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_interpolation() {
        let env = Envelope::from_points(&[(0, 64), (100, 0)]);

        assert_eq!(env.value_at(0), 64 << 8);
        assert_eq!(env.value_at(50), 32 << 8);
        assert_eq!(env.value_at(100), 0);
        assert_eq!(env.value_at(200), 0); // Past end
    }

    #[test]
    fn interpolation_truncates_toward_zero() {
        let env = Envelope::from_points(&[(0, 0), (3, 1)]);
        // 256 * 1 / 3 = 85.33
        assert_eq!(env.value_at(1), 85);
        let falling = Envelope::from_points(&[(0, 1), (3, 0)]);
        // 256 - 85.33 → 256 + (-85)
        assert_eq!(falling.value_at(1), 171);
    }

    #[test]
    fn points_beyond_capacity_are_dropped() {
        let mut env = Envelope::new();
        for i in 0..40u16 {
            env.add_point(i * 2, 10);
        }
        assert_eq!(env.points.len(), MAX_ENVELOPE_POINTS);
    }

    #[test]
    fn sample_lookup_respects_unmapped_notes() {
        let mut inst = Instrument::with_sample("lead", 2);
        assert_eq!(inst.sample_for(60), Some(2));
        assert_eq!(inst.single_sample(), Some(2));
        inst.sample_map[61] = NO_SAMPLE;
        assert_eq!(inst.sample_for(61), None);
        assert_eq!(inst.sample_for(200), None);
        assert_eq!(inst.single_sample(), None);
    }
}
