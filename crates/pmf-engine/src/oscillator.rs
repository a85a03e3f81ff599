//! LFO waveforms for vibrato, tremolo and auto-vibrato.

/// Half a sine cycle in 32 steps, peak 255 (ProTracker table).
const HALF_SINE: [u8; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, 255, 253, 250, 244,
    235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];

/// Waveform selectors, the low two bits of the set-waveform effects.
pub const WAVE_SINE: u8 = 0;
pub const WAVE_RAMP_DOWN: u8 = 1;
pub const WAVE_SQUARE: u8 = 2;
pub const WAVE_RANDOM: u8 = 3;

/// Bit 2 of a waveform selector keeps the phase across new notes.
pub const WAVE_NO_RETRIGGER: u8 = 4;

/// Waveform value at `phase` (256 steps per cycle), in -255..=255.
pub fn waveform_value(waveform: u8, phase: u8) -> i32 {
    match waveform & 0x03 {
        WAVE_SINE => {
            let step = phase >> 2;
            let v = HALF_SINE[(step & 0x1F) as usize] as i32;
            if step < 32 { v } else { -v }
        }
        WAVE_RAMP_DOWN => 255 - phase as i32 * 2,
        WAVE_SQUARE => {
            if phase < 128 { 255 } else { -255 }
        }
        _ => {
            // Deterministic noise so renders stay reproducible
            let x = phase.wrapping_mul(0x9E) ^ 0x5C;
            x as i32 * 2 - 255
        }
    }
}

/// Phase state of one LFO.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Oscillator {
    pub phase: u8,
    pub waveform: u8,
}

impl Oscillator {
    /// Current value, -255..=255.
    pub fn value(&self) -> i32 {
        waveform_value(self.waveform, self.phase)
    }

    /// Advance by a tracker speed (0-63, 64 steps per cycle).
    pub fn step(&mut self, speed: u8) {
        self.phase = self.phase.wrapping_add((speed & 0x3F) << 2);
    }

    /// Reset phase for a new note unless the waveform asks to keep it.
    pub fn retrigger(&mut self) {
        if self.waveform & WAVE_NO_RETRIGGER == 0 {
            self.phase = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_is_antisymmetric() {
        assert_eq!(waveform_value(WAVE_SINE, 0), 0);
        assert_eq!(waveform_value(WAVE_SINE, 64), 255);
        assert_eq!(waveform_value(WAVE_SINE, 192), -255);
        assert_eq!(waveform_value(WAVE_SINE, 32), -waveform_value(WAVE_SINE, 160));
    }

    #[test]
    fn ramp_and_square_cover_full_range() {
        assert_eq!(waveform_value(WAVE_RAMP_DOWN, 0), 255);
        assert_eq!(waveform_value(WAVE_RAMP_DOWN, 255), -255);
        assert_eq!(waveform_value(WAVE_SQUARE, 127), 255);
        assert_eq!(waveform_value(WAVE_SQUARE, 128), -255);
    }

    #[test]
    fn random_is_deterministic_and_bounded() {
        for phase in 0..=255u8 {
            let v = waveform_value(WAVE_RANDOM, phase);
            assert_eq!(v, waveform_value(WAVE_RANDOM, phase));
            assert!((-255..=255).contains(&v));
        }
    }

    #[test]
    fn step_wraps_after_one_cycle() {
        let mut osc = Oscillator::default();
        for _ in 0..16 {
            osc.step(4);
        }
        assert_eq!(osc.phase, 0);
    }

    #[test]
    fn retrigger_honours_keep_phase_bit() {
        let mut osc = Oscillator { phase: 40, waveform: WAVE_SINE };
        osc.retrigger();
        assert_eq!(osc.phase, 0);

        let mut keep = Oscillator { phase: 40, waveform: WAVE_SINE | WAVE_NO_RETRIGGER };
        keep.retrigger();
        assert_eq!(keep.phase, 40);
    }
}
