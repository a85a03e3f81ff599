//! Period and frequency conversion for sample playback.
//!
//! Pitch is tracked as a "fine period": the Amiga period multiplied by 4,
//! which gives slides a quarter-period resolution. Note 48 (C-4) has fine
//! period 1712 and plays a sample at its `c4_speed`.

/// Fine period of the reference note 48, where a sample plays at its c4_speed.
pub const C4_PERIOD: u32 = 1712;

/// Lowest allowed period (highest pitch, note 119).
pub const PERIOD_MIN: u32 = 28;

/// Highest allowed period (lowest pitch, note 0).
pub const PERIOD_MAX: u32 = 27392;

/// Fine periods for octave 0 (notes 0-11). Each octave up halves the period.
const OCTAVE_ZERO_PERIODS: [u32; 12] = [
    27392, 25856, 24384, 23040, 21696, 20480, 19328, 18240, 17216, 16256, 15360, 14496,
];

/// Multipliers for 0-11 semitones, scaled by 65536 (16.16 fixed-point)
/// `SEMITONE_MUL[n] = round(2^(n/12) * 65536)`
const SEMITONE_MUL: [u32; 12] = [
    65536, // 0:  1.0
    69433, // 1:  2^(1/12)
    73562, // 2:  2^(2/12)
    77936, // 3:  2^(3/12)
    82570, // 4:  2^(4/12)
    87480, // 5:  2^(5/12)
    92682, // 6:  2^(6/12)
    98193, // 7:  2^(7/12)
    104032, // 8: 2^(8/12)
    110218, // 9: 2^(9/12)
    116772, // 10: 2^(10/12)
    123715, // 11: 2^(11/12)
];

/// C-4 rates for finetune -8..=7, indexed by the low nibble (0..7 then -8..-1).
const FINETUNE_C4_SPEEDS: [u32; 16] = [
    8363, 8413, 8463, 8529, 8581, 8651, 8723, 8757, 7895, 7941, 7985, 8046, 8107, 8169, 8232,
    8280,
];

/// Convert a note (0-119) to a fine period.
///
/// Note 36 = 3424, note 48 = 1712, note 60 = 856.
pub fn note_to_period(note: u8) -> u32 {
    let note = note.min(119);
    OCTAVE_ZERO_PERIODS[(note % 12) as usize] >> (note / 12)
}

/// Convert a fine period + c4_speed to a 16.16 fixed-point increment.
///
/// `increment = c4_speed * 1712 * 65536 / (period * sample_rate)`, truncated.
pub fn period_to_increment(period: u32, c4_speed: u32, sample_rate: u32) -> u32 {
    if period == 0 || sample_rate == 0 {
        return 0;
    }
    let num = (c4_speed as u64 * C4_PERIOD as u64) << 16;
    let den = period as u64 * sample_rate as u64;
    (num / den).min(u32::MAX as u64) as u32
}

/// Clamp a period to the playable range.
pub fn clamp_period(period: i32) -> u32 {
    period.clamp(PERIOD_MIN as i32, PERIOD_MAX as i32) as u32
}

/// Raise a period by `semitones` (period shrinks as pitch rises).
pub fn shift_period(period: u32, semitones: u8) -> u32 {
    let octaves = (semitones / 12) as u32;
    let remainder = (semitones % 12) as usize;
    let shifted = (period as u64 * 65536) / SEMITONE_MUL[remainder] as u64;
    (shifted >> octaves) as u32
}

/// C-4 rate for a signed finetune value (-8..=7).
pub fn finetune_c4_speed(finetune: i8) -> u32 {
    FINETUNE_C4_SPEEDS[(finetune as u8 & 0x0F) as usize]
}

/// Move `current` toward `target` by at most `step`, never overshooting.
pub fn slide_toward(current: u32, target: u32, step: u32) -> u32 {
    if current < target {
        current.saturating_add(step).min(target)
    } else {
        current.saturating_sub(step).max(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const C4_SPEED: u32 = 8363; // Standard Amiga rate
    const SAMPLE_RATE: u32 = 44100;

    #[test]
    fn reference_note_gives_base_frequency() {
        // increment = 8363 * 65536 / 44100 ≈ 12427
        let inc = period_to_increment(note_to_period(48), C4_SPEED, SAMPLE_RATE);
        let expected = (C4_SPEED as u64 * 65536 / SAMPLE_RATE as u64) as u32;
        assert_eq!(inc, expected);
    }

    #[test]
    fn note_to_period_octaves() {
        assert_eq!(note_to_period(36), 3424);
        assert_eq!(note_to_period(48), 1712);
        assert_eq!(note_to_period(60), 856);
        assert_eq!(note_to_period(0), PERIOD_MAX);
        assert_eq!(note_to_period(119), PERIOD_MIN);
    }

    #[test]
    fn note_to_period_sharp_notes() {
        assert_eq!(note_to_period(37), 3232);
        assert_eq!(note_to_period(49), 1616);
    }

    #[test]
    fn notes_past_the_top_clamp() {
        assert_eq!(note_to_period(200), note_to_period(119));
    }

    #[test]
    fn period_to_increment_octave_up_doubles() {
        let base = period_to_increment(1712, C4_SPEED, SAMPLE_RATE);
        let octave_up = period_to_increment(856, C4_SPEED, SAMPLE_RATE);
        assert!((octave_up as i64 - base as i64 * 2).abs() <= 1);
    }

    #[test]
    fn different_sample_rate_scales_inversely() {
        let inc_44100 = period_to_increment(1712, C4_SPEED, 44100);
        let inc_22050 = period_to_increment(1712, C4_SPEED, 22050);
        assert!((inc_22050 as i64 - inc_44100 as i64 * 2).abs() <= 1);
    }

    #[test]
    fn period_to_increment_zero_inputs_return_zero() {
        assert_eq!(period_to_increment(0, C4_SPEED, SAMPLE_RATE), 0);
        assert_eq!(period_to_increment(1712, C4_SPEED, 0), 0);
    }

    #[test]
    fn shift_period_by_octave_halves() {
        assert_eq!(shift_period(1712, 12), 856);
        assert_eq!(shift_period(1712, 0), 1712);
    }

    #[test]
    fn shift_period_by_semitone_matches_table_closely() {
        let shifted = shift_period(note_to_period(48), 7);
        let exact = note_to_period(55);
        assert!((shifted as i64 - exact as i64).abs() <= 2);
    }

    #[test]
    fn clamp_period_range() {
        assert_eq!(clamp_period(1712), 1712);
        assert_eq!(clamp_period(3), PERIOD_MIN);
        assert_eq!(clamp_period(-40), PERIOD_MIN);
        assert_eq!(clamp_period(100_000), PERIOD_MAX);
    }

    #[test]
    fn finetune_table_is_centered_on_default_rate() {
        assert_eq!(finetune_c4_speed(0), 8363);
        assert_eq!(finetune_c4_speed(-8), 7895);
        assert_eq!(finetune_c4_speed(7), 8757);
        assert_eq!(finetune_c4_speed(-1), 8280);
    }

    #[test]
    fn slide_toward_never_overshoots() {
        assert_eq!(slide_toward(100, 110, 4), 104);
        assert_eq!(slide_toward(108, 110, 4), 110);
        assert_eq!(slide_toward(110, 100, 30), 100);
        assert_eq!(slide_toward(50, 50, 3), 50);
    }
}
