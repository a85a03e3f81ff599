//! Shared ProTracker-compatible effect parsing.
//!
//! Used by both the MOD and XM converters. Effects `0`..`F` share one
//! encoding: command nibble plus parameter byte. Slide parameters are
//! passed through unchanged so the engine's effect memory sees the raw
//! byte.

use pmf_ir::Effect;

/// Parse a ProTracker effect command.
pub fn parse_effect(cmd: u8, param: u8) -> Effect {
    match cmd {
        0x0 if param != 0 => Effect::Arpeggio {
            x: param >> 4,
            y: param & 0x0F,
        },
        0x1 => Effect::PortaUp(param),
        0x2 => Effect::PortaDown(param),
        0x3 => Effect::TonePorta(param),
        0x4 => Effect::Vibrato {
            speed: param >> 4,
            depth: param & 0x0F,
        },
        0x5 => Effect::TonePortaVolSlide(param),
        0x6 => Effect::VibratoVolSlide(param),
        0x7 => Effect::Tremolo {
            speed: param >> 4,
            depth: param & 0x0F,
        },
        0x8 => Effect::SetPan(param),
        0x9 => Effect::SampleOffset(param),
        0xA => Effect::VolumeSlide(param),
        0xB => Effect::PositionJump(param),
        0xC => Effect::SetVolume(param.min(64)),
        0xD => Effect::PatternBreak(bcd_row(param)),
        0xE => parse_extended_effect(param),
        0xF => match param {
            0 => Effect::None,
            1..=0x1F => Effect::SetSpeed(param),
            _ => Effect::SetTempo(param),
        },
        _ => Effect::None,
    }
}

/// Parse extended effect (Exx).
pub fn parse_extended_effect(param: u8) -> Effect {
    let cmd = param >> 4;
    let val = param & 0x0F;

    match cmd {
        0x1 => Effect::FinePortaUp(val),
        0x2 => Effect::FinePortaDown(val),
        0x4 => Effect::SetVibratoWaveform(val),
        0x5 => Effect::SetFinetune(signed_nibble(val)),
        0x6 => Effect::PatternLoop(val),
        0x7 => Effect::SetTremoloWaveform(val),
        0x8 => Effect::SetPanPosition(val),
        0x9 => Effect::RetriggerNote(val),
        0xA => Effect::FineVolumeSlideUp(val),
        0xB => Effect::FineVolumeSlideDown(val),
        0xC => Effect::NoteCut(val),
        0xD => Effect::NoteDelay(val),
        0xE => Effect::PatternDelay(val),
        _ => Effect::None,
    }
}

/// Pattern break rows are written as two decimal digits.
pub fn bcd_row(param: u8) -> u8 {
    (param >> 4) * 10 + (param & 0x0F)
}

/// A 4-bit two's complement value.
pub fn signed_nibble(val: u8) -> i8 {
    if val > 7 {
        val as i8 - 16
    } else {
        val as i8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slides_keep_the_raw_parameter() {
        assert_eq!(parse_effect(0xA, 0x0F), Effect::VolumeSlide(0x0F));
        assert_eq!(parse_effect(0x5, 0x30), Effect::TonePortaVolSlide(0x30));
    }

    #[test]
    fn speed_and_tempo_split_at_32() {
        assert_eq!(parse_effect(0xF, 0x1F), Effect::SetSpeed(31));
        assert_eq!(parse_effect(0xF, 0x20), Effect::SetTempo(32));
        assert_eq!(parse_effect(0xF, 0), Effect::None);
    }

    #[test]
    fn pattern_break_is_decimal() {
        assert_eq!(parse_effect(0xD, 0x12), Effect::PatternBreak(12));
    }

    #[test]
    fn extended_finetune_is_signed() {
        assert_eq!(parse_effect(0xE, 0x5F), Effect::SetFinetune(-1));
        assert_eq!(parse_effect(0xE, 0x57), Effect::SetFinetune(7));
    }

    #[test]
    fn empty_arpeggio_is_no_effect() {
        assert_eq!(parse_effect(0, 0), Effect::None);
        assert_eq!(parse_effect(0, 0x37), Effect::Arpeggio { x: 3, y: 7 });
    }
}
