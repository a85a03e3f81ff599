//! Effect command types for tracker patterns.
//!
//! Commands that take a "slide" style parameter keep the raw parameter byte
//! (packed nibbles) so that effect memory can store and recall it unchanged.

/// Volume column command (XM/IT style).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolumeCommand {
    #[default]
    None,
    /// Set volume (0-64)
    Volume(u8),
    VolumeSlideDown(u8),
    VolumeSlideUp(u8),
    FineVolSlideDown(u8),
    FineVolSlideUp(u8),
    /// Set panning (0-64, 32 = center)
    Panning(u8),
    PortaDown(u8),
    PortaUp(u8),
    TonePorta(u8),
    /// Vibrato depth, using the remembered vibrato speed
    Vibrato(u8),
    VibratoSpeed(u8),
    PanSlideLeft(u8),
    PanSlideRight(u8),
}

impl VolumeCommand {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            VolumeCommand::None => "None",
            VolumeCommand::Volume(_) => "Volume",
            VolumeCommand::VolumeSlideDown(_) => "VolumeSlideDown",
            VolumeCommand::VolumeSlideUp(_) => "VolumeSlideUp",
            VolumeCommand::FineVolSlideDown(_) => "FineVolSlideDown",
            VolumeCommand::FineVolSlideUp(_) => "FineVolSlideUp",
            VolumeCommand::Panning(_) => "Panning",
            VolumeCommand::PortaDown(_) => "PortaDown",
            VolumeCommand::PortaUp(_) => "PortaUp",
            VolumeCommand::TonePorta(_) => "TonePorta",
            VolumeCommand::Vibrato(_) => "Vibrato",
            VolumeCommand::VibratoSpeed(_) => "VibratoSpeed",
            VolumeCommand::PanSlideLeft(_) => "PanSlideLeft",
            VolumeCommand::PanSlideRight(_) => "PanSlideRight",
        }
    }

    /// Packed `(code, parameter)` form used by the PMF cell encoding.
    pub fn to_raw(self) -> (u8, u8) {
        match self {
            VolumeCommand::None => (0, 0),
            VolumeCommand::Volume(v) => (1, v),
            VolumeCommand::VolumeSlideDown(v) => (2, v),
            VolumeCommand::VolumeSlideUp(v) => (3, v),
            VolumeCommand::FineVolSlideDown(v) => (4, v),
            VolumeCommand::FineVolSlideUp(v) => (5, v),
            VolumeCommand::Panning(v) => (6, v),
            VolumeCommand::PortaDown(v) => (7, v),
            VolumeCommand::PortaUp(v) => (8, v),
            VolumeCommand::TonePorta(v) => (9, v),
            VolumeCommand::Vibrato(v) => (10, v),
            VolumeCommand::VibratoSpeed(v) => (11, v),
            VolumeCommand::PanSlideLeft(v) => (12, v),
            VolumeCommand::PanSlideRight(v) => (13, v),
        }
    }

    /// Inverse of [`VolumeCommand::to_raw`]. Returns `None` for unknown codes.
    pub fn from_raw(code: u8, param: u8) -> Option<Self> {
        Some(match code {
            0 => VolumeCommand::None,
            1 => VolumeCommand::Volume(param),
            2 => VolumeCommand::VolumeSlideDown(param),
            3 => VolumeCommand::VolumeSlideUp(param),
            4 => VolumeCommand::FineVolSlideDown(param),
            5 => VolumeCommand::FineVolSlideUp(param),
            6 => VolumeCommand::Panning(param),
            7 => VolumeCommand::PortaDown(param),
            8 => VolumeCommand::PortaUp(param),
            9 => VolumeCommand::TonePorta(param),
            10 => VolumeCommand::Vibrato(param),
            11 => VolumeCommand::VibratoSpeed(param),
            12 => VolumeCommand::PanSlideLeft(param),
            13 => VolumeCommand::PanSlideRight(param),
            _ => return None,
        })
    }
}

/// Effect column command.
///
/// This enum covers effects from MOD, S3M, XM, and IT formats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Arpeggio: cycle between note, note+x, note+y each tick
    Arpeggio { x: u8, y: u8 },
    /// Slide pitch up by amount per tick
    PortaUp(u8),
    /// Slide pitch down by amount per tick
    PortaDown(u8),
    /// Slide toward target note
    TonePorta(u8),
    /// Vibrato with speed and depth
    Vibrato { speed: u8, depth: u8 },
    /// Vibrato at a quarter of the depth
    FineVibrato { speed: u8, depth: u8 },
    /// Tone portamento + volume slide (parameter is the volume slide)
    TonePortaVolSlide(u8),
    /// Vibrato + volume slide (parameter is the volume slide)
    VibratoVolSlide(u8),

    // === Tremolo & Volume ===
    /// Tremolo (volume oscillation)
    Tremolo { speed: u8, depth: u8 },
    /// Set channel panning (0-255)
    SetPan(u8),
    /// Set sample offset (in 256-frame units)
    SampleOffset(u8),
    /// Volume slide, `x0` up, `0y` down, `xF` fine up, `Fy` fine down
    VolumeSlide(u8),
    /// Jump to order position
    PositionJump(u8),
    /// Set channel volume (0-64)
    SetVolume(u8),
    /// Break to row in next pattern
    PatternBreak(u8),

    // === Extended effects (Exx/Fxx style) ===
    /// Fine porta up (once per row)
    FinePortaUp(u8),
    /// Fine porta down (once per row)
    FinePortaDown(u8),
    /// Set vibrato waveform (0=sine, 1=ramp, 2=square, 3=random, +4 no retrigger)
    SetVibratoWaveform(u8),
    /// Set finetune (-8 to +7)
    SetFinetune(i8),
    /// Pattern loop (0=set start, n=loop n times)
    PatternLoop(u8),
    /// Set tremolo waveform
    SetTremoloWaveform(u8),
    /// Set panning position (0-15)
    SetPanPosition(u8),
    /// Retrigger note every n ticks
    RetriggerNote(u8),
    /// Fine volume slide up (once per row)
    FineVolumeSlideUp(u8),
    /// Fine volume slide down (once per row)
    FineVolumeSlideDown(u8),
    /// Cut note after n ticks
    NoteCut(u8),
    /// Delay note by n ticks
    NoteDelay(u8),
    /// Delay pattern by n rows
    PatternDelay(u8),

    // === Speed & Tempo ===
    /// Set ticks per row (speed)
    SetSpeed(u8),
    /// Set BPM tempo
    SetTempo(u8),

    // === XM/IT ===
    /// Set global volume (0-128)
    SetGlobalVolume(u8),
    /// Global volume slide (`x0` up, `0y` down)
    GlobalVolumeSlide(u8),
    /// Set envelope position
    SetEnvelopePosition(u8),
    /// Panning slide (`x0` right, `0y` left)
    PanningSlide(u8),
    /// Retrigger with volume change
    Retrigger { interval: u8, volume_change: u8 },
    /// Tremor (on/off volume)
    Tremor { on: u8, off: u8 },
    /// Release the note after n ticks
    KeyOff(u8),

    // === Extra fine slides ===
    /// Extra fine porta up
    ExtraFinePortaUp(u8),
    /// Extra fine porta down
    ExtraFinePortaDown(u8),
}

fn nibbles(param: u8) -> (u8, u8) {
    (param >> 4, param & 0x0F)
}

fn pack(hi: u8, lo: u8) -> u8 {
    (hi.min(15) << 4) | lo.min(15)
}

impl Effect {
    /// Returns the variant name as a static string (ignoring parameters).
    pub fn name(&self) -> &'static str {
        match self {
            Effect::None => "None",
            Effect::Arpeggio { .. } => "Arpeggio",
            Effect::PortaUp(_) => "PortaUp",
            Effect::PortaDown(_) => "PortaDown",
            Effect::TonePorta(_) => "TonePorta",
            Effect::Vibrato { .. } => "Vibrato",
            Effect::FineVibrato { .. } => "FineVibrato",
            Effect::TonePortaVolSlide(_) => "TonePortaVolSlide",
            Effect::VibratoVolSlide(_) => "VibratoVolSlide",
            Effect::Tremolo { .. } => "Tremolo",
            Effect::SetPan(_) => "SetPan",
            Effect::SampleOffset(_) => "SampleOffset",
            Effect::VolumeSlide(_) => "VolumeSlide",
            Effect::PositionJump(_) => "PositionJump",
            Effect::SetVolume(_) => "SetVolume",
            Effect::PatternBreak(_) => "PatternBreak",
            Effect::FinePortaUp(_) => "FinePortaUp",
            Effect::FinePortaDown(_) => "FinePortaDown",
            Effect::SetVibratoWaveform(_) => "SetVibratoWaveform",
            Effect::SetFinetune(_) => "SetFinetune",
            Effect::PatternLoop(_) => "PatternLoop",
            Effect::SetTremoloWaveform(_) => "SetTremoloWaveform",
            Effect::SetPanPosition(_) => "SetPanPosition",
            Effect::RetriggerNote(_) => "RetriggerNote",
            Effect::FineVolumeSlideUp(_) => "FineVolumeSlideUp",
            Effect::FineVolumeSlideDown(_) => "FineVolumeSlideDown",
            Effect::NoteCut(_) => "NoteCut",
            Effect::NoteDelay(_) => "NoteDelay",
            Effect::PatternDelay(_) => "PatternDelay",
            Effect::SetSpeed(_) => "SetSpeed",
            Effect::SetTempo(_) => "SetTempo",
            Effect::SetGlobalVolume(_) => "SetGlobalVolume",
            Effect::GlobalVolumeSlide(_) => "GlobalVolumeSlide",
            Effect::SetEnvelopePosition(_) => "SetEnvelopePosition",
            Effect::PanningSlide(_) => "PanningSlide",
            Effect::Retrigger { .. } => "Retrigger",
            Effect::Tremor { .. } => "Tremor",
            Effect::KeyOff(_) => "KeyOff",
            Effect::ExtraFinePortaUp(_) => "ExtraFinePortaUp",
            Effect::ExtraFinePortaDown(_) => "ExtraFinePortaDown",
        }
    }

    /// Returns true if this effect is processed only on tick 0.
    pub fn is_row_effect(&self) -> bool {
        matches!(self, Effect::NoteCut(0))
            || matches!(
                self,
                Effect::PositionJump(_)
                    | Effect::PatternBreak(_)
                    | Effect::SetSpeed(_)
                    | Effect::SetTempo(_)
                    | Effect::SetVolume(_)
                    | Effect::SetPan(_)
                    | Effect::SetPanPosition(_)
                    | Effect::SampleOffset(_)
                    | Effect::FinePortaUp(_)
                    | Effect::FinePortaDown(_)
                    | Effect::FineVolumeSlideUp(_)
                    | Effect::FineVolumeSlideDown(_)
                    | Effect::SetVibratoWaveform(_)
                    | Effect::SetTremoloWaveform(_)
                    | Effect::SetFinetune(_)
                    | Effect::ExtraFinePortaUp(_)
                    | Effect::ExtraFinePortaDown(_)
                    | Effect::NoteDelay(_)
                    | Effect::PatternDelay(_)
                    | Effect::PatternLoop(_)
                    | Effect::SetGlobalVolume(_)
                    | Effect::SetEnvelopePosition(_)
            )
    }

    /// Returns true if a note on the same row must not restart the sample.
    pub fn is_tone_porta(&self) -> bool {
        matches!(self, Effect::TonePorta(_) | Effect::TonePortaVolSlide(_))
    }

    /// Packed `(code, parameter)` form used by the PMF cell encoding.
    pub fn to_raw(self) -> (u8, u8) {
        match self {
            Effect::None => (0x00, 0),
            Effect::Arpeggio { x, y } => (0x01, pack(x, y)),
            Effect::PortaUp(p) => (0x02, p),
            Effect::PortaDown(p) => (0x03, p),
            Effect::TonePorta(p) => (0x04, p),
            Effect::Vibrato { speed, depth } => (0x05, pack(speed, depth)),
            Effect::TonePortaVolSlide(p) => (0x06, p),
            Effect::VibratoVolSlide(p) => (0x07, p),
            Effect::Tremolo { speed, depth } => (0x08, pack(speed, depth)),
            Effect::SetPan(p) => (0x09, p),
            Effect::SampleOffset(p) => (0x0A, p),
            Effect::VolumeSlide(p) => (0x0B, p),
            Effect::PositionJump(p) => (0x0C, p),
            Effect::SetVolume(p) => (0x0D, p),
            Effect::PatternBreak(p) => (0x0E, p),
            Effect::FinePortaUp(p) => (0x0F, p),
            Effect::FinePortaDown(p) => (0x10, p),
            Effect::SetVibratoWaveform(p) => (0x11, p),
            Effect::SetFinetune(f) => (0x12, f as u8),
            Effect::PatternLoop(p) => (0x13, p),
            Effect::SetTremoloWaveform(p) => (0x14, p),
            Effect::SetPanPosition(p) => (0x15, p),
            Effect::RetriggerNote(p) => (0x16, p),
            Effect::FineVolumeSlideUp(p) => (0x17, p),
            Effect::FineVolumeSlideDown(p) => (0x18, p),
            Effect::NoteCut(p) => (0x19, p),
            Effect::NoteDelay(p) => (0x1A, p),
            Effect::PatternDelay(p) => (0x1B, p),
            Effect::SetSpeed(p) => (0x1C, p),
            Effect::SetTempo(p) => (0x1D, p),
            Effect::SetGlobalVolume(p) => (0x1E, p),
            Effect::GlobalVolumeSlide(p) => (0x1F, p),
            Effect::SetEnvelopePosition(p) => (0x20, p),
            Effect::PanningSlide(p) => (0x21, p),
            Effect::Retrigger { interval, volume_change } => (0x22, pack(volume_change, interval)),
            Effect::Tremor { on, off } => (0x23, pack(on, off)),
            Effect::ExtraFinePortaUp(p) => (0x24, p),
            Effect::ExtraFinePortaDown(p) => (0x25, p),
            Effect::KeyOff(p) => (0x26, p),
            Effect::FineVibrato { speed, depth } => (0x27, pack(speed, depth)),
        }
    }

    /// Inverse of [`Effect::to_raw`]. Returns `None` for unknown codes.
    pub fn from_raw(code: u8, param: u8) -> Option<Self> {
        let (hi, lo) = nibbles(param);
        Some(match code {
            0x00 => Effect::None,
            0x01 => Effect::Arpeggio { x: hi, y: lo },
            0x02 => Effect::PortaUp(param),
            0x03 => Effect::PortaDown(param),
            0x04 => Effect::TonePorta(param),
            0x05 => Effect::Vibrato { speed: hi, depth: lo },
            0x06 => Effect::TonePortaVolSlide(param),
            0x07 => Effect::VibratoVolSlide(param),
            0x08 => Effect::Tremolo { speed: hi, depth: lo },
            0x09 => Effect::SetPan(param),
            0x0A => Effect::SampleOffset(param),
            0x0B => Effect::VolumeSlide(param),
            0x0C => Effect::PositionJump(param),
            0x0D => Effect::SetVolume(param),
            0x0E => Effect::PatternBreak(param),
            0x0F => Effect::FinePortaUp(param),
            0x10 => Effect::FinePortaDown(param),
            0x11 => Effect::SetVibratoWaveform(param),
            0x12 => Effect::SetFinetune(param as i8),
            0x13 => Effect::PatternLoop(param),
            0x14 => Effect::SetTremoloWaveform(param),
            0x15 => Effect::SetPanPosition(param),
            0x16 => Effect::RetriggerNote(param),
            0x17 => Effect::FineVolumeSlideUp(param),
            0x18 => Effect::FineVolumeSlideDown(param),
            0x19 => Effect::NoteCut(param),
            0x1A => Effect::NoteDelay(param),
            0x1B => Effect::PatternDelay(param),
            0x1C => Effect::SetSpeed(param),
            0x1D => Effect::SetTempo(param),
            0x1E => Effect::SetGlobalVolume(param),
            0x1F => Effect::GlobalVolumeSlide(param),
            0x20 => Effect::SetEnvelopePosition(param),
            0x21 => Effect::PanningSlide(param),
            0x22 => Effect::Retrigger { interval: lo, volume_change: hi },
            0x23 => Effect::Tremor { on: hi, off: lo },
            0x24 => Effect::ExtraFinePortaUp(param),
            0x25 => Effect::ExtraFinePortaDown(param),
            0x26 => Effect::KeyOff(param),
            0x27 => Effect::FineVibrato { speed: hi, depth: lo },
            _ => return None,
        })
    }
}
