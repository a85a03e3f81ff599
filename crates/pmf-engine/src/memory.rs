//! Per-channel effect parameter memory.
//!
//! Effects that support "reuse the last nonzero parameter" each own a slot.
//! [`EffectMemory::resolve`] substitutes remembered parameters into an effect
//! before the voice interprets it, so the voice itself never sees a zero
//! parameter that should have been recalled.

use pmf_ir::{Effect, VolumeCommand};

/// One remembered parameter per effect type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MemorySlot {
    PortaUp,
    PortaDown,
    TonePorta,
    VibratoSpeed,
    VibratoDepth,
    TremoloSpeed,
    TremoloDepth,
    VolumeSlide,
    FineVolumeSlideUp,
    FineVolumeSlideDown,
    FinePortaUp,
    FinePortaDown,
    ExtraFinePortaUp,
    ExtraFinePortaDown,
    SampleOffset,
    Retrigger,
    Tremor,
    PanningSlide,
    GlobalVolumeSlide,
}

impl MemorySlot {
    pub const COUNT: usize = MemorySlot::GlobalVolumeSlide as usize + 1;
}

/// Effect memory for one channel, keyed by [`MemorySlot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EffectMemory {
    slots: [u8; MemorySlot::COUNT],
}

impl Default for EffectMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectMemory {
    pub const fn new() -> Self {
        Self { slots: [0; MemorySlot::COUNT] }
    }

    /// Forget everything (playback start).
    pub fn clear(&mut self) {
        self.slots = [0; MemorySlot::COUNT];
    }

    /// Last nonzero parameter stored in `slot`, or 0.
    pub fn get(&self, slot: MemorySlot) -> u8 {
        self.slots[slot as usize]
    }

    /// Store a nonzero `param` and return it, or return the remembered value for zero.
    pub fn recall(&mut self, slot: MemorySlot, param: u8) -> u8 {
        let stored = &mut self.slots[slot as usize];
        if param != 0 {
            *stored = param;
        }
        *stored
    }

    fn recall_nibbles(&mut self, hi_slot: MemorySlot, lo_slot: MemorySlot, hi: u8, lo: u8) -> (u8, u8) {
        (self.recall(hi_slot, hi), self.recall(lo_slot, lo))
    }

    fn recall_packed(&mut self, slot: MemorySlot, hi: u8, lo: u8) -> (u8, u8) {
        let packed = self.recall(slot, (hi << 4) | (lo & 0x0F));
        (packed >> 4, packed & 0x0F)
    }

    /// Replace zero parameters in `effect` with the remembered ones.
    pub fn resolve(&mut self, effect: Effect) -> Effect {
        use MemorySlot as S;
        match effect {
            Effect::PortaUp(p) => Effect::PortaUp(self.recall(S::PortaUp, p)),
            Effect::PortaDown(p) => Effect::PortaDown(self.recall(S::PortaDown, p)),
            Effect::TonePorta(p) => Effect::TonePorta(self.recall(S::TonePorta, p)),
            Effect::Vibrato { speed, depth } => {
                let (speed, depth) = self.recall_nibbles(S::VibratoSpeed, S::VibratoDepth, speed, depth);
                Effect::Vibrato { speed, depth }
            }
            Effect::FineVibrato { speed, depth } => {
                let (speed, depth) = self.recall_nibbles(S::VibratoSpeed, S::VibratoDepth, speed, depth);
                Effect::FineVibrato { speed, depth }
            }
            Effect::Tremolo { speed, depth } => {
                let (speed, depth) = self.recall_nibbles(S::TremoloSpeed, S::TremoloDepth, speed, depth);
                Effect::Tremolo { speed, depth }
            }
            Effect::VolumeSlide(p) => Effect::VolumeSlide(self.recall(S::VolumeSlide, p)),
            Effect::TonePortaVolSlide(p) => Effect::TonePortaVolSlide(self.recall(S::VolumeSlide, p)),
            Effect::VibratoVolSlide(p) => Effect::VibratoVolSlide(self.recall(S::VolumeSlide, p)),
            Effect::FineVolumeSlideUp(p) => Effect::FineVolumeSlideUp(self.recall(S::FineVolumeSlideUp, p)),
            Effect::FineVolumeSlideDown(p) => {
                Effect::FineVolumeSlideDown(self.recall(S::FineVolumeSlideDown, p))
            }
            Effect::FinePortaUp(p) => Effect::FinePortaUp(self.recall(S::FinePortaUp, p)),
            Effect::FinePortaDown(p) => Effect::FinePortaDown(self.recall(S::FinePortaDown, p)),
            Effect::ExtraFinePortaUp(p) => Effect::ExtraFinePortaUp(self.recall(S::ExtraFinePortaUp, p)),
            Effect::ExtraFinePortaDown(p) => {
                Effect::ExtraFinePortaDown(self.recall(S::ExtraFinePortaDown, p))
            }
            Effect::SampleOffset(p) => Effect::SampleOffset(self.recall(S::SampleOffset, p)),
            Effect::Retrigger { interval, volume_change } => {
                let (volume_change, interval) = self.recall_packed(S::Retrigger, volume_change, interval);
                Effect::Retrigger { interval, volume_change }
            }
            Effect::Tremor { on, off } => {
                let (on, off) = self.recall_packed(S::Tremor, on, off);
                Effect::Tremor { on, off }
            }
            Effect::PanningSlide(p) => Effect::PanningSlide(self.recall(S::PanningSlide, p)),
            Effect::GlobalVolumeSlide(p) => Effect::GlobalVolumeSlide(self.recall(S::GlobalVolumeSlide, p)),
            other => other,
        }
    }

    /// Volume-column commands that share memory with effect-column slots.
    pub fn resolve_volume(&mut self, cmd: VolumeCommand) -> VolumeCommand {
        use MemorySlot as S;
        match cmd {
            VolumeCommand::TonePorta(p) => VolumeCommand::TonePorta(self.recall(S::TonePorta, p)),
            VolumeCommand::Vibrato(d) => VolumeCommand::Vibrato(self.recall(S::VibratoDepth, d)),
            VolumeCommand::VibratoSpeed(s) => VolumeCommand::VibratoSpeed(self.recall(S::VibratoSpeed, s)),
            VolumeCommand::PortaUp(p) => VolumeCommand::PortaUp(self.recall(S::PortaUp, p)),
            VolumeCommand::PortaDown(p) => VolumeCommand::PortaDown(self.recall(S::PortaDown, p)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_reuses_last_nonzero() {
        let mut mem = EffectMemory::new();
        assert_eq!(mem.resolve(Effect::PortaUp(5)), Effect::PortaUp(5));
        assert_eq!(mem.resolve(Effect::PortaUp(0)), Effect::PortaUp(5));
        assert_eq!(mem.resolve(Effect::PortaUp(2)), Effect::PortaUp(2));
        assert_eq!(mem.resolve(Effect::PortaUp(0)), Effect::PortaUp(2));
    }

    #[test]
    fn first_zero_without_memory_stays_zero() {
        let mut mem = EffectMemory::new();
        assert_eq!(mem.resolve(Effect::VolumeSlide(0)), Effect::VolumeSlide(0));
        assert_eq!(mem.resolve(Effect::SampleOffset(0)), Effect::SampleOffset(0));
    }

    #[test]
    fn slots_are_per_effect_type() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::PortaUp(7));
        assert_eq!(mem.resolve(Effect::PortaDown(0)), Effect::PortaDown(0));
        assert_eq!(mem.get(MemorySlot::PortaUp), 7);
    }

    #[test]
    fn vibrato_nibbles_recall_independently() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::Vibrato { speed: 4, depth: 8 });
        assert_eq!(
            mem.resolve(Effect::Vibrato { speed: 0, depth: 3 }),
            Effect::Vibrato { speed: 4, depth: 3 }
        );
        assert_eq!(
            mem.resolve(Effect::FineVibrato { speed: 6, depth: 0 }),
            Effect::FineVibrato { speed: 6, depth: 3 }
        );
    }

    #[test]
    fn combined_slides_share_volume_slide_memory() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::VolumeSlide(0x20));
        assert_eq!(mem.resolve(Effect::TonePortaVolSlide(0)), Effect::TonePortaVolSlide(0x20));
        assert_eq!(mem.resolve(Effect::VibratoVolSlide(0)), Effect::VibratoVolSlide(0x20));
    }

    #[test]
    fn volume_column_shares_tone_porta_slot() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::TonePorta(0x30));
        assert_eq!(mem.resolve_volume(VolumeCommand::TonePorta(0)), VolumeCommand::TonePorta(0x30));
    }

    #[test]
    fn retrigger_recalls_whole_parameter() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::Retrigger { interval: 3, volume_change: 2 });
        assert_eq!(
            mem.resolve(Effect::Retrigger { interval: 0, volume_change: 0 }),
            Effect::Retrigger { interval: 3, volume_change: 2 }
        );
    }

    #[test]
    fn clear_forgets_everything() {
        let mut mem = EffectMemory::new();
        mem.resolve(Effect::Tremor { on: 2, off: 3 });
        mem.clear();
        assert_eq!(mem.get(MemorySlot::Tremor), 0);
    }
}
