//! Channel voice state machine.
//!
//! One [`ChannelVoice`] exists per song channel. The sequencer feeds it a cell
//! on the first tick of each row and calls [`ChannelVoice::tick`] on the
//! others; after every tick [`ChannelVoice::resolve`] turns the voice state
//! into the increment and gains the mixer reads.

use pmf_ir::{
    Cell, ChannelSettings, Effect, Instrument, Note, Song, VolumeCommand, CELL_EFFECTS,
    GLOBAL_VOLUME_MAX,
};

use crate::envelope_state::EnvelopeState;
use crate::fault::PlaybackFault;
use crate::frequency::{
    clamp_period, finetune_c4_speed, note_to_period, period_to_increment, shift_period,
    slide_toward,
};
use crate::memory::{EffectMemory, MemorySlot};
use crate::oscillator::{waveform_value, Oscillator, WAVE_RAMP_DOWN, WAVE_SINE, WAVE_SQUARE};

/// Fadeout volume at the start of a note.
pub const FADE_MAX: u32 = 65536;

/// Resolved gains are 12-bit: 4096 is full scale.
pub const GAIN_BITS: u32 = 12;

const VOLUME_MAX: i32 = 64;
const ENVELOPE_CENTER: i32 = 32 << 8;

/// Lifecycle of a voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// No sample playing
    #[default]
    Idle,
    /// Sample playing with the key held
    Sustaining,
    /// Note released; envelopes run past sustain and fadeout is active
    Releasing,
}

/// Song-wide values that effects can change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Globals {
    pub speed: u8,
    pub tempo: u8,
    pub global_volume: u8,
}

impl Globals {
    pub fn from_song(song: &Song) -> Self {
        Self {
            speed: song.initial_speed.max(1),
            tempo: song.initial_tempo.max(MIN_TEMPO),
            global_volume: song.global_volume.min(GLOBAL_VOLUME_MAX),
        }
    }
}

/// Slowest tempo an effect may select.
pub const MIN_TEMPO: u8 = 32;

/// Everything a voice needs while processing one tick.
pub struct TickContext<'a> {
    pub song: &'a Song,
    /// Tick within the current row, counting pattern-delay repeats
    pub tick: u16,
    pub sample_rate: u32,
    /// Frames over which gain changes are ramped
    pub volume_ramp: u16,
    pub globals: &'a mut Globals,
}

/// Live playback state of one channel.
#[derive(Clone, Debug)]
pub struct ChannelVoice {
    pub channel: u8,
    pub state: VoiceState,
    /// Zero-based instrument index
    pub instrument: Option<u8>,
    /// Sample index into the song's sample list
    pub sample: Option<u8>,
    pub note: u8,

    // Sample cursor, advanced by the mixer
    /// Position in frames, 48.16 fixed point
    pub position: u64,
    /// Direction inside a ping-pong loop
    pub forward: bool,
    /// Resolved frames per output frame, 16.16 fixed point
    pub increment: u32,

    // Pitch
    /// Fine period (Amiga period * 4)
    pub period: u32,
    pub target_period: u32,
    pub c4_speed: u32,
    period_offset: i32,

    // Volume and panning
    /// Note volume (0-64)
    pub volume: u8,
    volume_offset: i32,
    /// Channel volume from the song's channel settings (0-64)
    pub channel_volume: u8,
    /// Panning (-64 to +64)
    pub panning: i8,
    fade: u32,
    key_released: bool,
    fading: bool,
    release_seen: bool,
    tremor_muted: bool,

    volume_env: EnvelopeState,
    panning_env: EnvelopeState,

    pub memory: EffectMemory,
    vibrato: Oscillator,
    tremolo: Oscillator,
    auto_vibrato: Oscillator,
    auto_vibrato_ticks: u16,
    tremor_ticks: u8,
    retrigger_ticks: u8,

    // Current row
    row_effects: [Effect; CELL_EFFECTS],
    row_volume: VolumeCommand,
    delayed: Option<(u16, Cell)>,

    // Resolved gains (0..=4096) and the ramp toward them
    pub left_gain: u16,
    pub right_gain: u16,
    ramp_gain: [i32; 2],
    ramp_step: [i32; 2],
    ramp_remaining: u16,
}

impl ChannelVoice {
    /// Create a silent voice for `channel`.
    pub fn new(channel: u8, settings: &ChannelSettings) -> Self {
        Self {
            channel,
            state: VoiceState::Idle,
            instrument: None,
            sample: None,
            note: 0,
            position: 0,
            forward: true,
            increment: 0,
            period: 0,
            target_period: 0,
            c4_speed: 0,
            period_offset: 0,
            volume: 0,
            volume_offset: 0,
            channel_volume: if settings.muted { 0 } else { settings.initial_vol.min(64) },
            panning: settings.initial_pan.clamp(-64, 64),
            fade: FADE_MAX,
            key_released: false,
            fading: false,
            release_seen: false,
            tremor_muted: false,
            volume_env: EnvelopeState::default(),
            panning_env: EnvelopeState::default(),
            memory: EffectMemory::new(),
            vibrato: Oscillator::default(),
            tremolo: Oscillator::default(),
            auto_vibrato: Oscillator::default(),
            auto_vibrato_ticks: 0,
            tremor_ticks: 0,
            retrigger_ticks: 0,
            row_effects: [Effect::None; CELL_EFFECTS],
            row_volume: VolumeCommand::None,
            delayed: None,
            left_gain: 0,
            right_gain: 0,
            ramp_gain: [0; 2],
            ramp_step: [0; 2],
            ramp_remaining: 0,
        }
    }

    /// Return to the power-on state, forgetting effect memory.
    pub fn reset(&mut self, settings: &ChannelSettings) {
        *self = Self::new(self.channel, settings);
    }

    pub fn is_active(&self) -> bool {
        self.state != VoiceState::Idle
    }

    /// Silence immediately and halt the sample cursor.
    pub fn cut(&mut self) {
        self.state = VoiceState::Idle;
        self.increment = 0;
        self.left_gain = 0;
        self.right_gain = 0;
        self.ramp_gain = [0; 2];
        self.ramp_remaining = 0;
        self.delayed = None;
    }

    /// Key off: leave sustain and start fadeout.
    pub fn release(&mut self) {
        if self.state == VoiceState::Sustaining {
            self.state = VoiceState::Releasing;
        }
        if !self.fading {
            self.release_seen = false;
        }
        self.key_released = true;
        self.fading = true;
    }

    /// Start fadeout without releasing envelope sustain.
    pub fn fade_out(&mut self) {
        if self.state == VoiceState::Sustaining {
            self.state = VoiceState::Releasing;
        }
        if !self.fading {
            self.release_seen = false;
        }
        self.fading = true;
    }

    /// Process the cell on the first tick of a row.
    pub fn row(&mut self, cell: &Cell, ctx: &mut TickContext) -> Result<(), PlaybackFault> {
        self.delayed = None;
        let delay = cell.effects.iter().find_map(|e| match *e {
            Effect::NoteDelay(d) if d > 0 => Some(d),
            _ => None,
        });
        if let Some(d) = delay {
            self.row_effects = [Effect::None; CELL_EFFECTS];
            self.row_volume = VolumeCommand::None;
            self.period_offset = 0;
            self.volume_offset = 0;
            self.delayed = Some((d as u16, *cell));
            return Ok(());
        }
        self.apply_row(cell, ctx)
    }

    /// Process a tick after the first one of the row.
    pub fn tick(&mut self, ctx: &mut TickContext) -> Result<(), PlaybackFault> {
        if let Some((at, cell)) = self.delayed {
            if ctx.tick == at {
                self.delayed = None;
                return self.apply_row(&cell, ctx);
            }
        }
        self.tick_volume_column();
        for i in 0..CELL_EFFECTS {
            let effect = self.row_effects[i];
            self.tick_effect(effect, ctx);
        }
        Ok(())
    }

    fn apply_row(&mut self, cell: &Cell, ctx: &mut TickContext) -> Result<(), PlaybackFault> {
        self.row_volume = self.memory.resolve_volume(cell.volume);
        for (slot, effect) in self.row_effects.iter_mut().zip(cell.effects.iter()) {
            *slot = self.memory.resolve(*effect);
        }
        self.period_offset = 0;
        self.volume_offset = 0;
        self.tremor_muted = false;

        if cell.instrument != 0 {
            let index = cell.instrument - 1;
            if ctx.song.instruments.get(index as usize).is_none() {
                self.cut();
                return Err(PlaybackFault::MissingInstrument {
                    channel: self.channel,
                    instrument: index,
                });
            }
            self.instrument = Some(index);
        }

        let porta = self.row_effects.iter().any(Effect::is_tone_porta)
            || matches!(self.row_volume, VolumeCommand::TonePorta(_));
        let mut triggered = false;
        match cell.note {
            Note::On(n) if porta && self.is_active() => {
                self.target_period = note_to_period(n);
            }
            Note::On(n) => {
                triggered = self.trigger(n, cell.instrument != 0, ctx.song)?;
            }
            Note::Off => self.release(),
            Note::Fade => self.fade_out(),
            Note::Cut => self.cut(),
            Note::None => {}
        }

        // An instrument without a fresh trigger restores the sample volume
        if cell.instrument != 0 && !triggered {
            if let Some(sample) = self.sample.and_then(|s| ctx.song.samples.get(s as usize)) {
                self.volume = sample.default_volume.min(64);
            }
        }

        self.row_volume_column();
        for i in 0..CELL_EFFECTS {
            let effect = self.row_effects[i];
            self.row_effect(effect, triggered, ctx);
        }
        Ok(())
    }

    /// Start a note. Returns whether a sample was triggered.
    fn trigger(&mut self, note: u8, with_instrument: bool, song: &Song) -> Result<bool, PlaybackFault> {
        let Some(inst_index) = self.instrument else {
            return Ok(false);
        };
        let Some(inst) = song.instruments.get(inst_index as usize) else {
            self.cut();
            return Err(PlaybackFault::MissingInstrument {
                channel: self.channel,
                instrument: inst_index,
            });
        };
        let Some(sample_index) = inst.sample_for(note) else {
            self.cut();
            return Ok(false);
        };
        let Some(sample) = song.samples.get(sample_index as usize) else {
            self.cut();
            return Err(PlaybackFault::MissingSample {
                channel: self.channel,
                sample: sample_index,
            });
        };
        if sample.is_empty() {
            self.cut();
            return Ok(false);
        }

        if self.state == VoiceState::Idle {
            self.ramp_gain = [0; 2];
            self.ramp_remaining = 0;
        }
        self.note = note;
        self.sample = Some(sample_index);
        self.c4_speed = sample.c4_speed;
        self.period = note_to_period(note);
        self.target_period = self.period;
        self.position = 0;
        self.forward = true;
        if with_instrument {
            self.volume = sample.default_volume.min(64);
            if let Some(pan) = sample.default_pan {
                self.panning = pan.clamp(-64, 64);
            }
        }

        self.state = VoiceState::Sustaining;
        self.fade = FADE_MAX;
        self.key_released = false;
        self.fading = false;
        self.release_seen = false;
        self.reset_envelopes(inst);
        self.vibrato.retrigger();
        self.tremolo.retrigger();
        self.auto_vibrato = Oscillator { phase: 0, waveform: inst.vibrato.waveform };
        self.auto_vibrato_ticks = 0;
        self.tremor_ticks = 0;
        self.retrigger_ticks = 0;
        Ok(true)
    }

    fn reset_envelopes(&mut self, inst: &Instrument) {
        self.volume_env = inst
            .volume_envelope
            .as_ref()
            .map_or_else(EnvelopeState::default, EnvelopeState::new);
        self.panning_env = inst
            .panning_envelope
            .as_ref()
            .map_or_else(EnvelopeState::default, EnvelopeState::new);
    }

    /// Restart the current sample from its first frame.
    fn restart_sample(&mut self) {
        if self.sample.is_some() {
            self.position = 0;
            self.forward = true;
            if self.state == VoiceState::Idle {
                self.state = VoiceState::Sustaining;
            }
        }
    }

    fn slide_volume(&mut self, delta: i32) {
        self.volume = (self.volume as i32 + delta).clamp(0, VOLUME_MAX) as u8;
    }

    fn slide_pan(&mut self, delta: i32) {
        self.panning = (self.panning as i32 + delta).clamp(-64, 64) as i8;
    }

    fn slide_period(&mut self, delta: i32) {
        if self.period > 0 {
            self.period = clamp_period(self.period as i32 + delta);
        }
    }

    fn tone_porta(&mut self, speed: u8) {
        if self.period > 0 && self.target_period > 0 {
            self.period = slide_toward(self.period, self.target_period, speed as u32 * 4);
        }
    }

    /// `divisor` 32 for regular vibrato, 128 for fine vibrato.
    fn apply_vibrato(&mut self, speed: u8, depth: u8, divisor: i32) {
        self.period_offset = self.vibrato.value() * depth as i32 / divisor;
        self.vibrato.step(speed);
    }

    fn volume_slide(&mut self, param: u8) {
        let (up, down) = (param >> 4, param & 0x0F);
        if is_fine_slide(param) {
            return;
        }
        if up > 0 {
            self.slide_volume(up as i32);
        } else {
            self.slide_volume(-(down as i32));
        }
    }

    fn row_volume_column(&mut self) {
        match self.row_volume {
            VolumeCommand::Volume(v) => self.volume = v.min(64),
            VolumeCommand::Panning(p) => self.panning = (p.min(64) as i32 * 2 - 64) as i8,
            VolumeCommand::FineVolSlideUp(v) => self.slide_volume(v as i32),
            VolumeCommand::FineVolSlideDown(v) => self.slide_volume(-(v as i32)),
            _ => {}
        }
    }

    fn tick_volume_column(&mut self) {
        match self.row_volume {
            VolumeCommand::VolumeSlideUp(v) => self.slide_volume(v as i32),
            VolumeCommand::VolumeSlideDown(v) => self.slide_volume(-(v as i32)),
            VolumeCommand::PortaUp(p) => self.slide_period(-(p as i32) * 4),
            VolumeCommand::PortaDown(p) => self.slide_period(p as i32 * 4),
            VolumeCommand::TonePorta(p) => self.tone_porta(p),
            VolumeCommand::Vibrato(depth) => {
                let speed = self.memory.get(MemorySlot::VibratoSpeed);
                self.apply_vibrato(speed, depth, 32);
            }
            VolumeCommand::PanSlideLeft(v) => self.slide_pan(-(v as i32)),
            VolumeCommand::PanSlideRight(v) => self.slide_pan(v as i32),
            _ => {}
        }
    }

    fn row_effect(&mut self, effect: Effect, triggered: bool, ctx: &mut TickContext) {
        match effect {
            Effect::SetVolume(v) => self.volume = v.min(64),
            Effect::SetPan(p) => self.panning = (p as i32 * 128 / 255 - 64) as i8,
            Effect::SetPanPosition(p) => self.panning = (p.min(15) as i32 * 128 / 15 - 64) as i8,
            Effect::SampleOffset(o) if triggered => self.apply_sample_offset(o, ctx.song),
            Effect::VolumeSlide(p) if is_fine_slide(p) => {
                let (up, down) = (p >> 4, p & 0x0F);
                if down == 0x0F {
                    self.slide_volume(up as i32);
                } else {
                    self.slide_volume(-(down as i32));
                }
            }
            Effect::FineVolumeSlideUp(v) => self.slide_volume(v as i32),
            Effect::FineVolumeSlideDown(v) => self.slide_volume(-(v as i32)),
            Effect::FinePortaUp(p) => self.slide_period(-(p as i32) * 4),
            Effect::FinePortaDown(p) => self.slide_period(p as i32 * 4),
            Effect::ExtraFinePortaUp(p) => self.slide_period(-(p as i32)),
            Effect::ExtraFinePortaDown(p) => self.slide_period(p as i32),
            Effect::SetVibratoWaveform(w) => self.vibrato.waveform = w & 0x07,
            Effect::SetTremoloWaveform(w) => self.tremolo.waveform = w & 0x07,
            Effect::SetFinetune(f) => self.c4_speed = finetune_c4_speed(f),
            Effect::NoteCut(0) => self.cut(),
            Effect::KeyOff(0) => self.release(),
            Effect::SetEnvelopePosition(t) => {
                if let Some(inst) = self.instrument.and_then(|i| ctx.song.instruments.get(i as usize)) {
                    if let Some(env) = &inst.volume_envelope {
                        self.volume_env.set_position(env, t as u16);
                    }
                    if let Some(env) = &inst.panning_envelope {
                        self.panning_env.set_position(env, t as u16);
                    }
                }
            }
            Effect::SetSpeed(s) if s > 0 => ctx.globals.speed = s,
            Effect::SetTempo(t) if t > 0 => ctx.globals.tempo = t.max(MIN_TEMPO),
            Effect::SetGlobalVolume(v) => ctx.globals.global_volume = v.min(GLOBAL_VOLUME_MAX),
            _ => {}
        }
    }

    fn apply_sample_offset(&mut self, offset: u8, song: &Song) {
        let Some(sample) = self.sample.and_then(|s| song.samples.get(s as usize)) else {
            return;
        };
        let frame = offset as u64 * 256;
        if frame < sample.len() as u64 {
            self.position = frame << 16;
        } else if sample.has_loop() {
            self.position = (sample.loop_start as u64) << 16;
        } else {
            self.cut();
        }
    }

    fn tick_effect(&mut self, effect: Effect, ctx: &mut TickContext) {
        let tick = ctx.tick;
        match effect {
            Effect::Arpeggio { x, y } if x > 0 || y > 0 => {
                let semitones = match tick % 3 {
                    0 => 0,
                    1 => x,
                    _ => y,
                };
                self.period_offset = shift_period(self.period, semitones) as i32 - self.period as i32;
            }
            Effect::PortaUp(p) => self.slide_period(-(p as i32) * 4),
            Effect::PortaDown(p) => self.slide_period(p as i32 * 4),
            Effect::TonePorta(p) => self.tone_porta(p),
            Effect::Vibrato { speed, depth } => self.apply_vibrato(speed, depth, 32),
            Effect::FineVibrato { speed, depth } => self.apply_vibrato(speed, depth, 128),
            Effect::TonePortaVolSlide(v) => {
                self.tone_porta(self.memory.get(MemorySlot::TonePorta));
                self.volume_slide(v);
            }
            Effect::VibratoVolSlide(v) => {
                let speed = self.memory.get(MemorySlot::VibratoSpeed);
                let depth = self.memory.get(MemorySlot::VibratoDepth);
                self.apply_vibrato(speed, depth, 32);
                self.volume_slide(v);
            }
            Effect::Tremolo { speed, depth } => {
                self.volume_offset = self.tremolo.value() * depth as i32 / 64;
                self.tremolo.step(speed);
            }
            Effect::VolumeSlide(v) => self.volume_slide(v),
            Effect::RetriggerNote(x) if x > 0 && tick % x as u16 == 0 => self.restart_sample(),
            Effect::Retrigger { interval, volume_change } if interval > 0 => {
                self.retrigger_ticks += 1;
                if self.retrigger_ticks >= interval {
                    self.retrigger_ticks = 0;
                    self.volume = retrigger_volume(self.volume, volume_change);
                    self.restart_sample();
                }
            }
            Effect::NoteCut(t) if tick == t as u16 => self.cut(),
            Effect::KeyOff(t) if tick == t as u16 => self.release(),
            Effect::Tremor { on, off } if on | off != 0 => {
                let on = on as u16 + 1;
                let cycle = on + off as u16 + 1;
                self.tremor_ticks = self.tremor_ticks.wrapping_add(1);
                self.tremor_muted = self.tremor_ticks as u16 % cycle >= on;
            }
            Effect::PanningSlide(p) => {
                let (right, left) = (p >> 4, p & 0x0F);
                if right > 0 {
                    self.slide_pan(right as i32);
                } else {
                    self.slide_pan(-(left as i32));
                }
            }
            Effect::GlobalVolumeSlide(p) => {
                let (up, down) = ((p >> 4) as i32, (p & 0x0F) as i32);
                let delta = if up > 0 { up } else { -down };
                let gv = ctx.globals.global_volume as i32 + delta;
                ctx.globals.global_volume = gv.clamp(0, GLOBAL_VOLUME_MAX as i32) as u8;
            }
            _ => {}
        }
    }

    /// Advance envelopes, fadeout and auto-vibrato, then compute the
    /// increment and gains used by the mixer for the coming tick.
    pub fn resolve(&mut self, ctx: &TickContext) {
        if self.state == VoiceState::Idle {
            return;
        }
        let inst = self
            .instrument
            .and_then(|i| ctx.song.instruments.get(i as usize));
        let volume_envelope = inst.and_then(|i| i.volume_envelope.as_ref());

        let key_held = !self.key_released;
        let env_volume = match volume_envelope {
            Some(env) => {
                self.volume_env.advance(env, key_held);
                self.volume_env.value() as u32
            }
            None => (64 << 8) as u32,
        };
        let env_pan = match inst.and_then(|i| i.panning_envelope.as_ref()) {
            Some(env) => {
                self.panning_env.advance(env, key_held);
                self.panning_env.value() as i32
            }
            None => ENVELOPE_CENTER,
        };

        if self.fading {
            if !self.release_seen {
                self.release_seen = true;
            } else {
                let fadeout = inst.map_or(0, |i| i.fadeout as u32);
                if fadeout == 0 {
                    if volume_envelope.is_none() {
                        self.cut();
                        return;
                    }
                } else {
                    self.fade = self.fade.saturating_sub(fadeout);
                    if self.fade == 0 {
                        self.cut();
                        return;
                    }
                }
            }
        }
        if self.state == VoiceState::Releasing && self.volume_env.is_finished() && env_volume == 0 {
            self.cut();
            return;
        }

        // (0..=64) * (0..=16384) keeps every stage within 2^20
        let volume = if self.tremor_muted {
            0
        } else {
            (self.volume as i32 + self.volume_offset).clamp(0, VOLUME_MAX) as u32
        };
        let mut level = volume * env_volume;
        level = ((level as u64 * self.fade as u64) >> 16) as u32;
        level = (level * self.channel_volume as u32) >> 6;
        let gain = level >> 8;

        let pan = self.panning as i32;
        let pan = pan + (env_pan - ENVELOPE_CENTER) * (64 - pan.abs()) / ENVELOPE_CENTER;
        let pan_right = (pan.clamp(-64, 64) + 64) as u32; // 0..128
        let left = (gain * (128 - pan_right)) >> 7;
        let right = (gain * pan_right) >> 7;
        self.set_gains(left as u16, right as u16, ctx.volume_ramp);

        let mut period = self.period as i32 + self.period_offset;
        if let Some(inst) = inst {
            period += self.auto_vibrato_delta(inst);
        }
        self.increment = period_to_increment(clamp_period(period), self.c4_speed, ctx.sample_rate);
    }

    fn auto_vibrato_delta(&mut self, inst: &Instrument) -> i32 {
        let vib = inst.vibrato;
        if vib.depth == 0 {
            return 0;
        }
        let mut depth = vib.depth as i32;
        if vib.sweep > 0 && self.auto_vibrato_ticks < vib.sweep as u16 {
            depth = depth * self.auto_vibrato_ticks as i32 / vib.sweep as i32;
            self.auto_vibrato_ticks += 1;
        }
        let phase = self.auto_vibrato.phase;
        let wave = match self.auto_vibrato.waveform & 0x03 {
            0 => waveform_value(WAVE_SINE, phase),
            1 => waveform_value(WAVE_SQUARE, phase),
            2 => waveform_value(WAVE_RAMP_DOWN, phase),
            _ => -waveform_value(WAVE_RAMP_DOWN, phase),
        };
        self.auto_vibrato.phase = phase.wrapping_add(vib.rate);
        wave * depth / 64
    }

    pub(crate) fn set_gains(&mut self, left: u16, right: u16, ramp: u16) {
        self.left_gain = left;
        self.right_gain = right;
        let target = [(left as i32) << 16, (right as i32) << 16];
        if ramp == 0 || target == self.ramp_gain {
            self.ramp_gain = target;
            self.ramp_remaining = 0;
            return;
        }
        for i in 0..2 {
            self.ramp_step[i] = (target[i] - self.ramp_gain[i]) / ramp as i32;
        }
        self.ramp_remaining = ramp;
    }

    /// Gains for the next output frame (0..=4096), stepping any active ramp.
    #[inline]
    pub fn next_gains(&mut self) -> (i32, i32) {
        if self.ramp_remaining > 0 {
            self.ramp_remaining -= 1;
            if self.ramp_remaining == 0 {
                self.ramp_gain = [(self.left_gain as i32) << 16, (self.right_gain as i32) << 16];
            } else {
                self.ramp_gain[0] += self.ramp_step[0];
                self.ramp_gain[1] += self.ramp_step[1];
            }
        }
        (self.ramp_gain[0] >> 16, self.ramp_gain[1] >> 16)
    }
}

/// `xF` (fine up) and `Fy` (fine down) volume slide forms apply on the first tick only.
fn is_fine_slide(param: u8) -> bool {
    let (up, down) = (param >> 4, param & 0x0F);
    (down == 0x0F && up > 0) || (up == 0x0F && down > 0)
}

fn retrigger_volume(volume: u8, change: u8) -> u8 {
    let v = volume as i32;
    let v = match change {
        1 => v - 1,
        2 => v - 2,
        3 => v - 4,
        4 => v - 8,
        5 => v - 16,
        6 => v * 2 / 3,
        7 => v / 2,
        9 => v + 1,
        0xA => v + 2,
        0xB => v + 4,
        0xC => v + 8,
        0xD => v + 16,
        0xE => v * 3 / 2,
        0xF => v * 2,
        _ => v,
    };
    v.clamp(0, VOLUME_MAX) as u8
}
