//! Row/tick sequencer.
//!
//! Owns the playback cursor. [`Sequencer::advance`] hands out spans of frames
//! that can be rendered without crossing a tick boundary, running the tick
//! processing (cells, effects, flow control) whenever a boundary is reached.

use alloc::boxed::Box;
use alloc::vec;

use pmf_ir::{Effect, OrderEntry, Pattern, Song};

use crate::fault::{FaultLog, PlaybackFault};
use crate::voice::{ChannelVoice, Globals, TickContext};

/// Position in the song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub order: u16,
    pub row: u16,
    /// Tick within the row
    pub tick: u16,
}

/// The sequencer's view of time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    pub position: Position,
    /// Frames left before the next tick boundary
    pub frames_left: u32,
    /// Sub-frame remainder carried between ticks (16-bit fraction)
    pub frac: u32,
}

/// Pending order/row change, applied when the current row ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Jump {
    /// `None` means the order after the current one
    order: Option<u16>,
    row: u16,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct LoopState {
    start: u16,
    count: u8,
}

/// Drives voices through the song's orders, rows and ticks.
#[derive(Clone, Debug)]
pub struct Sequencer {
    cursor: PlaybackCursor,
    globals: Globals,
    sample_rate: u32,
    volume_ramp: u16,
    pattern_delay: u8,
    jump: Option<Jump>,
    loop_row: Option<u16>,
    loops: Box<[LoopState]>,
    finished: bool,
}

impl Sequencer {
    pub fn new(song: &Song, sample_rate: u32, volume_ramp: u16) -> Self {
        let mut seq = Self {
            cursor: PlaybackCursor::default(),
            globals: Globals::from_song(song),
            sample_rate,
            volume_ramp,
            pattern_delay: 0,
            jump: None,
            loop_row: None,
            loops: vec![LoopState::default(); song.channels.len()].into_boxed_slice(),
            finished: false,
        };
        seq.reset(song);
        seq
    }

    /// Back to the top of the song with the song's initial globals.
    pub fn reset(&mut self, song: &Song) {
        self.globals = Globals::from_song(song);
        self.cursor = PlaybackCursor::default();
        self.pattern_delay = 0;
        self.jump = None;
        self.loop_row = None;
        self.finished = false;
        self.enter_order(song, 0, 0);
    }

    /// Move to `order`/`row`. The next tick processed is tick 0 of that row.
    pub fn seek(&mut self, song: &Song, order: u16, row: u16) {
        self.cursor.frames_left = 0;
        self.cursor.frac = 0;
        self.cursor.position.tick = 0;
        self.pattern_delay = 0;
        self.jump = None;
        self.loop_row = None;
        self.finished = false;
        self.enter_order(song, order as usize, row);
    }

    pub fn position(&self) -> Position {
        self.cursor.position
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    /// Whether the order list has run out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Process tick boundaries as needed and return how many frames (at most
    /// `max_frames`) can be rendered before the next one. Returns 0 once the
    /// song has finished.
    pub fn advance(
        &mut self,
        song: &Song,
        voices: &mut [ChannelVoice],
        faults: &mut FaultLog,
        max_frames: u32,
    ) -> u32 {
        while self.cursor.frames_left == 0 {
            if self.finished {
                return 0;
            }
            self.process_tick(song, voices, faults);
        }
        let frames = self.cursor.frames_left.min(max_frames);
        self.cursor.frames_left -= frames;
        frames
    }

    fn process_tick(&mut self, song: &Song, voices: &mut [ChannelVoice], faults: &mut FaultLog) {
        let tick = self.cursor.position.tick;
        if tick == 0 {
            self.start_row(song, voices, faults);
            if self.finished {
                return;
            }
        } else {
            let mut ctx = TickContext {
                song,
                tick,
                sample_rate: self.sample_rate,
                volume_ramp: self.volume_ramp,
                globals: &mut self.globals,
            };
            for voice in voices.iter_mut() {
                if let Err(fault) = voice.tick(&mut ctx) {
                    faults.record(fault);
                }
            }
        }

        let ctx = TickContext {
            song,
            tick,
            sample_rate: self.sample_rate,
            volume_ramp: self.volume_ramp,
            globals: &mut self.globals,
        };
        for voice in voices.iter_mut() {
            voice.resolve(&ctx);
        }

        // sample_rate * 5 / (tempo * 2) frames, 16.16
        let step = ((self.sample_rate as u64 * 5) << 16) / (self.globals.tempo as u64 * 2);
        let total = step + self.cursor.frac as u64;
        self.cursor.frames_left = (total >> 16) as u32;
        self.cursor.frac = (total & 0xFFFF) as u32;

        self.cursor.position.tick += 1;
        let row_ticks = self.globals.speed as u16 * (1 + self.pattern_delay as u16);
        if self.cursor.position.tick >= row_ticks {
            self.next_row(song);
        }
    }

    /// Hand the row's cells to the voices and collect flow effects.
    fn start_row(&mut self, song: &Song, voices: &mut [ChannelVoice], faults: &mut FaultLog) {
        // Orders naming a missing pattern are skipped, each skip reported once
        let mut attempts = song.order.len() + 1;
        let pattern = loop {
            if let Some(pattern) = self.current_pattern(song) {
                break pattern;
            }
            faults.record(PlaybackFault::MissingPattern {
                order: self.cursor.position.order,
            });
            attempts -= 1;
            if attempts == 0 {
                self.finished = true;
                return;
            }
            self.enter_order(song, self.cursor.position.order as usize + 1, 0);
            if self.finished {
                return;
            }
        };

        let row = self.cursor.position.row;
        let Some(cells) = pattern.row(row) else {
            return;
        };
        let mut ctx = TickContext {
            song,
            tick: 0,
            sample_rate: self.sample_rate,
            volume_ramp: self.volume_ramp,
            globals: &mut self.globals,
        };
        for (channel, (voice, cell)) in voices.iter_mut().zip(cells).enumerate() {
            if let Err(fault) = voice.row(cell, &mut ctx) {
                faults.record(fault);
            }
            for effect in cell.active_effects() {
                match *effect {
                    Effect::PositionJump(order) => {
                        self.jump.get_or_insert(Jump { order: None, row: 0 }).order =
                            Some(order as u16);
                    }
                    Effect::PatternBreak(target) => {
                        self.jump.get_or_insert(Jump { order: None, row: 0 }).row = target as u16;
                    }
                    Effect::PatternLoop(0) => {
                        if let Some(state) = self.loops.get_mut(channel) {
                            state.start = row;
                        }
                    }
                    Effect::PatternLoop(count) => {
                        if let Some(state) = self.loops.get_mut(channel) {
                            if state.count == 0 {
                                state.count = count;
                                self.loop_row = Some(state.start);
                            } else {
                                state.count -= 1;
                                if state.count > 0 {
                                    self.loop_row = Some(state.start);
                                }
                            }
                        }
                    }
                    Effect::PatternDelay(ticks) if self.pattern_delay == 0 => {
                        self.pattern_delay = ticks;
                    }
                    _ => {}
                }
            }
        }
    }

    fn next_row(&mut self, song: &Song) {
        self.cursor.position.tick = 0;
        self.pattern_delay = 0;

        if let Some(row) = self.loop_row.take() {
            self.jump = None;
            self.cursor.position.row = row;
            return;
        }
        if let Some(jump) = self.jump.take() {
            let order = jump
                .order
                .map_or(self.cursor.position.order as usize + 1, usize::from);
            self.enter_order(song, order, jump.row);
            return;
        }

        let rows = self.current_pattern(song).map_or(0, |p| p.rows);
        self.cursor.position.row += 1;
        if self.cursor.position.row >= rows {
            self.enter_order(song, self.cursor.position.order as usize + 1, 0);
        }
    }

    /// Move to the first playable order at or after `from`, wrapping to the
    /// restart order at the end of the list. The row is clamped to the
    /// pattern's last row.
    fn enter_order(&mut self, song: &Song, from: usize, row: u16) {
        let target = song.next_playable_order(from).or_else(|| {
            song.restart
                .and_then(|restart| song.next_playable_order(restart as usize))
        });
        let Some(order) = target else {
            self.finished = true;
            return;
        };

        self.loops.fill(LoopState::default());
        self.cursor.position.order = order as u16;
        self.cursor.position.tick = 0;
        let rows = self.current_pattern(song).map_or(1, |p| p.rows);
        self.cursor.position.row = row.min(rows.saturating_sub(1));
    }

    fn current_pattern<'s>(&self, song: &'s Song) -> Option<&'s Pattern> {
        match song.order.get(self.cursor.position.order as usize)? {
            OrderEntry::Pattern(index) => song.patterns.get(*index as usize),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmf_ir::{Cell, Instrument, Note, Sample, SampleData};

    const RATE: u32 = 44100;

    /// `orders` lists pattern indices; each pattern has `rows` rows on one channel.
    fn song(patterns: usize, rows: u16, orders: &[u8]) -> Song {
        let mut song = Song::with_channels("seq", 1);
        for _ in 0..patterns {
            song.add_pattern(rows);
        }
        song.order = orders.iter().map(|&p| OrderEntry::Pattern(p)).collect();
        let mut sample = Sample::new("s");
        sample.data = SampleData::Mono8(vec![0; 16]);
        song.samples.push(sample);
        song.instruments.push(Instrument::with_sample("i", 0));
        song
    }

    fn set_effect(song: &mut Song, pattern: usize, row: u16, effect: Effect) {
        song.patterns[pattern].cell_mut(row, 0).effects[0] = effect;
    }

    struct Run {
        seq: Sequencer,
        voices: Vec<ChannelVoice>,
        faults: FaultLog,
    }

    impl Run {
        fn new(song: &Song) -> Self {
            Self {
                seq: Sequencer::new(song, RATE, 0),
                voices: song
                    .channels
                    .iter()
                    .enumerate()
                    .map(|(i, c)| ChannelVoice::new(i as u8, c))
                    .collect(),
                faults: FaultLog::default(),
            }
        }

        /// Consume one whole tick, returning its length in frames.
        fn tick(&mut self, song: &Song) -> u32 {
            self.seq.advance(song, &mut self.voices, &mut self.faults, u32::MAX)
        }

        /// Collect (order, row) at the start of each row until finished or `limit` rows.
        fn rows(&mut self, song: &Song, limit: usize) -> Vec<(u16, u16)> {
            let mut visited = Vec::new();
            while visited.len() < limit {
                let pos = self.seq.position();
                if self.tick(song) == 0 {
                    break;
                }
                if pos.tick == 0 {
                    visited.push((pos.order, pos.row));
                }
            }
            visited
        }
    }

    #[test]
    fn tick_length_follows_tempo() {
        let s = song(1, 4, &[0]);
        let mut run = Run::new(&s);
        assert_eq!(run.tick(&s), 882);
    }

    #[test]
    fn fractional_frames_carry() {
        let mut s = song(1, 64, &[0]);
        s.initial_tempo = 126;
        let mut run = Run::new(&s);
        // 48000 * 5 / 252 is not a whole number of frames
        run.seq.sample_rate = 48000;
        let total: u32 = (0..126).map(|_| run.tick(&s)).sum();
        // 126 ticks at 2500/126 ms = 2.5 s
        assert!((119_999..=120_000).contains(&total), "{total}");
    }

    #[test]
    fn advance_splits_ticks_into_spans() {
        let s = song(1, 4, &[0]);
        let mut run = Run::new(&s);
        assert_eq!(run.seq.advance(&s, &mut run.voices, &mut run.faults, 500), 500);
        assert_eq!(run.seq.advance(&s, &mut run.voices, &mut run.faults, 500), 382);
        assert_eq!(run.seq.position().tick, 1);
    }

    #[test]
    fn plays_through_orders_then_finishes() {
        let s = song(2, 2, &[0, 1]);
        let mut run = Run::new(&s);
        assert_eq!(run.rows(&s, 100), [(0, 0), (0, 1), (1, 0), (1, 1)]);
        assert!(run.seq.is_finished());
    }

    #[test]
    fn skip_markers_are_passed_and_end_stops() {
        let mut s = song(2, 1, &[0]);
        s.order = vec![
            OrderEntry::Skip,
            OrderEntry::Pattern(1),
            OrderEntry::End,
            OrderEntry::Pattern(0),
        ];
        let mut run = Run::new(&s);
        assert_eq!(run.rows(&s, 100), [(1, 0)]);
    }

    #[test]
    fn restart_order_loops() {
        let mut s = song(3, 1, &[0, 1, 2]);
        s.restart = Some(1);
        let mut run = Run::new(&s);
        assert_eq!(run.rows(&s, 6), [(0, 0), (1, 0), (2, 0), (1, 0), (2, 0), (1, 0)]);
        assert!(!run.seq.is_finished());
    }

    #[test]
    fn pattern_break_clamps_row() {
        let mut s = song(2, 4, &[0, 1]);
        set_effect(&mut s, 0, 0, Effect::PatternBreak(99));
        let mut run = Run::new(&s);
        assert_eq!(run.rows(&s, 2), [(0, 0), (1, 3)]);
    }

    #[test]
    fn position_jump_with_break_sets_both() {
        let mut s = song(2, 4, &[0, 1]);
        set_effect(&mut s, 1, 0, Effect::PositionJump(0));
        s.patterns[1].cell_mut(0, 0).effects[1] = Effect::PatternBreak(2);
        let mut run = Run::new(&s);
        let rows = run.rows(&s, 7);
        assert_eq!(&rows[4..], [(1, 0), (0, 2), (0, 3)]);
    }

    #[test]
    fn jump_past_end_finishes() {
        let mut s = song(1, 4, &[0]);
        set_effect(&mut s, 0, 1, Effect::PositionJump(9));
        let mut run = Run::new(&s);
        assert_eq!(run.rows(&s, 100), [(0, 0), (0, 1)]);
        assert!(run.seq.is_finished());
    }

    #[test]
    fn pattern_loop_repeats_section() {
        let mut s = song(1, 4, &[0]);
        set_effect(&mut s, 0, 1, Effect::PatternLoop(0));
        set_effect(&mut s, 0, 2, Effect::PatternLoop(2));
        let mut run = Run::new(&s);
        let rows: Vec<u16> = run.rows(&s, 100).into_iter().map(|(_, r)| r).collect();
        assert_eq!(rows, [0, 1, 2, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn pattern_delay_stretches_row() {
        let mut s = song(1, 2, &[0]);
        set_effect(&mut s, 0, 0, Effect::PatternDelay(2));
        let mut run = Run::new(&s);
        let mut ticks = 0;
        while run.seq.position().row == 0 {
            run.tick(&s);
            ticks += 1;
        }
        assert_eq!(ticks, 18);
    }

    #[test]
    fn speed_change_applies_to_current_row() {
        let mut s = song(1, 2, &[0]);
        set_effect(&mut s, 0, 0, Effect::SetSpeed(3));
        let mut run = Run::new(&s);
        let mut ticks = 0;
        while run.seq.position().row == 0 {
            run.tick(&s);
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[test]
    fn tempo_change_takes_effect_from_its_tick() {
        let mut s = song(1, 2, &[0]);
        {
            let cell = s.patterns[0].cell_mut(0, 0);
            cell.effects = [Effect::NoteDelay(3), Effect::SetTempo(150)];
        }
        let mut run = Run::new(&s);
        let lengths: Vec<u32> = (0..6).map(|_| run.tick(&s)).collect();
        assert_eq!(lengths, [882, 882, 882, 735, 735, 735]);
    }

    #[test]
    fn missing_pattern_is_skipped_with_fault() {
        let mut s = song(1, 1, &[0]);
        s.order = vec![OrderEntry::Pattern(5), OrderEntry::Pattern(0)];
        let mut run = Run::new(&s);
        assert!(run.tick(&s) > 0);
        assert_eq!(run.seq.position().order, 1);
        assert_eq!(run.faults.count(), 1);
        assert_eq!(run.faults.last(), Some(PlaybackFault::MissingPattern { order: 0 }));
    }

    #[test]
    fn empty_order_list_is_finished() {
        let s = song(1, 1, &[]);
        let mut run = Run::new(&s);
        assert!(run.seq.is_finished());
        assert_eq!(run.tick(&s), 0);
    }

    #[test]
    fn seek_moves_to_row() {
        let s = song(2, 8, &[0, 1]);
        let mut run = Run::new(&s);
        run.tick(&s);
        run.seq.seek(&s, 1, 5);
        assert_eq!(run.seq.position(), Position { order: 1, row: 5, tick: 0 });
        assert_eq!(run.rows(&s, 2), [(1, 5), (1, 6)]);
    }

    #[test]
    fn row_triggers_voice() {
        let mut s = song(1, 1, &[0]);
        {
            let cell: &mut Cell = s.patterns[0].cell_mut(0, 0);
            cell.note = Note::On(48);
            cell.instrument = 1;
        }
        let mut run = Run::new(&s);
        run.tick(&s);
        assert!(run.voices[0].is_active());
    }
}
