//! Runtime evaluator for instrument envelopes.

use pmf_ir::Envelope;

/// Runtime state for a playing envelope.
///
/// The position counts ticks since the note started. Each tick the value is
/// resolved at the current position and then the position steps forward,
/// unless it is parked on the sustain point while the key is held.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeState {
    /// Current segment index (the "from" breakpoint).
    segment: u8,
    /// Envelope ticks elapsed.
    position: u16,
    /// Current output value, 8.8 fixed point (0..=64 << 8).
    value: u16,
    /// Reached the last point of an envelope without a loop.
    finished: bool,
    /// Whether the loop end was crossed on the last advance.
    looped: bool,
}

impl EnvelopeState {
    /// Create a new state starting at the first breakpoint.
    pub fn new(envelope: &Envelope) -> Self {
        let mut state = Self::default();
        state.resolve(envelope);
        state
    }

    /// Current output value (8.8 fixed point).
    pub fn value(&self) -> u16 {
        self.value
    }

    /// Current position in envelope ticks.
    pub fn position(&self) -> u16 {
        self.position
    }

    /// Whether the envelope has run past its final point.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether a loop point was crossed on the last advance.
    pub fn looped(&self) -> bool {
        self.looped
    }

    /// Jump to an absolute tick (set-envelope-position effect).
    pub fn set_position(&mut self, envelope: &Envelope, tick: u16) {
        self.position = tick;
        self.segment = 0;
        self.resolve(envelope);
    }

    /// Resolve the value at the current position, then step one tick.
    pub fn advance(&mut self, envelope: &Envelope, key_held: bool) {
        self.looped = false;
        self.resolve(envelope);

        if key_held {
            let sustain_tick = envelope
                .sustain
                .and_then(|s| envelope.points.get(s as usize))
                .map(|p| p.tick);
            if sustain_tick == Some(self.position) {
                return;
            }
        }
        if self.finished {
            return;
        }

        self.position = self.position.saturating_add(1);
        if let Some(range) = envelope.loop_range {
            let (Some(start), Some(end)) = (
                envelope.points.get(range.start as usize),
                envelope.points.get(range.end as usize),
            ) else {
                return;
            };
            if self.position > end.tick {
                self.position = start.tick;
                self.segment = range.start;
                self.looped = true;
            }
        }
    }

    /// Walk to the segment containing the current position and interpolate.
    fn resolve(&mut self, envelope: &Envelope) {
        let points = &envelope.points;
        if points.is_empty() {
            self.value = 0;
            self.finished = true;
            return;
        }

        let mut seg = (self.segment as usize).min(points.len() - 1);
        while seg > 0 && points[seg].tick > self.position {
            seg -= 1;
        }
        while seg + 1 < points.len() && points[seg + 1].tick <= self.position {
            seg += 1;
        }
        self.segment = seg as u8;
        self.value = envelope.segment_value(seg, self.position);
        self.finished = seg + 1 >= points.len() && envelope.loop_range.is_none();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmf_ir::LoopRange;

    fn run(env: &Envelope, state: &mut EnvelopeState, ticks: u16, held: bool) {
        for _ in 0..ticks {
            state.advance(env, held);
        }
    }

    #[test]
    fn single_linear_segment() {
        let env = Envelope::from_points(&[(0, 0), (100, 64)]);
        let mut state = EnvelopeState::new(&env);
        assert_eq!(state.value(), 0);

        run(&env, &mut state, 51, false);
        assert_eq!(state.value(), 32 << 8);

        run(&env, &mut state, 50, false);
        assert_eq!(state.value(), 64 << 8);
        assert!(state.is_finished());
    }

    #[test]
    fn sustain_holds_until_key_released() {
        let mut env = Envelope::from_points(&[(0, 0), (10, 64), (20, 0)]);
        env.sustain = Some(1);
        let mut state = EnvelopeState::new(&env);

        run(&env, &mut state, 11, true);
        assert_eq!(state.value(), 64 << 8);
        assert_eq!(state.position(), 10);

        // Still parked
        run(&env, &mut state, 100, true);
        assert_eq!(state.value(), 64 << 8);
        assert_eq!(state.position(), 10);

        // Release → moves toward the last point
        run(&env, &mut state, 6, false);
        assert!(state.value() < 64 << 8);
        assert!(state.value() > 0);
        assert!(!state.is_finished());
    }

    #[test]
    fn looping_envelope_cycles() {
        let mut env = Envelope::from_points(&[(0, 0), (4, 40), (8, 0)]);
        env.loop_range = Some(LoopRange { start: 1, end: 2 });
        let mut state = EnvelopeState::new(&env);

        // The ninth tick reads the loop end, then steps back to the loop start
        run(&env, &mut state, 9, false);
        assert_eq!(state.value(), 0);
        assert!(state.looped());
        assert_eq!(state.position(), 4);
        run(&env, &mut state, 1, false);
        assert_eq!(state.value(), 40 << 8);
        assert!(!state.looped());
        assert!(!state.is_finished());
    }

    #[test]
    fn loop_keeps_running_after_release() {
        let mut env = Envelope::from_points(&[(0, 64), (2, 32), (4, 64)]);
        env.loop_range = Some(LoopRange { start: 0, end: 2 });
        let mut state = EnvelopeState::new(&env);
        let mut loops = 0;
        for _ in 0..20 {
            state.advance(&env, false);
            if state.looped() {
                loops += 1;
            }
        }
        assert_eq!(loops, 4);
    }

    #[test]
    fn set_position_jumps_backwards() {
        let env = Envelope::from_points(&[(0, 0), (10, 64), (20, 64)]);
        let mut state = EnvelopeState::new(&env);
        run(&env, &mut state, 15, false);
        state.set_position(&env, 5);
        assert_eq!(state.value(), 32 << 8);
        assert_eq!(state.position(), 5);
    }

    #[test]
    fn empty_envelope_is_silent_and_finished() {
        let env = Envelope::new();
        let mut state = EnvelopeState::new(&env);
        state.advance(&env, true);
        assert_eq!(state.value(), 0);
        assert!(state.is_finished());
    }

    #[test]
    fn one_point_envelope_holds_value() {
        let env = Envelope::from_points(&[(0, 42)]);
        let mut state = EnvelopeState::new(&env);
        run(&env, &mut state, 100, false);
        assert_eq!(state.value(), 42 << 8);
        assert!(state.is_finished());
    }
}
