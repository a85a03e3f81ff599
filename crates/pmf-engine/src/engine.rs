//! Pull-based playback driver.

use alloc::boxed::Box;
use core::ops::Deref;

use heapless::Deque;
use pmf_ir::Song;

use crate::config::OutputConfig;
use crate::fault::FaultLog;
use crate::mixer::Mixer;
use crate::sequencer::{Position, Sequencer};
use crate::voice::ChannelVoice;

/// Capacity of the staged command queue.
pub const COMMAND_QUEUE_LEN: usize = 16;

/// A control request, applied at the start of the next [`Engine::render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Play from the top of the song with fresh voices and effect memory
    Start,
    /// Silence all voices and rewind to order 0, row 0
    Stop,
    Pause,
    Resume,
    /// Jump to an order/row, cutting sounding voices
    SetPosition { order: u16, row: u16 },
}

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transport {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// The order list ran out
    Finished,
}

/// The playback engine.
///
/// Holds the song through any `Deref<Target = Song>` so callers can pass
/// `&Song`, `Box<Song>` or `Arc<Song>`.
pub struct Engine<S: Deref<Target = Song>> {
    song: S,
    config: OutputConfig,
    sequencer: Sequencer,
    voices: Box<[ChannelVoice]>,
    mixer: Mixer,
    commands: Deque<Command, COMMAND_QUEUE_LEN>,
    transport: Transport,
    faults: FaultLog,
}

impl<S: Deref<Target = Song>> Engine<S> {
    /// Create a stopped engine. All allocation happens here.
    pub fn new(song: S, config: OutputConfig) -> Self {
        let sequencer = Sequencer::new(&song, config.sample_rate, config.volume_ramp);
        let voices = song
            .channels
            .iter()
            .enumerate()
            .map(|(i, settings)| ChannelVoice::new(i as u8, settings))
            .collect();
        log::debug!(
            "engine: {} channels at {} Hz",
            song.channels.len(),
            config.sample_rate
        );
        Self {
            song,
            config,
            sequencer,
            voices,
            mixer: Mixer::new(&config),
            commands: Deque::new(),
            transport: Transport::Stopped,
            faults: FaultLog::default(),
        }
    }

    /// Stage a command. Hands it back if the queue is full.
    pub fn post(&mut self, command: Command) -> Result<(), Command> {
        self.commands.push_back(command)
    }

    pub fn start(&mut self) -> Result<(), Command> {
        self.post(Command::Start)
    }

    pub fn stop(&mut self) -> Result<(), Command> {
        self.post(Command::Stop)
    }

    pub fn pause(&mut self) -> Result<(), Command> {
        self.post(Command::Pause)
    }

    pub fn resume(&mut self) -> Result<(), Command> {
        self.post(Command::Resume)
    }

    pub fn set_position(&mut self, order: u16, row: u16) -> Result<(), Command> {
        self.post(Command::SetPosition { order, row })
    }

    /// Render interleaved frames into `out`, returning the frame count.
    ///
    /// Staged commands are applied first. Anything other than active
    /// playback writes silence.
    pub fn render(&mut self, out: &mut [i16]) -> usize {
        #[cfg(feature = "alloc_check")]
        {
            assert_no_alloc::assert_no_alloc(|| self.render_inner(out))
        }
        #[cfg(not(feature = "alloc_check"))]
        {
            self.render_inner(out)
        }
    }

    fn render_inner(&mut self, out: &mut [i16]) -> usize {
        while let Some(command) = self.commands.pop_front() {
            self.apply(command);
        }

        let stride = self.mixer.stride();
        let frames = out.len() / stride;
        if self.transport != Transport::Playing {
            out.fill(0);
            return frames;
        }

        let song: &Song = &self.song;
        let mut done = 0;
        while done < frames {
            let span = self.sequencer.advance(
                song,
                &mut self.voices,
                &mut self.faults,
                (frames - done) as u32,
            ) as usize;
            if span == 0 {
                self.transport = Transport::Finished;
                break;
            }
            let global_volume = self.sequencer.globals().global_volume;
            self.mixer.mix(
                song,
                &mut self.voices,
                global_volume,
                &mut self.faults,
                &mut out[done * stride..(done + span) * stride],
            );
            done += span;
        }
        out[done * stride..].fill(0);
        frames
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Start => {
                self.reset_voices();
                self.sequencer.reset(&self.song);
                self.faults.clear();
                self.transport = if self.sequencer.is_finished() {
                    Transport::Finished
                } else {
                    Transport::Playing
                };
            }
            Command::Stop => {
                self.reset_voices();
                self.sequencer.reset(&self.song);
                self.transport = Transport::Stopped;
            }
            Command::Pause if self.transport == Transport::Playing => {
                self.transport = Transport::Paused;
            }
            Command::Resume if self.transport == Transport::Paused => {
                self.transport = Transport::Playing;
            }
            Command::SetPosition { order, row } => {
                for voice in self.voices.iter_mut() {
                    voice.cut();
                }
                self.sequencer.seek(&self.song, order, row);
                if self.sequencer.is_finished() {
                    self.transport = Transport::Finished;
                } else if self.transport == Transport::Finished {
                    self.transport = Transport::Playing;
                }
            }
            Command::Pause | Command::Resume => {}
        }
    }

    fn reset_voices(&mut self) {
        for (voice, settings) in self.voices.iter_mut().zip(self.song.channels.iter()) {
            voice.reset(settings);
        }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn position(&self) -> Position {
        self.sequencer.position()
    }

    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
    }

    pub fn is_finished(&self) -> bool {
        self.transport == Transport::Finished
    }

    pub fn faults(&self) -> &FaultLog {
        &self.faults
    }

    /// Current tempo, speed and global volume.
    pub fn globals(&self) -> &crate::voice::Globals {
        self.sequencer.globals()
    }

    /// Read-only view of a channel's voice.
    pub fn voice(&self, channel: usize) -> Option<&ChannelVoice> {
        self.voices.get(channel)
    }

    pub fn voices(&self) -> &[ChannelVoice] {
        &self.voices
    }
}
