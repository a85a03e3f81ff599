//! The owning player and its cross-thread control channel.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use pmf_audio::RenderSource;
use pmf_engine::{Command, Engine, FaultLog, Frame, OutputConfig, Position, Transport};
use pmf_ir::Song;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::wav;
use crate::LoadError;

/// Messages that can wait in the control channel.
pub const CONTROL_QUEUE_LEN: usize = 64;

/// Replaced engines waiting to be freed by the [`ControlHandle`].
const RETIRED_QUEUE_LEN: usize = 4;

/// Frames rendered per block by the offline helpers.
const OFFLINE_BLOCK: usize = 1024;

type BoxedEngine = Box<Engine<Arc<Song>>>;

/// One message on the control channel.
enum Control {
    Command(Command),
    /// An engine built off the render thread, ready to take over.
    Swap(BoxedEngine),
}

/// State published by the player after every render.
#[derive(Debug, Default)]
struct Status {
    finished: AtomicBool,
    /// Order in the high half, row in the low half
    position: AtomicU32,
}

/// Steers a [`Player`] from another thread.
///
/// Commands and song swaps are applied in the order they were sent, at the
/// start of the player's next render. Engines a swap replaced are handed
/// back here and freed on this side.
pub struct ControlHandle {
    producer: HeapProd<Control>,
    retired: HeapCons<BoxedEngine>,
    config: OutputConfig,
    status: Arc<Status>,
}

impl ControlHandle {
    /// Queue a command. Hands it back if the channel is full.
    pub fn send(&mut self, command: Command) -> Result<(), Command> {
        self.release_retired();
        self.producer
            .try_push(Control::Command(command))
            .map_err(|_| command)
    }

    pub fn start(&mut self) -> Result<(), Command> {
        self.send(Command::Start)
    }

    pub fn stop(&mut self) -> Result<(), Command> {
        self.send(Command::Stop)
    }

    pub fn pause(&mut self) -> Result<(), Command> {
        self.send(Command::Pause)
    }

    pub fn resume(&mut self) -> Result<(), Command> {
        self.send(Command::Resume)
    }

    pub fn set_position(&mut self, order: u16, row: u16) -> Result<(), Command> {
        self.send(Command::SetPosition { order, row })
    }

    /// Decode PMF or a legacy module and stage it as the player's next song.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let song = pmf_formats::decode(bytes)?;
        self.load_song(song)
    }

    /// Stage `song` to replace the player's current song at its next render.
    ///
    /// The engine is built here, so the render thread only swaps pointers.
    /// The new song starts stopped at the top; commands sent after this call
    /// apply to it.
    pub fn load_song(&mut self, song: Song) -> Result<(), LoadError> {
        song.validate()?;
        self.release_retired();
        let engine = Box::new(Engine::new(Arc::new(song), self.config));
        self.producer
            .try_push(Control::Swap(engine))
            .map_err(|_| LoadError::QueueFull)?;
        log::debug!("song swap queued");
        Ok(())
    }

    /// True once the player has run off the end of the order list.
    pub fn is_finished(&self) -> bool {
        self.status.finished.load(Ordering::Relaxed)
    }

    /// Order and row as of the last render.
    pub fn position(&self) -> (u16, u16) {
        let packed = self.status.position.load(Ordering::Relaxed);
        ((packed >> 16) as u16, packed as u16)
    }

    /// Free engines the player has swapped out.
    pub fn release_retired(&mut self) {
        while self.retired.try_pop().is_some() {}
    }
}

/// Owns the loaded song and the engine playing it.
pub struct Player {
    engine: Option<BoxedEngine>,
    config: OutputConfig,
    controls: HeapCons<Control>,
    retired: HeapProd<BoxedEngine>,
    /// A message that could not be applied yet
    pending: Option<Control>,
    status: Arc<Status>,
}

impl Player {
    /// Create an empty player and the handle that controls it.
    pub fn new(config: OutputConfig) -> (Self, ControlHandle) {
        let (producer, controls) = HeapRb::<Control>::new(CONTROL_QUEUE_LEN).split();
        let (retired_tx, retired_rx) = HeapRb::<BoxedEngine>::new(RETIRED_QUEUE_LEN).split();
        let status = Arc::new(Status::default());
        let player = Self {
            engine: None,
            config,
            controls,
            retired: retired_tx,
            pending: None,
            status: status.clone(),
        };
        let control = ControlHandle {
            producer,
            retired: retired_rx,
            config,
            status,
        };
        (player, control)
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    /// Decode PMF or a legacy module and make it the current song.
    ///
    /// On failure the previous song stays loaded.
    pub fn load(&mut self, bytes: &[u8]) -> Result<(), LoadError> {
        let song = pmf_formats::decode(bytes)?;
        self.load_song(song)
    }

    /// Validate `song` and make it the current song, stopped at the top.
    pub fn load_song(&mut self, song: Song) -> Result<(), LoadError> {
        song.validate()?;
        log::info!(
            "loaded '{}': {} channels, {} orders, {} patterns",
            song.title,
            song.num_channels(),
            song.order.len(),
            song.patterns.len()
        );
        self.engine = Some(Box::new(Engine::new(Arc::new(song), self.config)));
        self.pending = None;
        self.publish_reset();
        Ok(())
    }

    fn publish_reset(&self) {
        self.status.finished.store(false, Ordering::Relaxed);
        self.status.position.store(0, Ordering::Relaxed);
    }

    pub fn song(&self) -> Option<&Song> {
        self.engine.as_ref().map(|e| e.song())
    }

    /// Stage a command on the engine. Hands it back when no song is loaded
    /// or the engine queue is full.
    pub fn post(&mut self, command: Command) -> Result<(), Command> {
        match self.engine.as_mut() {
            Some(engine) => engine.post(command),
            None => Err(command),
        }
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
    /// Messages from the [`ControlHandle`] are applied first. With no song
    /// loaded the output is silent and commands are discarded.
    pub fn render(&mut self, out: &mut [i16]) -> usize {
        self.apply_controls();
        let Some(engine) = self.engine.as_mut() else {
            out.fill(0);
            return out.len() / self.config.channels.count();
        };

        let frames = engine.render(out);
        let pos = engine.position();
        self.status
            .finished
            .store(engine.is_finished(), Ordering::Relaxed);
        self.status
            .position
            .store(((pos.order as u32) << 16) | pos.row as u32, Ordering::Relaxed);
        frames
    }

    /// Apply queued messages in order, stopping at the first that has to wait.
    fn apply_controls(&mut self) {
        loop {
            let Some(control) = self.pending.take().or_else(|| self.controls.try_pop()) else {
                break;
            };
            if let Err(control) = self.apply(control) {
                self.pending = Some(control);
                break;
            }
        }
    }

    fn apply(&mut self, control: Control) -> Result<(), Control> {
        match control {
            Control::Command(command) => match self.engine.as_mut() {
                Some(engine) => engine.post(command).map_err(Control::Command),
                None => Ok(()),
            },
            Control::Swap(engine) => {
                // The old engine is returned for freeing, so wait for room
                if let Some(old) = self.engine.take() {
                    if let Err(old) = self.retired.try_push(old) {
                        self.engine = Some(old);
                        return Err(Control::Swap(engine));
                    }
                }
                self.engine = Some(engine);
                self.publish_reset();
                Ok(())
            }
        }
    }

    pub fn transport(&self) -> Transport {
        self.engine.as_ref().map_or(Transport::Stopped, |e| e.transport())
    }

    pub fn position(&self) -> Option<Position> {
        self.engine.as_ref().map(|e| e.position())
    }

    pub fn is_playing(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_playing())
    }

    pub fn is_finished(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_finished())
    }

    pub fn faults(&self) -> Option<&FaultLog> {
        self.engine.as_ref().map(|e| e.faults())
    }

    // --- Offline rendering ---

    /// Render up to `max_frames` frames, stopping early once the song ends.
    pub fn render_frames(&mut self, max_frames: usize) -> Vec<Frame> {
        let layout = self.config.channels;
        let stride = layout.count();
        let mut block = vec![0i16; OFFLINE_BLOCK * stride];
        let mut frames = Vec::with_capacity(max_frames.min(OFFLINE_BLOCK * 64));

        while frames.len() < max_frames && !self.is_finished() {
            let want = (max_frames - frames.len()).min(OFFLINE_BLOCK);
            let pcm = &mut block[..want * stride];
            let rendered = self.render(pcm);
            frames.extend(
                pcm.chunks_exact(stride)
                    .take(rendered)
                    .map(|f| Frame::from_interleaved(f, layout)),
            );
            if self.engine.is_none() {
                break;
            }
        }
        frames
    }

    /// Render up to `max_frames` frames into a WAV file. Returns the frame count.
    pub fn render_to_wav(&mut self, path: impl AsRef<Path>, max_frames: usize) -> std::io::Result<usize> {
        let frames = self.render_frames(max_frames);
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        wav::write_wav(&mut out, &frames, self.config.sample_rate, self.config.channels)?;
        std::io::Write::flush(&mut out)?;
        log::info!("wrote {} frames to {}", frames.len(), path.as_ref().display());
        Ok(frames.len())
    }
}

impl RenderSource for Player {
    fn channels(&self) -> usize {
        self.config.channels.count()
    }

    fn render(&mut self, out: &mut [i16]) -> usize {
        Player::render(self, out)
    }
}
