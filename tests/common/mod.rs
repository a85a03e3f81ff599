//! Songs shared by the integration tests.
#![allow(dead_code)]

use pmf_ir::{
    Effect, Envelope, Instrument, LoopType, Note, OrderEntry, Sample, SampleData, Song,
    VolumeCommand,
};

/// Amiga periods used by the synthesized module.
const PERIOD_C2: u16 = 428;
const PERIOD_C3: u16 = 214;

fn mod_cell(sample: u8, period: u16, effect: u8, param: u8) -> [u8; 4] {
    [
        (sample & 0xF0) | (period >> 8) as u8,
        period as u8,
        (sample & 0x0F) << 4 | effect,
        param,
    ]
}

/// A one-pattern 4-channel ProTracker module with a looping square wave.
///
/// `restart` is written to the restart byte; anything at or past the song
/// length means the song ends after the pattern.
pub fn protracker_module(restart: u8) -> Vec<u8> {
    let mut data = vec![0u8; 1084];
    data[..10].copy_from_slice(b"integrated");

    // Sample 1: 32 bytes, full volume, looping over all of it
    data[20..26].copy_from_slice(b"square");
    data[42..44].copy_from_slice(&16u16.to_be_bytes());
    data[45] = 64;
    data[48..50].copy_from_slice(&16u16.to_be_bytes());

    data[950] = 1;
    data[951] = restart;
    data[1080..1084].copy_from_slice(b"M.K.");

    let mut pattern = vec![0u8; 64 * 4 * 4];
    let mut put = |row: usize, ch: usize, cell: [u8; 4]| {
        let at = (row * 4 + ch) * 4;
        pattern[at..at + 4].copy_from_slice(&cell);
    };
    put(0, 0, mod_cell(1, PERIOD_C2, 0, 0));
    put(4, 1, mod_cell(1, PERIOD_C3, 0x4, 0x48));
    put(8, 0, mod_cell(0, 0, 0xA, 0x02));
    put(16, 2, mod_cell(1, PERIOD_C2, 0x3, 0x10));
    put(24, 3, mod_cell(1, PERIOD_C3, 0xE, 0x93));
    put(32, 0, mod_cell(0, 0, 0xF, 0x04));
    put(40, 1, mod_cell(0, 0, 0xC, 0x00));
    data.extend_from_slice(&pattern);

    data.extend((0..32).map(|i| if i < 16 { 0x60u8 } else { 0xA0 }));
    data
}

/// A two-channel song touching envelopes, fadeout, 16-bit ping-pong
/// samples, pattern loops and global volume slides. Loops forever.
pub fn busy_song() -> Song {
    let mut song = Song::with_channels("busy", 2);
    let p0 = song.add_pattern(16);
    let p1 = song.add_pattern(16);
    song.order = vec![
        OrderEntry::Pattern(p0),
        OrderEntry::Skip,
        OrderEntry::Pattern(p1),
    ];
    song.restart = Some(0);

    let mut saw = Sample::new("saw");
    saw.data = SampleData::Mono16((0..512).map(|i| (i * 128 - 32768) as i16).collect());
    saw.loop_type = LoopType::PingPong;
    saw.loop_start = 64;
    saw.loop_end = 512;
    song.samples.push(saw);

    let mut inst = Instrument::with_sample("pad", 0);
    let mut env = Envelope::from_points(&[(0, 0), (8, 64), (32, 32)]);
    env.sustain = Some(2);
    inst.volume_envelope = Some(env);
    inst.panning_envelope = Some(Envelope::from_points(&[(0, 0), (16, 64)]));
    inst.fadeout = 2048;
    song.instruments.push(inst);

    {
        let pat = &mut song.patterns[p0 as usize];
        let c = pat.cell_mut(0, 0);
        c.note = Note::On(48);
        c.instrument = 1;
        c.effects[0] = Effect::Vibrato { speed: 6, depth: 4 };
        let c = pat.cell_mut(0, 1);
        c.note = Note::On(55);
        c.instrument = 1;
        c.volume = VolumeCommand::Panning(10);
        c.effects[0] = Effect::PatternLoop(0);
        pat.cell_mut(3, 1).effects[0] = Effect::PatternLoop(2);
        pat.cell_mut(8, 0).note = Note::Off;
        pat.cell_mut(10, 1).effects[0] = Effect::GlobalVolumeSlide(0x02);
        pat.cell_mut(12, 0).note = Note::Fade;
    }
    {
        let pat = &mut song.patterns[p1 as usize];
        let c = pat.cell_mut(0, 0);
        c.note = Note::On(60);
        c.instrument = 1;
        c.effects[0] = Effect::Arpeggio { x: 4, y: 7 };
        c.effects[1] = Effect::SetTempo(160);
        let c = pat.cell_mut(4, 1);
        c.note = Note::On(36);
        c.instrument = 1;
        c.effects[0] = Effect::TonePorta(8);
        pat.cell_mut(6, 1).effects[0] = Effect::Retrigger {
            interval: 2,
            volume_change: 1,
        };
        pat.cell_mut(15, 0).effects[0] = Effect::PatternDelay(1);
    }
    song
}
