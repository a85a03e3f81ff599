//! Integration test: legacy module → PMF → player → rendered frames.

mod common;

use pmf_formats::{pmf, SourceFormat};
use pmf_master::{Frame, OutputChannels, OutputConfig, Player, Transport};

fn has_nonsilent_frames(frames: &[Frame]) -> bool {
    frames.iter().any(|f| !f.is_silent())
}

fn loaded_player(bytes: &[u8], config: OutputConfig) -> Player {
    let (mut player, _control) = Player::new(config);
    player.load(bytes).unwrap();
    player.start().unwrap();
    player
}

#[test]
fn mod_converts_to_pmf_losslessly() {
    let module = common::protracker_module(0);
    assert_eq!(pmf_formats::detect(&module), Some(SourceFormat::Mod));

    let song = pmf_formats::decode(&module).unwrap();
    assert_eq!(song.title.as_str(), "integrated");
    assert_eq!(song.num_channels(), 4);
    assert_eq!(song.restart, Some(0));

    let bytes = pmf::encode(&song).unwrap();
    assert_eq!(pmf_formats::detect(&bytes), Some(SourceFormat::Pmf));
    assert_eq!(pmf::load(&bytes).unwrap(), song);
}

#[test]
fn converted_and_native_render_identically() {
    let module = common::protracker_module(0);
    let pmf_bytes = pmf::encode(&pmf_formats::decode(&module).unwrap()).unwrap();

    let from_mod = loaded_player(&module, OutputConfig::default()).render_frames(44100);
    let from_pmf = loaded_player(&pmf_bytes, OutputConfig::default()).render_frames(44100);
    assert!(has_nonsilent_frames(&from_mod));
    assert_eq!(from_mod, from_pmf);
}

#[test]
fn mod_without_restart_finishes() {
    let mut player = loaded_player(&common::protracker_module(0x7F), OutputConfig::default());
    let frames = player.render_frames(44100 * 30);
    assert!(player.is_finished());
    assert_eq!(player.transport(), Transport::Finished);
    // 32 rows at speed 6, then 32 at speed 4, 882 frames per tick. The
    // block the song ends in is padded with silence.
    let length = (32 * 6 + 32 * 4) * 882;
    assert!(frames.len() >= length && frames.len() < length + 1024);
}

#[test]
fn chunked_player_render_matches_single_render() {
    let bytes = pmf::encode(&common::busy_song()).unwrap();
    let total = 8192;

    let mut whole = vec![0i16; total * 2];
    loaded_player(&bytes, OutputConfig::default()).render(&mut whole);

    let mut player = loaded_player(&bytes, OutputConfig::default());
    let mut chunked = Vec::with_capacity(total * 2);
    let mut block = [0i16; 37 * 2];
    while chunked.len() < total * 2 {
        let want = (total * 2 - chunked.len()).min(block.len());
        player.render(&mut block[..want]);
        chunked.extend_from_slice(&block[..want]);
    }
    assert_eq!(whole, chunked);
}

#[test]
fn control_handle_crosses_threads() {
    let bytes = pmf::encode(&common::busy_song()).unwrap();
    let (mut player, mut control) = Player::new(OutputConfig::default());
    player.load(&bytes).unwrap();

    let control = std::thread::spawn(move || {
        control.start().unwrap();
        control.set_position(2, 0).unwrap();
        control
    })
    .join()
    .unwrap();

    let mut out = [0i16; 256];
    player.render(&mut out);
    assert!(player.is_playing());
    assert_eq!(control.position().0, 2);
}

#[test]
fn control_handle_swaps_song_from_another_thread() {
    let (mut player, mut control) = Player::new(OutputConfig::default());
    player.load(&common::protracker_module(0)).unwrap();
    player.start().unwrap();
    let mut out = [0i16; 256];
    player.render(&mut out);

    let replacement = pmf::encode(&common::busy_song()).unwrap();
    let control = std::thread::spawn(move || {
        control.load(&replacement).unwrap();
        control.start().unwrap();
        control
    })
    .join()
    .unwrap();

    assert_eq!(player.song().map(|s| s.num_channels()), Some(4));
    player.render(&mut out);
    assert_eq!(player.song().map(|s| s.num_channels()), Some(2));
    assert!(player.is_playing());
    assert!(!control.is_finished());
}

#[test]
fn render_to_wav_writes_a_playable_file() {
    let config = OutputConfig {
        sample_rate: 22050,
        channels: OutputChannels::Mono,
        ..OutputConfig::default()
    };
    let mut player = loaded_player(&common::protracker_module(0), config);
    let path = std::env::temp_dir().join(format!("pmfplay-{}.wav", std::process::id()));

    let frames = player.render_to_wav(&path, 22050).unwrap();
    let wav = std::fs::read(&path).unwrap();
    let _ = std::fs::remove_file(&path);

    assert_eq!(frames, 22050);
    assert_eq!(&wav[..4], b"RIFF");
    assert_eq!(wav.len(), 44 + frames * 2);
}

#[test]
fn unsupported_input_keeps_the_player_empty() {
    let (mut player, _control) = Player::new(OutputConfig::default());
    assert!(player.load(b"IMPM").is_err());
    assert!(player.song().is_none());
}
