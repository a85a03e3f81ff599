//! Allocation-free render path tests.
//!
//! These tests verify that `render` does not allocate once a song is
//! loaded. They play synthesized songs for several seconds to catch
//! allocations triggered by specific effect combinations, pattern loops,
//! or sample edge cases.
//!
//! Just run `cargo test`, no feature flags needed.

mod common;

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use pmf_engine::{Engine, Interpolation, OutputChannels, OutputConfig};
use pmf_master::Player;
use pmf_ir::Song;

const BLOCK: usize = 512;

/// Render a song for `duration_frames`, aborting on any heap allocation.
fn assert_engine_alloc_free(song: &Song, config: OutputConfig, duration_frames: usize) {
    let mut engine = Engine::new(song, config);
    engine.start().unwrap();
    let mut out = vec![0i16; BLOCK * config.channels.count()];

    assert_no_alloc(|| {
        let mut done = 0;
        while done < duration_frames {
            done += engine.render(&mut out);
        }
    });
}

#[test]
fn converted_mod_alloc_free() {
    let song = pmf_formats::decode(&common::protracker_module(0)).unwrap();
    assert_engine_alloc_free(&song, OutputConfig::default(), 44100 * 5);
}

#[test]
fn busy_song_alloc_free() {
    assert_engine_alloc_free(&common::busy_song(), OutputConfig::default(), 44100 * 5);
}

#[test]
fn mono_nearest_alloc_free() {
    let config = OutputConfig {
        channels: OutputChannels::Mono,
        interpolation: Interpolation::Nearest,
        volume_ramp: 0,
        ..OutputConfig::with_sample_rate(22050)
    };
    assert_engine_alloc_free(&common::busy_song(), config, 22050 * 5);
}

#[test]
fn player_with_control_traffic_alloc_free() {
    let (mut player, mut control) = Player::new(OutputConfig::default());
    player.load_song(common::busy_song()).unwrap();
    let mut out = vec![0i16; BLOCK * 2];

    control.start().unwrap();
    assert_no_alloc(|| {
        for block in 0..400 {
            if block % 50 == 25 {
                let _ = control.set_position(2, 3);
            }
            if block % 100 == 60 {
                let _ = control.pause();
                let _ = control.resume();
            }
            player.render(&mut out);
        }
    });
    assert!(player.is_playing());
}

#[test]
fn song_swap_alloc_free() {
    let (mut player, mut control) = Player::new(OutputConfig::default());
    player.load_song(common::busy_song()).unwrap();
    player.start().unwrap();
    let mut out = vec![0i16; BLOCK * 2];
    player.render(&mut out);

    let next = pmf_formats::decode(&common::protracker_module(0)).unwrap();
    control.load_song(next).unwrap();
    control.start().unwrap();
    assert_no_alloc(|| {
        for _ in 0..200 {
            player.render(&mut out);
        }
    });
    assert_eq!(player.song().map(|s| s.num_channels()), Some(4));
    assert!(player.is_playing());
    // The busy song's engine is freed here, off the render path
    control.release_retired();
}

#[test]
fn finished_song_keeps_rendering_silence_alloc_free() {
    let song = pmf_formats::decode(&common::protracker_module(0x7F)).unwrap();
    let (mut player, _control) = Player::new(OutputConfig::default());
    player.load_song(song).unwrap();
    player.start().unwrap();
    let mut out = vec![0i16; BLOCK * 2];

    assert_no_alloc(|| {
        for _ in 0..44100 * 12 / BLOCK {
            player.render(&mut out);
        }
    });
    assert!(player.is_finished());
    assert!(out.iter().all(|&s| s == 0));
}
