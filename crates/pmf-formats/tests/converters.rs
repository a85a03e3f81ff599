//! Integration tests: synthesized legacy modules through `decode` and back
//! out as PMF.

use pmf_formats::{decode, detect, pmf, FormatError, SourceFormat};
use pmf_ir::{Note, OrderEntry, Song};

fn count_notes(song: &Song) -> usize {
    song.patterns
        .iter()
        .map(|pat| {
            (0..pat.rows)
                .flat_map(|row| (0..pat.channels).map(move |ch| (row, ch)))
                .filter(|&(row, ch)| matches!(pat.cell(row, ch).note, Note::On(_)))
                .count()
        })
        .sum()
}

fn count_samples_with_data(song: &Song) -> usize {
    song.samples.iter().filter(|s| !s.is_empty()).count()
}

fn assert_mod_invariants(song: &Song, channels: usize) {
    // All MOD files have 31 sample/instrument slots
    assert_eq!(song.samples.len(), 31);
    assert_eq!(song.instruments.len(), 31);

    // MOD defaults
    assert_eq!(song.initial_tempo, 125);
    assert_eq!(song.initial_speed, 6);
    assert_eq!(song.channels.len(), channels);

    for (i, pat) in song.patterns.iter().enumerate() {
        assert_eq!(pat.rows, 64, "Pattern {} rows", i);
        assert_eq!(pat.channels as usize, channels, "Pattern {} channels", i);
    }
}

/// A ProTracker module: `patterns` patterns, a note every 8 rows on every
/// channel, and one 64-byte sample.
fn build_mod(signature: &[u8; 4], channels: usize, patterns: u8) -> Vec<u8> {
    let mut data = vec![0u8; 1084];
    data[..7].copy_from_slice(b"fixture");
    data[20..24].copy_from_slice(b"lead");
    data[42..44].copy_from_slice(&32u16.to_be_bytes());
    data[45] = 40;
    data[950] = patterns;
    data[951] = 127;
    for i in 0..patterns {
        data[952 + i as usize] = patterns - 1 - i;
    }
    data[1080..1084].copy_from_slice(signature);

    for _ in 0..patterns {
        let mut pattern = vec![0u8; 64 * channels * 4];
        for row in (0..64).step_by(8) {
            for ch in 0..channels {
                let at = (row * channels + ch) * 4;
                // Sample 1, period 428
                pattern[at..at + 4].copy_from_slice(&[0x01, 0xAC, 0x10, 0x00]);
            }
        }
        data.extend_from_slice(&pattern);
    }
    data.extend((0..64u8).map(|i| i.wrapping_mul(4)));
    data
}

#[test]
fn four_channel_mod() {
    let data = build_mod(b"M.K.", 4, 3);
    assert_eq!(detect(&data), Some(SourceFormat::Mod));
    let song = decode(&data).unwrap();
    assert_mod_invariants(&song, 4);
    assert_eq!(song.title.as_str(), "fixture");
    assert_eq!(song.patterns.len(), 3);
    assert_eq!(
        song.order,
        vec![
            OrderEntry::Pattern(2),
            OrderEntry::Pattern(1),
            OrderEntry::Pattern(0)
        ]
    );
    assert_eq!(song.restart, None);
    assert_eq!(count_notes(&song), 3 * 8 * 4);
    assert_eq!(count_samples_with_data(&song), 1);
    assert_eq!(song.samples[0].len(), 64);
    assert_eq!(song.samples[0].default_volume, 40);
}

#[test]
fn eight_channel_mod() {
    let song = decode(&build_mod(b"8CHN", 8, 1)).unwrap();
    assert_mod_invariants(&song, 8);
    assert_eq!(count_notes(&song), 8 * 8);
}

#[test]
fn converted_song_survives_pmf() {
    let song = decode(&build_mod(b"M.K.", 4, 2)).unwrap();
    let bytes = pmf::encode(&song).unwrap();
    let reloaded = decode(&bytes).unwrap();
    assert_eq!(reloaded, song);
    assert_eq!(count_notes(&reloaded), count_notes(&song));
}

#[test]
fn streamed_and_in_memory_loads_agree() {
    let song = decode(&build_mod(b"FLT4", 4, 1)).unwrap();
    let bytes = pmf::encode(&song).unwrap();
    let streamed = pmf::load_from(std::io::Cursor::new(&bytes)).unwrap();
    assert_eq!(streamed, pmf::load(&bytes).unwrap());
}

#[test]
fn truncated_sample_data_still_loads() {
    let mut data = build_mod(b"M.K.", 4, 1);
    data.truncate(data.len() - 40);
    let song = decode(&data).unwrap();
    assert_eq!(song.samples[0].len(), 24);
}

#[test]
fn truncated_pattern_data_is_an_error() {
    let data = build_mod(b"M.K.", 4, 2);
    assert!(matches!(
        decode(&data[..1084 + 1500]),
        Err(FormatError::UnexpectedEof { .. })
    ));
}
