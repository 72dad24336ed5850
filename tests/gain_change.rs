//! Scenario S6 (spec §8): changing playlist gain takes effect starting
//! with the next buffer the decoder produces — buffers already queued
//! keep the gain they were decoded with.

mod common;

use std::time::Duration;

use common::{make_sink, pcm_stereo_44100, wait_until};
use groove::{AudioFormat, BufferGetResult, BufferRef, ChannelLayout, Playlist, SampleFormat};

fn max_abs_s16(bytes: &[u8]) -> i32 {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_ne_bytes([c[0], c[1]]).unsigned_abs() as i32)
        .max()
        .unwrap_or(0)
}

fn expect_buffer(result: BufferGetResult) -> BufferRef {
    match result {
        BufferGetResult::Yes(b) => b,
        other => panic!("expected a buffer, got {:?}", other),
    }
}

#[test]
fn gain_change_affects_only_buffers_decoded_after_it_was_set() {
    let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
    let one_block_bytes = 512 * fmt.bytes_per_frame();

    // Room for exactly one buffered block, so the decoder stalls right
    // after producing the first and won't race ahead with the old gain.
    let sink = make_sink(fmt, one_block_bytes);
    let playlist = Playlist::new();
    playlist.attach_sink(sink.clone());
    playlist.insert(pcm_stereo_44100(1.0), 1.0, None);

    assert!(
        wait_until(|| sink.is_full(), Duration::from_secs(2)),
        "decoder never filled the sink to capacity"
    );

    playlist.set_gain(0.1);

    let first = expect_buffer(sink.buffer_get(true));
    let before = max_abs_s16(first.bytes());
    assert!(before > 10_000, "expected a near full-scale sample, got {before}");

    // Freeing capacity wakes the decoder, which now reads the updated gain.
    let second = expect_buffer(sink.buffer_get(true));
    let after = max_abs_s16(second.bytes());
    assert!(
        after < before / 2,
        "gain change did not take effect: before={before} after={after}"
    );
}
