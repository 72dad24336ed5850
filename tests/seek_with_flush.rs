//! Scenario S5 (spec §8): seeking mid-play with `flush = true` fires the
//! sink's flush callback before any buffer decoded from the new position
//! arrives, and playback resumes at the requested position.

mod common;

use std::time::Duration;

use common::{drain_all, exact_spec, recording_callbacks, wait_until};
use groove::{AudioFormat, BufferGetResult, ChannelLayout, Playlist, SampleFormat, Sink};

#[test]
fn seek_with_flush_fires_before_resumed_buffers_and_lands_near_target() {
    let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
    let (callbacks, handle) = recording_callbacks();
    let sink = Sink::new(exact_spec(&fmt), 1.0, 1 << 20, callbacks);

    let playlist = Playlist::new();
    playlist.attach_sink(sink.clone());
    let item = playlist.insert(common::pcm_stereo_44100(2.0), 1.0, None);

    assert!(
        wait_until(|| handle.filled_count() > 0, Duration::from_secs(2)),
        "playback never produced a first buffer"
    );

    playlist.seek(item, 1.0);

    assert!(
        wait_until(|| handle.events().contains(&"flush"), Duration::from_secs(2)),
        "seek never fired the flush callback"
    );

    let (buffers, hit_end) = drain_all(&sink);
    assert!(hit_end);
    assert!(buffers
        .iter()
        .any(|b| b.pos_seconds() >= 1.0 - 0.05 && b.pos_seconds() < 1.2));
}

#[test]
fn non_blocking_buffer_get_on_an_empty_sink_returns_no() {
    let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
    let sink = common::make_sink(fmt, 1 << 20);
    assert!(matches!(sink.buffer_get(false), BufferGetResult::No));
}
