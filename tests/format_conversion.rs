//! Scenario S2 (spec §8): a sink whose preferred format differs from the
//! source in every axis (rate, channel layout, sample format, interleaving)
//! only ever sees buffers already converted to its own shape.

mod common;

use common::{drain_all, make_sink, pcm_stereo_44100};
use groove::{AudioFormat, ChannelLayout, Playlist, SampleFormat};

#[test]
fn every_delivered_buffer_already_matches_the_sinks_preferred_format() {
    let sink_fmt = AudioFormat::new(48_000, ChannelLayout::mono(), SampleFormat::F32, false);
    let source_fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);

    let sink = make_sink(sink_fmt.clone(), 1 << 20);
    let playlist = Playlist::new();
    playlist.attach_sink(sink.clone());
    playlist.insert(pcm_stereo_44100(0.2), 1.0, None);

    let (buffers, hit_end) = drain_all(&sink);
    assert!(hit_end);
    assert!(!buffers.is_empty());

    for buf in &buffers {
        assert_eq!(buf.format(), &sink_fmt);
        assert_ne!(buf.format(), &source_fmt);
        assert_eq!(buf.size_bytes(), buf.frame_count() * sink_fmt.bytes_per_frame());
    }
}
