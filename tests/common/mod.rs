//! Shared scaffolding for the scenario tests (spec §8 "End-to-end
//! scenarios"). Every scenario opens a [`SineSource`] directly through
//! [`File::from_source`] rather than a real [`SourceOpener`], since this
//! crate ships no codec of its own.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use groove::{
    AudioFormat, BufferGetResult, BufferRef, ChannelLayout, File, NoCallbacks, SampleFormat, Sink,
    SinkCallbacks, SinkFormatSpec, SineSource,
};

pub fn pcm_stereo_44100(duration_seconds: f64) -> Arc<File> {
    let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
    Arc::new(File::from_source(Box::new(
        SineSource::new(fmt, 440.0, duration_seconds).with_block_frames(512),
    )))
}

pub fn exact_spec(fmt: &AudioFormat) -> SinkFormatSpec {
    SinkFormatSpec::exact(fmt.clone())
}

pub fn make_sink(fmt: AudioFormat, buffer_size_bytes: usize) -> Arc<Sink> {
    Sink::new(exact_spec(&fmt), 1.0, buffer_size_bytes, Box::new(NoCallbacks))
}

/// Drains every buffer a sink currently has, blocking, until `END` or
/// `NO` (non-blocking empty never happens here since we always block).
pub fn drain_all(sink: &Sink) -> (Vec<BufferRef>, bool) {
    let mut buffers = Vec::new();
    loop {
        match sink.buffer_get(true) {
            BufferGetResult::Yes(b) => buffers.push(b),
            BufferGetResult::End => return (buffers, true),
            BufferGetResult::No => return (buffers, false),
        }
    }
}

pub fn wait_until(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = std::time::Instant::now();
    while !cond() {
        if start.elapsed() > timeout {
            return false;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    true
}

/// Callback set that records flush/buffer_filled calls for ordering
/// assertions (spec §8 "Mid-play seek with flush"). `recording_callbacks`
/// returns the boxed callbacks to hand to `Sink::new` plus a handle the
/// test keeps to inspect what fired.
struct RecordingCallbacks {
    events: Arc<Mutex<Vec<&'static str>>>,
    filled_count: Arc<AtomicUsize>,
}

impl SinkCallbacks for RecordingCallbacks {
    fn buffer_filled(&self, _buf: &BufferRef) {
        self.filled_count.fetch_add(1, Ordering::SeqCst);
    }

    fn flush(&self) {
        self.events.lock().unwrap().push("flush");
    }

    fn purge(&self) {
        self.events.lock().unwrap().push("purge");
    }

    fn pause(&self) {
        self.events.lock().unwrap().push("pause");
    }

    fn play(&self) {
        self.events.lock().unwrap().push("play");
    }
}

pub struct RecordingHandle {
    events: Arc<Mutex<Vec<&'static str>>>,
    filled_count: Arc<AtomicUsize>,
}

impl RecordingHandle {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn filled_count(&self) -> usize {
        self.filled_count.load(Ordering::SeqCst)
    }
}

pub fn recording_callbacks() -> (Box<dyn SinkCallbacks>, RecordingHandle) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let filled_count = Arc::new(AtomicUsize::new(0));
    let callbacks = RecordingCallbacks {
        events: events.clone(),
        filled_count: filled_count.clone(),
    };
    let handle = RecordingHandle {
        events,
        filled_count,
    };
    (Box::new(callbacks), handle)
}
