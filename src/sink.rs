//! `Sink`: a consumer-owned description of acceptable formats plus a
//! bounded queue (spec §3 "Sink", §4.G).

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::buffer::{BufferRef, QueueItem};
use crate::format::{AudioFormat, ChannelLayout, SampleFormat};
use crate::playlist::ItemId;
use crate::queue::{GetResult, Queue, QueueHooks};

/// Stable identity for a sink, used by the sink map and by log messages —
/// sinks themselves live behind `Arc` so callers can hold one past detach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkId(u64);

fn next_sink_id() -> SinkId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    SinkId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// The set of formats a sink is willing to accept. Compared against other
/// sinks' *resolved* format (never against another spec) to decide group
/// membership (spec §4.D).
#[derive(Debug, Clone)]
pub struct SinkFormatSpec {
    pub sample_rates: Vec<RangeInclusive<u32>>,
    pub channel_layouts: Vec<ChannelLayout>,
    pub sample_formats: Vec<SampleFormat>,
    /// Required frame-block size; `0` means "any size is fine".
    pub block_size: usize,
    pub planar_ok: bool,
    pub interleaved_ok: bool,
}

impl SinkFormatSpec {
    /// A spec that locks onto exactly one concrete format (spec §6
    /// `set_only_format`).
    pub fn exact(format: AudioFormat) -> SinkFormatSpec {
        SinkFormatSpec {
            sample_rates: vec![format.sample_rate..=format.sample_rate],
            channel_layouts: vec![format.channel_layout.clone()],
            sample_formats: vec![format.sample_format],
            block_size: 0,
            planar_ok: format.is_planar,
            interleaved_ok: !format.is_planar,
        }
    }

    pub fn accepts_rate(&self, rate: u32) -> bool {
        self.sample_rates.iter().any(|r| r.contains(&rate))
    }

    pub fn accepts_format(&self, fmt: &AudioFormat) -> bool {
        self.accepts_rate(fmt.sample_rate)
            && self.sample_formats.contains(&fmt.sample_format)
            && self.channel_layouts.contains(&fmt.channel_layout)
            && ((fmt.is_planar && self.planar_ok) || (!fmt.is_planar && self.interleaved_ok))
    }

    /// Picks a concrete format this spec accepts, reusing `input`'s fields
    /// wherever they're already acceptable so `aformat` only has to touch
    /// what actually needs converting (spec §4.E "per-group aformat").
    pub fn preferred_format(&self, input: &AudioFormat) -> AudioFormat {
        let rate = if self.accepts_rate(input.sample_rate) {
            input.sample_rate
        } else {
            self.sample_rates
                .first()
                .map(|r| *r.start())
                .unwrap_or(input.sample_rate)
        };
        let layout = if self.channel_layouts.contains(&input.channel_layout) {
            input.channel_layout.clone()
        } else {
            self.channel_layouts
                .first()
                .cloned()
                .unwrap_or_else(|| input.channel_layout.clone())
        };
        let sample_format = if self.sample_formats.contains(&input.sample_format) {
            input.sample_format
        } else {
            self.sample_formats
                .first()
                .copied()
                .unwrap_or(input.sample_format)
        };
        let is_planar = if input.is_planar && self.planar_ok {
            true
        } else if !input.is_planar && self.interleaved_ok {
            false
        } else {
            self.planar_ok && !self.interleaved_ok
        };
        AudioFormat::new(rate, layout, sample_format, is_planar)
    }

    /// Block-size compatibility half of the "accepted" test (spec §4.D):
    /// matches iff the sizes are equal, or the new sink asks for `0`.
    pub fn block_size_compatible(&self, other_block_size: usize) -> bool {
        self.block_size == other_block_size || self.block_size == 0
    }
}

/// Optional hooks a sink's owner can receive (spec §3 "Sink").
pub trait SinkCallbacks: Send + Sync {
    fn buffer_filled(&self, _buf: &BufferRef) {}
    fn flush(&self) {}
    fn purge(&self) {}
    fn pause(&self) {}
    fn play(&self) {}
}

/// Callback set that does nothing; the default for sinks that only poll.
pub struct NoCallbacks;
impl SinkCallbacks for NoCallbacks {}

struct SinkQueueHooks {
    bytes_queued: AtomicUsize,
    contains_sentinel: AtomicBool,
    capacity: Mutex<usize>,
    /// Which drain condvar to notify when `bytes_queued` drops below
    /// capacity. Defaults to a private one nobody else waits on (so a
    /// detached sink's bookkeeping still works in isolation); `Playlist`
    /// repoints this at its own `drain_cond` on attach (spec §9, Open
    /// Question a) so the decoder thread — which waits on the
    /// playlist-level cond, not a per-sink one — actually wakes up instead
    /// of only noticing on its next poll timeout.
    drain: Mutex<std::sync::Arc<(Mutex<()>, std::sync::Condvar)>>,
    purge_item: Mutex<Option<ItemId>>,
}

impl QueueHooks<QueueItem> for SinkQueueHooks {
    fn on_put(&self, item: &QueueItem) {
        if item.is_end_of_playlist() {
            self.contains_sentinel.store(true, Ordering::SeqCst);
        } else {
            self.bytes_queued
                .fetch_add(item.size_bytes(), Ordering::SeqCst);
        }
    }

    fn on_get(&self, item: &QueueItem) {
        if item.is_end_of_playlist() {
            self.contains_sentinel.store(false, Ordering::SeqCst);
        } else {
            self.bytes_queued
                .fetch_sub(item.size_bytes(), Ordering::SeqCst);
        }
        let capacity = *self.capacity.lock().unwrap();
        if self.bytes_queued.load(Ordering::SeqCst) < capacity {
            let target = self.drain.lock().unwrap().clone();
            let (lock, cvar) = &*target;
            let _guard = lock.lock().unwrap();
            cvar.notify_all();
        }
    }

    fn on_purge(&self, item: &QueueItem) -> bool {
        match (*self.purge_item.lock().unwrap(), item.item()) {
            (Some(purging), Some(owner)) => purging == owner,
            _ => false,
        }
    }

    fn on_cleanup(&self, item: QueueItem) {
        if item.is_end_of_playlist() {
            self.contains_sentinel.store(false, Ordering::SeqCst);
        } else {
            self.bytes_queued
                .fetch_sub(item.size_bytes(), Ordering::SeqCst);
        }
    }
}

/// A consumer-owned sink: acceptable formats, gain, bounded queue, and the
/// runtime counters the decoder's backpressure logic reads (spec §3, §4.G).
pub struct Sink {
    id: SinkId,
    spec: Mutex<SinkFormatSpec>,
    gain: Mutex<f64>,
    callbacks: Box<dyn SinkCallbacks>,
    queue: Queue<QueueItem, SinkQueueHooks>,
    attached: AtomicBool,
    playing: AtomicBool,
    /// The sink's own drain condvar, restored whenever it's detached (or
    /// never attached at all) so its bookkeeping stays self-contained.
    private_drain: std::sync::Arc<(Mutex<()>, std::sync::Condvar)>,
}

impl Sink {
    pub fn new(
        spec: SinkFormatSpec,
        gain: f64,
        buffer_size_bytes: usize,
        callbacks: Box<dyn SinkCallbacks>,
    ) -> std::sync::Arc<Sink> {
        let private_drain = std::sync::Arc::new((Mutex::new(()), std::sync::Condvar::new()));
        let hooks = SinkQueueHooks {
            bytes_queued: AtomicUsize::new(0),
            contains_sentinel: AtomicBool::new(false),
            capacity: Mutex::new(buffer_size_bytes),
            drain: Mutex::new(private_drain.clone()),
            purge_item: Mutex::new(None),
        };
        std::sync::Arc::new(Sink {
            id: next_sink_id(),
            spec: Mutex::new(spec),
            gain: Mutex::new(gain),
            callbacks,
            queue: Queue::with_hooks(hooks),
            attached: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            private_drain,
        })
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    /// Format fields are read only at attach time (spec §9, Open Question
    /// c): this changes what the *next* attach sees, not the group a
    /// currently-attached sink already joined.
    pub fn set_only_format(&self, format: AudioFormat) {
        *self.spec.lock().unwrap() = SinkFormatSpec::exact(format);
    }

    pub fn spec(&self) -> SinkFormatSpec {
        self.spec.lock().unwrap().clone()
    }

    pub fn gain(&self) -> f64 {
        *self.gain.lock().unwrap()
    }

    pub fn set_gain_value(&self, gain: f64) {
        *self.gain.lock().unwrap() = gain;
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_attached(&self) {
        self.attached.store(true, Ordering::SeqCst);
        self.queue.reset();
    }

    pub(crate) fn mark_detached(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }

    pub(crate) fn callbacks(&self) -> &dyn SinkCallbacks {
        self.callbacks.as_ref()
    }

    pub fn play(&self) {
        if !self.playing.swap(true, Ordering::SeqCst) {
            self.callbacks.play();
        }
    }

    pub fn pause(&self) {
        if self.playing.swap(false, Ordering::SeqCst) {
            self.callbacks.pause();
        }
    }

    /// Enqueue a buffer (or the end-of-playlist marker) and fire
    /// `buffer_filled` for real buffers.
    pub(crate) fn enqueue(&self, item: QueueItem) {
        if let QueueItem::Buffer(buf) = &item {
            self.callbacks.buffer_filled(buf);
        }
        self.queue.put(item);
    }

    pub fn buffer_get(&self, block: bool) -> BufferGetResult {
        match self.queue.get(block) {
            GetResult::Item(QueueItem::Buffer(b)) => BufferGetResult::Yes(b),
            GetResult::Item(QueueItem::EndOfPlaylist) => BufferGetResult::End,
            GetResult::Empty => BufferGetResult::No,
            GetResult::Aborted => BufferGetResult::No,
        }
    }

    pub fn buffer_peek(&self, block: bool) -> BufferGetResult {
        match self.queue.peek(block) {
            GetResult::Item(QueueItem::Buffer(b)) => BufferGetResult::Yes(b),
            GetResult::Item(QueueItem::EndOfPlaylist) => BufferGetResult::End,
            GetResult::Empty => BufferGetResult::No,
            GetResult::Aborted => BufferGetResult::No,
        }
    }

    pub fn set_buffer_size_bytes(&self, capacity: usize) {
        let increased = capacity > self.queue_capacity();
        self.set_queue_capacity(capacity);
        if increased {
            self.signal_drain();
        }
    }

    fn queue_capacity(&self) -> usize {
        *self.hooks().capacity.lock().unwrap()
    }

    fn set_queue_capacity(&self, capacity: usize) {
        *self.hooks().capacity.lock().unwrap() = capacity;
    }

    fn hooks(&self) -> &SinkQueueHooks {
        self.queue.hooks()
    }

    fn signal_drain(&self) {
        let target = self.hooks().drain.lock().unwrap().clone();
        let (lock, cvar) = &*target;
        let _guard = lock.lock().unwrap();
        cvar.notify_all();
    }

    /// Point this sink's drain notifications at `target` instead of its own
    /// private condvar. Called by `Playlist::attach_sink` so that draining
    /// this sink wakes the owning playlist's decoder thread directly,
    /// rather than only being noticed on the decoder's next poll.
    pub(crate) fn set_drain_target(&self, target: std::sync::Arc<(Mutex<()>, std::sync::Condvar)>) {
        *self.hooks().drain.lock().unwrap() = target;
    }

    /// Revert to the sink's own private drain condvar (spec §8 "attach;
    /// detach returns sink to the exact pre-attach observable state").
    pub(crate) fn clear_drain_target(&self) {
        *self.hooks().drain.lock().unwrap() = self.private_drain.clone();
    }

    pub fn bytes_queued(&self) -> usize {
        self.hooks().bytes_queued.load(Ordering::SeqCst)
    }

    pub fn is_full(&self) -> bool {
        self.bytes_queued() >= self.queue_capacity()
    }

    pub fn contains_end_of_playlist(&self) -> bool {
        self.hooks().contains_sentinel.load(Ordering::SeqCst)
    }

    pub fn get_fill_level(&self) -> usize {
        self.bytes_queued()
    }

    pub(crate) fn set_purge_item(&self, item: Option<ItemId>) {
        *self.hooks().purge_item.lock().unwrap() = item;
    }

    pub(crate) fn purge(&self) {
        self.queue.purge();
        self.callbacks.purge();
    }

    pub(crate) fn flush(&self) {
        self.queue.flush();
        self.callbacks.flush();
    }

    pub(crate) fn abort_queue(&self) {
        self.queue.abort();
    }

    pub(crate) fn reset_queue(&self) {
        self.queue.reset();
    }
}

/// Result of `buffer_get`/`buffer_peek` (spec §4.H).
#[derive(Debug)]
pub enum BufferGetResult {
    Yes(BufferRef),
    No,
    End,
}
