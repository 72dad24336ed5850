//! `Playlist`: an ordered list of files plus the control surface that
//! drives the decoder thread (spec §3 "Playlist", §4.H, §4.I).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use crate::decoder;
use crate::file::File;
use crate::sink::Sink;
use crate::sink_map::SinkMap;

/// Stable identity for a playlist item. Unlike the original's pointer
/// identity, this survives being looked up from any thread without holding
/// a reference to the node itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub(crate) u64);

fn next_item_id() -> ItemId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    ItemId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Which backpressure policy `detect_full_sinks` applies (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillMode {
    /// Stop decoding as soon as any sink is full; resume once every sink
    /// has room again. Default.
    AnySinkFull,
    /// Keep decoding until every sink is full.
    EverySinkFull,
}

impl Default for FillMode {
    fn default() -> Self {
        FillMode::AnySinkFull
    }
}

pub(crate) struct ItemNode {
    pub file: Arc<File>,
    pub gain: f64,
    pub peak: f64,
    pub prev: Option<ItemId>,
    pub next: Option<ItemId>,
}

/// State mutated under `PlaylistShared::state`, the single
/// `decode_head_mutex` spec §5's lock order puts at the top (everything
/// else — file seek slots, the drain cond, sink queues, buffer refcounts —
/// nests underneath it).
pub(crate) struct PlaylistState {
    pub items: HashMap<ItemId, ItemNode>,
    pub head: Option<ItemId>,
    pub tail: Option<ItemId>,
    pub count: usize,
    pub decode_head: Option<ItemId>,
    pub playlist_gain: f64,
    pub paused: bool,
    pub fill_mode: FillMode,
    pub purge_item: Option<ItemId>,
    pub sent_end_of_q: bool,
    pub quit: bool,
    pub rebuild_graph: bool,
    pub sink_map: SinkMap,
}

/// Everything the decoder thread and control-surface callers share.
/// Lives behind an `Arc` so the thread can outlive the `Playlist` handle
/// long enough to notice `quit` and exit.
pub(crate) struct PlaylistShared {
    pub state: Mutex<PlaylistState>,
    pub decode_head_cond: Condvar,
    /// Paired `(Mutex<()>, Condvar)` the decoder thread waits on when
    /// backpressure stalls it (spec §5 "sink_drain_cond"). Wrapped in an
    /// `Arc` so attached sinks can be pointed at it directly (see
    /// `Sink::set_drain_target`) instead of only being noticed on the
    /// decoder's poll timeout.
    pub drain: Arc<(Mutex<()>, Condvar)>,
}

/// A doubly-linked ordered list of media files, decoded by one dedicated
/// background thread (spec §5 "Threads").
pub struct Playlist {
    pub(crate) shared: Arc<PlaylistShared>,
    decoder_thread: Option<JoinHandle<()>>,
}

impl Playlist {
    pub fn new() -> Playlist {
        let shared = Arc::new(PlaylistShared {
            state: Mutex::new(PlaylistState {
                items: HashMap::new(),
                head: None,
                tail: None,
                count: 0,
                decode_head: None,
                playlist_gain: 1.0,
                paused: false,
                fill_mode: FillMode::default(),
                purge_item: None,
                sent_end_of_q: false,
                quit: false,
                rebuild_graph: true,
                sink_map: SinkMap::new(),
            }),
            decode_head_cond: Condvar::new(),
            drain: Arc::new((Mutex::new(()), Condvar::new())),
        });

        let decoder_shared = shared.clone();
        let decoder_thread = std::thread::spawn(move || decoder::run(decoder_shared));

        Playlist {
            shared,
            decoder_thread: Some(decoder_thread),
        }
    }

    /// Insert `file` before `next_item` (or at the tail if `next_item` is
    /// `None`), assuming an unknown peak of `1.0` — "may hit full scale".
    /// Use [`insert_with_peak`](Self::insert_with_peak) when the caller has
    /// already measured the item's true peak.
    pub fn insert(&self, file: Arc<File>, gain: f64, next_item: Option<ItemId>) -> ItemId {
        self.insert_with_peak(file, gain, 1.0, next_item)
    }

    /// Insert `file` before `next_item` (or at the tail if `next_item` is
    /// `None`) with a known replaygain peak. If the playlist was empty, the
    /// new item becomes the decode head and is armed to start at t=0 (spec
    /// §4.H, §8 "Boundary behaviors").
    pub fn insert_with_peak(&self, file: Arc<File>, gain: f64, peak: f64, next_item: Option<ItemId>) -> ItemId {
        let id = next_item_id();
        let mut state = self.shared.state.lock().unwrap();

        let (prev, next) = match next_item {
            Some(next_id) if state.items.contains_key(&next_id) => {
                let prev = state.items[&next_id].prev;
                (prev, Some(next_id))
            }
            _ => (state.tail, None),
        };

        if let Some(p) = prev {
            state.items.get_mut(&p).unwrap().next = Some(id);
        } else {
            state.head = Some(id);
        }
        if let Some(n) = next {
            state.items.get_mut(&n).unwrap().prev = Some(id);
        } else {
            state.tail = Some(id);
        }

        let was_empty = state.decode_head.is_none() && state.count == 0;
        state.items.insert(
            id,
            ItemNode {
                file: file.clone(),
                gain,
                peak,
                prev,
                next,
            },
        );
        state.count += 1;

        if was_empty {
            file.request_seek(0.0, false);
            state.decode_head = Some(id);
            state.sent_end_of_q = false;
            drop(state);
            self.shared.decode_head_cond.notify_all();
            tracing::debug!(item = id.0, "inserted into empty playlist, armed decode head");
            return id;
        }
        drop(state);
        tracing::debug!(item = id.0, "inserted");
        id
    }

    /// Unlink `item`. If it was the decode head, decoding advances to its
    /// successor. Every sink's queue is purged of buffers belonging to the
    /// removed item (spec §4.H).
    pub fn remove(&self, item: ItemId) {
        let mut state = self.shared.state.lock().unwrap();
        let node = match state.items.remove(&item) {
            Some(n) => n,
            None => return,
        };

        if let Some(p) = node.prev {
            state.items.get_mut(&p).unwrap().next = node.next;
        } else {
            state.head = node.next;
        }
        if let Some(n) = node.next {
            state.items.get_mut(&n).unwrap().prev = node.prev;
        } else {
            state.tail = node.prev;
        }
        state.count = state.count.saturating_sub(1);

        if state.decode_head == Some(item) {
            state.decode_head = node.next;
        }

        state.purge_item = Some(item);
        for sink in state.sink_map.all_sinks() {
            sink.set_purge_item(Some(item));
            sink.purge();
            sink.set_purge_item(None);
        }
        state.purge_item = None;

        drop(state);
        self.signal_drain();
        self.shared.decode_head_cond.notify_all();
        tracing::debug!(item = item.0, "removed");
    }

    /// Remove every item.
    pub fn clear(&self) {
        let ids: Vec<ItemId> = {
            let state = self.shared.state.lock().unwrap();
            state.items.keys().copied().collect()
        };
        for id in ids {
            self.remove(id);
        }
    }

    pub fn count(&self) -> usize {
        self.shared.state.lock().unwrap().count
    }

    pub fn head(&self) -> Option<ItemId> {
        self.shared.state.lock().unwrap().head
    }

    pub fn tail(&self) -> Option<ItemId> {
        self.shared.state.lock().unwrap().tail
    }

    pub fn play(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if state.paused {
            state.paused = false;
            for sink in state.sink_map.all_sinks() {
                sink.play();
            }
        }
    }

    pub fn pause(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if !state.paused {
            state.paused = true;
            for sink in state.sink_map.all_sinks() {
                sink.pause();
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        !self.shared.state.lock().unwrap().paused
    }

    /// Seek the given item to `seconds`, make it the decode head, and flush
    /// downstream queues (spec §4.H).
    pub fn seek(&self, item: ItemId, seconds: f64) {
        let mut state = self.shared.state.lock().unwrap();
        if let Some(node) = state.items.get(&item) {
            node.file.request_seek(seconds, true);
            state.decode_head = Some(item);
            state.sent_end_of_q = false;
        }
        drop(state);
        self.shared.decode_head_cond.notify_all();
    }

    /// Current decode position in seconds within the decode head's file,
    /// or `None` if nothing is decoding.
    pub fn position(&self) -> Option<f64> {
        let state = self.shared.state.lock().unwrap();
        state
            .decode_head
            .and_then(|id| state.items.get(&id))
            .map(|node| node.file.decode_clock())
    }

    pub fn set_gain(&self, gain: f64) {
        let mut state = self.shared.state.lock().unwrap();
        state.playlist_gain = gain;
        state.rebuild_graph = true;
    }

    pub fn set_item_gain_peak(&self, item: ItemId, gain: f64, peak: f64) {
        let mut state = self.shared.state.lock().unwrap();
        let is_head = state.decode_head == Some(item);
        if let Some(node) = state.items.get_mut(&item) {
            node.gain = gain;
            node.peak = peak;
        }
        if is_head {
            state.rebuild_graph = true;
        }
    }

    pub fn set_fill_mode(&self, mode: FillMode) {
        self.shared.state.lock().unwrap().fill_mode = mode;
        self.signal_drain();
    }

    /// Attach `sink` to this playlist's sink map (spec §4.D), reset its
    /// queue, point its drain signal at this playlist's decoder, and wake
    /// the decoder so it reconsiders fill state.
    pub fn attach_sink(&self, sink: Arc<Sink>) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.sink_map.attach(sink.clone());
            state.rebuild_graph = true;
        }
        sink.set_drain_target(self.shared.drain.clone());
        sink.mark_attached();
        self.signal_drain();
        self.shared.decode_head_cond.notify_all();
    }

    /// Detach `sink`: abort its queue (unblocking any in-flight
    /// `buffer_get`), flush it, remove it from the sink map, and revert its
    /// drain signal to its own private condvar (spec §8 "attach; detach
    /// returns sink to the exact pre-attach observable state").
    pub fn detach_sink(&self, sink: &Arc<Sink>) {
        sink.abort_queue();
        sink.flush();
        {
            let mut state = self.shared.state.lock().unwrap();
            state.sink_map.detach(sink.id());
            state.rebuild_graph = true;
        }
        sink.mark_detached();
        sink.reset_queue();
        sink.clear_drain_target();
    }

    /// Changes an attached sink's gain and re-runs the group-placement
    /// decision, since a new gain can change which group it belongs to
    /// (spec §4.H `sink.set_gain`: "removes and re-adds the sink... marks
    /// rebuild"). Unlike [`Playlist::detach_sink`] this never touches the
    /// sink's queue contents or aborts an in-flight `buffer_get` — only
    /// group membership is recomputed.
    pub fn sink_set_gain(&self, sink: &Arc<Sink>, gain: f64) {
        sink.set_gain_value(gain);
        let mut state = self.shared.state.lock().unwrap();
        if sink.is_attached() {
            state.sink_map.detach(sink.id());
            state.sink_map.attach(sink.clone());
            state.rebuild_graph = true;
        }
        drop(state);
        self.signal_drain();
    }

    fn signal_drain(&self) {
        let (lock, cvar) = &*self.shared.drain;
        let _guard = lock.lock().unwrap();
        cvar.notify_all();
    }
}

impl Default for Playlist {
    fn default() -> Self {
        Playlist::new()
    }
}

impl Drop for Playlist {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.quit = true;
        }
        self.shared.decode_head_cond.notify_all();
        {
            let (lock, cvar) = &*self.shared.drain;
            let _guard = lock.lock().unwrap();
            cvar.notify_all();
        }
        if let Some(handle) = self.decoder_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SineSource;
    use crate::format::{AudioFormat, ChannelLayout, SampleFormat};
    use crate::sink::{NoCallbacks, SinkFormatSpec};

    fn sine_file(duration: f64) -> Arc<File> {
        let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
        Arc::new(File::from_source(Box::new(SineSource::new(fmt, 440.0, duration))))
    }

    fn accept_any_spec() -> SinkFormatSpec {
        SinkFormatSpec {
            sample_rates: vec![0..=192_000],
            channel_layouts: vec![ChannelLayout::mono(), ChannelLayout::stereo()],
            sample_formats: vec![
                SampleFormat::U8,
                SampleFormat::S16,
                SampleFormat::S24,
                SampleFormat::S32,
                SampleFormat::F32,
                SampleFormat::F64,
            ],
            block_size: 0,
            planar_ok: true,
            interleaved_ok: true,
        }
    }

    #[test]
    fn insert_into_empty_playlist_arms_decode_head() {
        let playlist = Playlist::new();
        let id = playlist.insert(sine_file(1.0), 1.0, None);
        assert_eq!(playlist.head(), Some(id));
        assert_eq!(playlist.count(), 1);
    }

    #[test]
    fn remove_decode_head_advances_to_next() {
        let playlist = Playlist::new();
        let first = playlist.insert(sine_file(1.0), 1.0, None);
        let second = playlist.insert(sine_file(1.0), 1.0, None);
        playlist.remove(first);
        let state = playlist.shared.state.lock().unwrap();
        assert_eq!(state.decode_head, Some(second));
        assert_eq!(state.count, 1);
    }

    #[test]
    fn attach_and_detach_round_trip_leaves_sink_usable() {
        let playlist = Playlist::new();
        let sink = Sink::new(accept_any_spec(), 1.0, 1 << 20, Box::new(NoCallbacks));
        playlist.attach_sink(sink.clone());
        assert!(sink.is_attached());
        playlist.detach_sink(&sink);
        assert!(!sink.is_attached());
        assert_eq!(sink.bytes_queued(), 0);
    }

    #[test]
    fn sink_set_gain_regroups_an_attached_sink() {
        let playlist = Playlist::new();
        let a = Sink::new(accept_any_spec(), 1.0, 1 << 20, Box::new(NoCallbacks));
        let b = Sink::new(accept_any_spec(), 1.0, 1 << 20, Box::new(NoCallbacks));
        playlist.attach_sink(a.clone());
        playlist.attach_sink(b.clone());
        {
            let state = playlist.shared.state.lock().unwrap();
            assert_eq!(state.sink_map.groups().len(), 1, "equal gain should share a group");
        }

        playlist.sink_set_gain(&b, 0.25);
        assert_eq!(b.gain(), 0.25);
        {
            let state = playlist.shared.state.lock().unwrap();
            assert_eq!(
                state.sink_map.groups().len(),
                2,
                "differing gain should split into its own group"
            );
        }
    }

    #[test]
    fn play_pause_toggle_is_playing() {
        let playlist = Playlist::new();
        assert!(playlist.is_playing());
        playlist.pause();
        assert!(!playlist.is_playing());
        playlist.play();
        assert!(playlist.is_playing());
    }
}
