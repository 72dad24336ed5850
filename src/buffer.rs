//! Reference-counted audio buffers.
//!
//! A [`Buffer`] is immutable once published: no field is mutated after
//! construction. Sharing is `Arc`-based, so `Arc::clone`/`drop` already give
//! us the `ref`/`unref` pairing of the original C API — [`buffer_ref`] and
//! [`buffer_unref`] exist only to keep that vocabulary at the call site.

use std::sync::Arc;

use crate::format::AudioFormat;
use crate::playlist::ItemId;

/// What a buffer carries: either decoded PCM frames or an opaque encoded
/// packet (frame count is always 0 for the latter).
#[derive(Debug, Clone)]
pub enum BufferPayload {
    /// Interleaved or planar PCM, already in the buffer's `format`.
    Frame(Arc<[u8]>),
    /// Opaque encoded bytes (used by encoder-style sinks upstream of this
    /// crate's scope; carried here only as a payload variant).
    Packet(Arc<[u8]>),
}

/// One immutable chunk of audio, reference-counted between the decoder and
/// every sink it was enqueued to.
#[derive(Debug, Clone)]
pub struct Buffer {
    payload: BufferPayload,
    format: AudioFormat,
    frame_count: usize,
    size_bytes: usize,
    pts: i64,
    /// Decode position in seconds inside the owning item.
    pos_seconds: f64,
    /// The playlist item this buffer was decoded from, or `None` for a
    /// format header/trailer buffer with no associated item.
    item: Option<ItemId>,
}

/// Shared, reference-counted handle to a [`Buffer`]. This is the type that
/// flows through queues and sinks.
pub type BufferRef = Arc<Buffer>;

impl Buffer {
    pub fn new_frame(
        data: Arc<[u8]>,
        format: AudioFormat,
        frame_count: usize,
        pts: i64,
        pos_seconds: f64,
        item: Option<ItemId>,
    ) -> BufferRef {
        let size_bytes = data.len();
        Arc::new(Buffer {
            payload: BufferPayload::Frame(data),
            format,
            frame_count,
            size_bytes,
            pts,
            pos_seconds,
            item,
        })
    }

    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Total payload size in bytes — what sink queue accounting (spec
    /// §4.G) sums to get `bytes_queued`.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn pts(&self) -> i64 {
        self.pts
    }

    pub fn pos_seconds(&self) -> f64 {
        self.pos_seconds
    }

    pub fn item(&self) -> Option<ItemId> {
        self.item
    }

    pub fn payload(&self) -> &BufferPayload {
        &self.payload
    }

    /// Raw bytes of the payload, regardless of variant.
    pub fn bytes(&self) -> &[u8] {
        match &self.payload {
            BufferPayload::Frame(b) => b,
            BufferPayload::Packet(b) => b,
        }
    }
}

/// Add one reference to a buffer. Thread-safe; mirrors `Arc::clone`.
pub fn buffer_ref(buf: &BufferRef) -> BufferRef {
    Arc::clone(buf)
}

/// Drop one reference to a buffer. The underlying payload is released when
/// the last reference is dropped.
pub fn buffer_unref(buf: BufferRef) {
    drop(buf)
}

/// What travels through a sink's queue: either a real buffer, or the
/// distinguished end-of-playlist marker. This replaces the C original's
/// single process-wide sentinel pointer with a tagged variant scoped to
/// the queue itself (Design Note 9 "Sentinel vs tagged result" /
/// "Global sentinel").
#[derive(Debug, Clone)]
pub enum QueueItem {
    Buffer(BufferRef),
    EndOfPlaylist,
}

impl QueueItem {
    pub fn size_bytes(&self) -> usize {
        match self {
            QueueItem::Buffer(b) => b.size_bytes(),
            QueueItem::EndOfPlaylist => 0,
        }
    }

    pub fn item(&self) -> Option<ItemId> {
        match self {
            QueueItem::Buffer(b) => b.item(),
            QueueItem::EndOfPlaylist => None,
        }
    }

    pub fn is_end_of_playlist(&self) -> bool {
        matches!(self, QueueItem::EndOfPlaylist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{ChannelLayout, SampleFormat};

    fn sample_format() -> AudioFormat {
        AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false)
    }

    #[test]
    fn refcount_stays_at_least_one_until_last_drop() {
        let buf = Buffer::new_frame(Arc::from(vec![0u8; 16]), sample_format(), 4, 0, 0.0, None);
        assert_eq!(Arc::strong_count(&buf), 1);

        let r2 = buffer_ref(&buf);
        assert_eq!(Arc::strong_count(&buf), 2);

        buffer_unref(r2);
        assert_eq!(Arc::strong_count(&buf), 1);
    }

    #[test]
    fn end_of_playlist_is_not_a_real_buffer() {
        let item = QueueItem::EndOfPlaylist;
        assert!(item.is_end_of_playlist());
        assert_eq!(item.size_bytes(), 0);
    }
}
