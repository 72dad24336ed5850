//! `File`: an opened media source plus its seek/decode state (spec §4.C).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::codec::{MediaSource, Metadata};
use crate::error::{GrooveError, Result};
use crate::format::AudioFormat;

bitflags::bitflags! {
    /// Flags governing `metadata_get`/`metadata_set` (spec §6 "Flags").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetadataFlags: u32 {
        /// Key comparison is case-sensitive (the default is
        /// case-insensitive, matching `libav`'s `AVDictionary`).
        const MATCH_CASE = 0b001;
        /// `metadata_set` is a no-op if the key already has a value.
        const DONT_OVERWRITE = 0b010;
        /// `metadata_set` concatenates onto the existing value (no
        /// delimiter) instead of replacing it.
        const APPEND = 0b100;
    }
}

/// Seek-whence values the custom-IO boundary supports, extending the usual
/// start/current/end with the two the original adds: `Size` ("report total
/// size, don't actually seek") and `Force` ("seek even if the source thinks
/// that's slow") — spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
    Start,
    Current,
    End,
    Size,
    Force,
}

/// Caller-supplied I/O hooks for opening a file from something other than
/// a filesystem path (spec §4.C "Opening").
pub struct CustomIo {
    pub read: Box<dyn FnMut(&mut [u8]) -> i64 + Send>,
    pub write: Box<dyn FnMut(&[u8]) -> i64 + Send>,
    pub seek: Box<dyn FnMut(i64, SeekWhence) -> i64 + Send>,
}

/// The seam through which a real codec/filter engine opens media (spec
/// §6). This crate ships no implementation other than test doubles;
/// callers provide one backed by their decoding library of choice.
pub trait SourceOpener: Send + Sync {
    fn open_path(&self, path: &Path, hint: Option<&str>) -> Result<Box<dyn MediaSource>>;
    fn open_custom(&self, io: CustomIo, hint: Option<&str>) -> Result<Box<dyn MediaSource>>;
}

/// A pending seek: the target position and whether it should also flush
/// downstream sink queues (spec §4.C "Seeking").
#[derive(Debug, Clone, Copy)]
pub struct SeekRequest {
    pub target_seconds: f64,
    pub flush: bool,
}

/// An opened media file: format probe results plus the mutable seek/decode
/// state the decoder thread advances. Created outside the core, inserted
/// into a playlist, removed before close — closing stays the caller's
/// responsibility (spec §3 "Lifecycles").
pub struct File {
    source: Mutex<Box<dyn MediaSource>>,
    seek_slot: Mutex<Option<SeekRequest>>,
    ever_seeked: AtomicBool,
    abort: AtomicBool,
    eof: AtomicBool,
    decode_clock: Mutex<f64>,
    format: AudioFormat,
    duration: Option<f64>,
    short_names: Vec<String>,
    metadata: Mutex<Metadata>,
    dirty: AtomicBool,
    path: Mutex<Option<PathBuf>>,
}

impl File {
    /// Wrap an already-opened `MediaSource`. The real `open`/`open_custom`
    /// entry points below are thin wrappers around this plus a
    /// `SourceOpener`.
    pub fn from_source(source: Box<dyn MediaSource>) -> File {
        let format = source.format();
        let duration = source.duration();
        let short_names = source.short_names();
        let metadata = source.metadata();
        File {
            source: Mutex::new(source),
            seek_slot: Mutex::new(None),
            ever_seeked: AtomicBool::new(false),
            abort: AtomicBool::new(false),
            eof: AtomicBool::new(false),
            decode_clock: Mutex::new(0.0),
            format,
            duration,
            short_names,
            metadata: Mutex::new(metadata),
            dirty: AtomicBool::new(false),
            path: Mutex::new(None),
        }
    }

    pub fn open(path: impl AsRef<Path>, hint: Option<&str>, opener: &dyn SourceOpener) -> Result<File> {
        let path = path.as_ref();
        let source = opener.open_path(path, hint)?;
        let file = File::from_source(source);
        *file.path.lock().unwrap() = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), hint = ?hint, "file opened");
        Ok(file)
    }

    pub fn open_custom(io: CustomIo, hint: Option<&str>, opener: &dyn SourceOpener) -> Result<File> {
        let source = opener.open_custom(io, hint)?;
        tracing::debug!(hint = ?hint, "file opened from custom io");
        Ok(File::from_source(source))
    }

    pub fn audio_format(&self) -> AudioFormat {
        self.format.clone()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn short_names(&self) -> Vec<String> {
        self.short_names.clone()
    }

    fn key_matches(a: &str, b: &str, flags: MetadataFlags) -> bool {
        if flags.contains(MetadataFlags::MATCH_CASE) {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    }

    /// Looks up `key`, honoring `MATCH_CASE`. `prev` is the value returned
    /// by an earlier call under the same key — passing it resumes the scan
    /// just past that entry, so repeated calls walk every value stored
    /// under a duplicated key (spec §6 `metadata_get(key, prev, flags)`).
    pub fn metadata_get(&self, key: &str, prev: Option<&str>, flags: MetadataFlags) -> Option<String> {
        let meta = self.metadata.lock().unwrap();
        let mut seen_prev = prev.is_none();
        for (k, v) in meta.iter() {
            if !Self::key_matches(k, key, flags) {
                continue;
            }
            if seen_prev {
                return Some(v.clone());
            }
            if prev == Some(v.as_str()) {
                seen_prev = true;
            }
        }
        None
    }

    /// Sets, appends to, or removes `key` depending on `value`/`flags`
    /// (spec §6 `metadata_set(key, value, flags)`): `value = None` removes
    /// the entry; `DONT_OVERWRITE` leaves an existing entry untouched;
    /// `APPEND` concatenates the new value onto the old one with no
    /// delimiter, matching the original's `AV_DICT_APPEND`.
    pub fn metadata_set(&self, key: &str, value: Option<&str>, flags: MetadataFlags) {
        let mut meta = self.metadata.lock().unwrap();
        let pos = meta.iter().position(|(k, _)| Self::key_matches(k, key, flags));

        match value {
            None => {
                if let Some(idx) = pos {
                    meta.remove(idx);
                    self.dirty.store(true, Ordering::SeqCst);
                }
            }
            Some(v) => match pos {
                Some(idx) => {
                    if flags.contains(MetadataFlags::DONT_OVERWRITE) {
                        return;
                    }
                    if flags.contains(MetadataFlags::APPEND) {
                        meta[idx].1.push_str(v);
                    } else {
                        meta[idx].1 = v.to_string();
                    }
                    self.dirty.store(true, Ordering::SeqCst);
                }
                None => {
                    meta.push((key.to_string(), v.to_string()));
                    self.dirty.store(true, Ordering::SeqCst);
                }
            },
        }
    }

    /// Request a seek. Picked up by the decoder on its next decode step
    /// (spec §4.C). A seek to position zero on a file that has never been
    /// seeked is a no-op — the file already decodes from zero, so there is
    /// no header to reparse.
    pub fn request_seek(&self, target_seconds: f64, flush: bool) {
        if target_seconds == 0.0 && !self.ever_seeked.load(Ordering::SeqCst) {
            return;
        }
        tracing::debug!(target_seconds, flush, "seek requested");
        *self.seek_slot.lock().unwrap() = Some(SeekRequest {
            target_seconds,
            flush,
        });
    }

    /// Decoder-side: take the pending seek request, if any.
    pub fn take_pending_seek(&self) -> Option<SeekRequest> {
        self.seek_slot.lock().unwrap().take()
    }

    /// Whether a seek is queued that also wants to flush downstream sink
    /// queues — the one case spec §4.F lets the decoder override a full-sink
    /// stall for, since the seek is about to drain those queues anyway.
    pub fn has_pending_flush_seek(&self) -> bool {
        matches!(*self.seek_slot.lock().unwrap(), Some(req) if req.flush)
    }

    /// Decoder-side: apply a seek to the underlying source and flush its
    /// residual codec state.
    pub fn apply_seek(&self, req: SeekRequest) -> Result<()> {
        self.source.lock().unwrap().seek(req.target_seconds)?;
        self.ever_seeked.store(true, Ordering::SeqCst);
        *self.decode_clock.lock().unwrap() = req.target_seconds;
        self.eof.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    /// Short-circuits blocking I/O during teardown (spec §4.C).
    pub fn abort(&self) {
        tracing::debug!("file aborted");
        self.abort.store(true, Ordering::SeqCst);
    }

    pub fn is_eof(&self) -> bool {
        self.eof.load(Ordering::SeqCst)
    }

    pub fn set_eof(&self, eof: bool) {
        self.eof.store(eof, Ordering::SeqCst);
    }

    pub fn decode_clock(&self) -> f64 {
        *self.decode_clock.lock().unwrap()
    }

    pub fn set_decode_clock(&self, seconds: f64) {
        *self.decode_clock.lock().unwrap() = seconds;
    }

    /// Decoder-side: read the next decoded frame, or `None` at EOF.
    pub fn next_frame(&self) -> Result<Option<crate::codec::DecodedFrame>> {
        self.source.lock().unwrap().next_frame()
    }

    pub fn flush_residual(&self) -> Vec<crate::codec::DecodedFrame> {
        self.source.lock().unwrap().flush_residual()
    }

    /// Overwrite the file in place using the temp-then-rename pattern.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .lock()
            .unwrap()
            .clone()
            .ok_or(GrooveError::Invalid)?;
        self.save_as(&path)
    }

    /// Remux under a unique temp name in the destination's directory, then
    /// atomically rename into place (spec §4.C "Save"). Only metadata
    /// changes are persisted here: re-encoding audio payload is the codec
    /// engine collaborator's job, out of this crate's scope.
    pub fn save_as(&self, path: impl AsRef<Path>) -> Result<()> {
        if !self.dirty.load(Ordering::SeqCst) {
            return Err(GrooveError::NoChanges);
        }
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or(GrooveError::Invalid)?;
        let tmp_path = dir.join(format!(".{}.groove-tmp", file_name));

        let metadata = self.metadata.lock().unwrap().clone();
        let mut lines: Vec<String> = metadata
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        lines.sort();
        fs::write(&tmp_path, lines.join("\n"))
            .map_err(|e| GrooveError::FileSystem(e.to_string()))?;
        fs::rename(&tmp_path, path).map_err(|e| GrooveError::FileSystem(e.to_string()))?;

        self.dirty.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SineSource;
    use crate::format::{ChannelLayout, SampleFormat};

    fn make_file() -> File {
        let fmt = AudioFormat::new(44_100, ChannelLayout::stereo(), SampleFormat::S16, false);
        File::from_source(Box::new(SineSource::new(fmt, 440.0, 1.0)))
    }

    #[test]
    fn seek_to_zero_on_fresh_file_is_a_no_op() {
        let f = make_file();
        f.request_seek(0.0, false);
        assert!(f.take_pending_seek().is_none());
    }

    #[test]
    fn seek_to_nonzero_is_stored() {
        let f = make_file();
        f.request_seek(0.4, true);
        let req = f.take_pending_seek().unwrap();
        assert_eq!(req.target_seconds, 0.4);
        assert!(req.flush);
    }

    #[test]
    fn after_a_real_seek_zero_is_no_longer_a_no_op() {
        let f = make_file();
        f.apply_seek(SeekRequest {
            target_seconds: 0.4,
            flush: true,
        })
        .unwrap();
        f.request_seek(0.0, false);
        assert!(f.take_pending_seek().is_some());
    }

    #[test]
    fn metadata_round_trips() {
        let f = make_file();
        f.metadata_set("title", Some("Song"), MetadataFlags::empty());
        assert_eq!(
            f.metadata_get("title", None, MetadataFlags::empty()),
            Some("Song".to_string())
        );
        f.metadata_set("title", None, MetadataFlags::empty());
        assert_eq!(f.metadata_get("title", None, MetadataFlags::empty()), None);
    }

    #[test]
    fn metadata_get_is_case_insensitive_by_default_but_not_with_match_case() {
        let f = make_file();
        f.metadata_set("Title", Some("Song"), MetadataFlags::empty());
        assert_eq!(
            f.metadata_get("title", None, MetadataFlags::empty()),
            Some("Song".to_string())
        );
        assert_eq!(
            f.metadata_get("title", None, MetadataFlags::MATCH_CASE),
            None
        );
    }

    #[test]
    fn dont_overwrite_leaves_existing_value_in_place() {
        let f = make_file();
        f.metadata_set("title", Some("First"), MetadataFlags::empty());
        f.metadata_set("title", Some("Second"), MetadataFlags::DONT_OVERWRITE);
        assert_eq!(
            f.metadata_get("title", None, MetadataFlags::empty()),
            Some("First".to_string())
        );
    }

    #[test]
    fn append_concatenates_without_a_delimiter() {
        let f = make_file();
        f.metadata_set("title", Some("Foo"), MetadataFlags::empty());
        f.metadata_set("title", Some("Bar"), MetadataFlags::APPEND);
        assert_eq!(
            f.metadata_get("title", None, MetadataFlags::empty()),
            Some("FooBar".to_string())
        );
    }

    #[test]
    fn save_as_without_changes_returns_no_changes() {
        let f = make_file();
        let tmp = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(f.save_as(tmp.path()), Err(GrooveError::NoChanges));
    }

    #[test]
    fn save_as_writes_via_temp_then_rename() {
        let f = make_file();
        f.metadata_set("title", Some("Song"), MetadataFlags::empty());
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.meta");
        f.save_as(&target).unwrap();
        assert!(target.exists());
        let contents = fs::read_to_string(&target).unwrap();
        assert!(contents.contains("title=Song"));
    }
}
