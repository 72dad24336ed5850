//! Seam to the codec/filter engine collaborator — deliberately out of
//! scope for this crate.
//!
//! This crate owns no decoder. `MediaSource` is the trait a real
//! integration (an FFI binding to libav, a `symphonia` wrapper, …) would
//! implement; [`File`](crate::file::File) only ever talks to the engine
//! through it. For this crate's own tests we ship [`SineSource`], a
//! deterministic synthetic generator that stands in for an opened media
//! file.

use crate::error::{GrooveError, Result};
use crate::format::{AudioFormat, ChannelLayout, SampleFormat};

/// Ordered key/value metadata, duplicate keys allowed — mirrors the
/// original's `AVDictionary`, which `File::metadata_get`'s `prev` parameter
/// (spec §6) iterates over to visit every entry under a repeated key.
pub type Metadata = Vec<(String, String)>;

/// One block of decoded PCM, planar: `samples[channel][frame]`.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub samples: Vec<Vec<f64>>,
    pub sample_rate: u32,
    pub channel_layout: ChannelLayout,
    /// Presentation timestamp in stream time-base units, or `None` for
    /// `AV_NOPTS_VALUE` (spec §4.F "pts gap").
    pub pts: Option<i64>,
}

impl DecodedFrame {
    pub fn frame_count(&self) -> usize {
        self.samples.first().map(|c| c.len()).unwrap_or(0)
    }
}

/// What the core requires of a codec/filter engine (spec §6).
pub trait MediaSource: Send {
    fn format(&self) -> AudioFormat;
    fn duration(&self) -> Option<f64>;
    fn short_names(&self) -> Vec<String>;
    fn metadata(&self) -> Metadata;

    /// Decode the next frame. `Ok(None)` signals EOF (spec §4.C / §4.F).
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>>;

    /// Flush residual frames buffered inside the codec (spec §6, "support
    /// flushing of residual frames when the codec advertises delayed
    /// output").
    fn flush_residual(&mut self) -> Vec<DecodedFrame>;

    /// Seek to `target_seconds`, flushing internal codec state.
    fn seek(&mut self, target_seconds: f64) -> Result<()>;
}

/// Deterministic sine-wave generator used by this crate's own test suite
/// in place of a real decoder.
pub struct SineSource {
    format: AudioFormat,
    frequency: f64,
    duration_seconds: f64,
    block_frames: usize,
    frames_emitted: u64,
    metadata: Metadata,
}

impl SineSource {
    pub fn new(format: AudioFormat, frequency: f64, duration_seconds: f64) -> Self {
        SineSource {
            format,
            frequency,
            duration_seconds,
            block_frames: 1024,
            frames_emitted: 0,
            metadata: Metadata::new(),
        }
    }

    pub fn with_block_frames(mut self, block_frames: usize) -> Self {
        self.block_frames = block_frames;
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.push((key.to_string(), value.to_string()));
        self
    }

    fn total_frames(&self) -> u64 {
        (self.duration_seconds * self.format.sample_rate as f64).round() as u64
    }
}

impl MediaSource for SineSource {
    fn format(&self) -> AudioFormat {
        self.format.clone()
    }

    fn duration(&self) -> Option<f64> {
        Some(self.duration_seconds)
    }

    fn short_names(&self) -> Vec<String> {
        vec!["sine".to_string()]
    }

    fn metadata(&self) -> Metadata {
        self.metadata.clone()
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        let total = self.total_frames();
        if self.frames_emitted >= total {
            return Ok(None);
        }
        let remaining = total - self.frames_emitted;
        let count = self.block_frames.min(remaining as usize).max(1);
        let channels = self.format.channel_count();
        let rate = self.format.sample_rate as f64;

        let mut samples = vec![Vec::with_capacity(count); channels];
        for i in 0..count {
            let t = (self.frames_emitted + i as u64) as f64 / rate;
            let v = (2.0 * std::f64::consts::PI * self.frequency * t).sin();
            for ch in samples.iter_mut() {
                ch.push(v);
            }
        }

        let pts = Some(self.frames_emitted as i64);
        self.frames_emitted += count as u64;

        Ok(Some(DecodedFrame {
            samples,
            sample_rate: self.format.sample_rate,
            channel_layout: self.format.channel_layout.clone(),
            pts,
        }))
    }

    fn flush_residual(&mut self) -> Vec<DecodedFrame> {
        Vec::new()
    }

    fn seek(&mut self, target_seconds: f64) -> Result<()> {
        if target_seconds < 0.0 {
            return Err(GrooveError::Invalid);
        }
        self.frames_emitted = (target_seconds * self.format.sample_rate as f64).round() as u64;
        Ok(())
    }
}
