#![doc = r#"
groove - playlist, decoding, and filtering core

Turns an ordered list of media files into one or more live streams of PCM
buffers, each shaped to a consumer's preferred audio format and gain.

# Architecture

```text
File ---> decoder thread ---> filter graph (1 input, N output taps) ---> per-tap Queue ---> Sink consumer
```

A single background thread per [`Playlist`] pulls decoded frames from the
current item, runs them through a rebuildable filter chain (volume or
soft-limiting compand, optional channel split, per-group format
conversion), and delivers the result to every attached [`Sink`]'s bounded
queue. Control-surface calls (insert, seek, gain, attach/detach) are
thread-safe and come from arbitrary caller threads; the decoder is the
only thread that ever reads packets or runs the filter chain.

This crate owns no codec: [`MediaSource`] is the seam a real decoding
library plugs into (see [`SourceOpener`]). The synthetic [`SineSource`]
stands in for one in this crate's own test suite.
"#]

pub mod buffer;
pub mod codec;
mod decoder;
pub mod dsp;
pub mod error;
pub mod file;
pub mod filter_graph;
pub mod format;
pub mod playlist;
pub mod queue;
pub mod sink;
pub mod sink_map;

pub use buffer::{buffer_ref, buffer_unref, Buffer, BufferPayload, BufferRef, QueueItem};
pub use codec::{DecodedFrame, MediaSource, Metadata, SineSource};
pub use error::{GrooveError, Result};
pub use file::{CustomIo, File, MetadataFlags, SeekRequest, SeekWhence, SourceOpener};
pub use format::{AudioFormat, Channel, ChannelLayout, SampleFormat};
pub use playlist::{FillMode, ItemId, Playlist};
pub use queue::{GetResult, NoHooks, Queue, QueueHooks};
pub use sink::{BufferGetResult, NoCallbacks, Sink, SinkCallbacks, SinkFormatSpec, SinkId};
pub use sink_map::{SinkGroup, SinkMap};
