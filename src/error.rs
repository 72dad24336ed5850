//! Error taxonomy for the groove core (spec §7).

use thiserror::Error;

/// Errors returned by public, synchronous entry points.
///
/// Errors raised *inside* the decoder thread (codec/IO failures other than
/// EOF) are never surfaced through this type — they are logged and the
/// current playlist item is abandoned (spec §7 "Propagation").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GrooveError {
    #[error("allocation failed")]
    NoMem,
    #[error("system resource unavailable (thread/mutex creation failed)")]
    SystemResources,
    #[error("invalid argument")]
    Invalid,
    #[error("sink not found")]
    SinkNotFound,
    #[error("no changes to save")]
    NoChanges,
    #[error("filesystem error: {0}")]
    FileSystem(String),
    #[error("file not found")]
    FileNotFound,
    #[error("permission denied")]
    Permissions,
    #[error("unknown format")]
    UnknownFormat,
    #[error("too many streams")]
    TooManyStreams,
    #[error("stream not found")]
    StreamNotFound,
    #[error("decoder not found")]
    DecoderNotFound,
    #[error("encoder not found")]
    EncoderNotFound,
    #[error("invalid sample format")]
    InvalidSampleFormat,
    #[error("invalid channel layout")]
    InvalidChannelLayout,
    #[error("encoding error")]
    Encoding,
    #[error("decoding error")]
    Decoding,
    #[error("error opening device")]
    OpeningDevice,
    #[error("device parameters rejected")]
    DeviceParams,
}

pub type Result<T> = std::result::Result<T, GrooveError>;
