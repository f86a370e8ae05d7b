use thiserror::Error;

/// Fatal errors raised while decoding a model (or the binary framing of an
/// animation file). The caller must reject the asset; nothing is partially usable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid magic: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported version {version} (supported: {min}..={max})")]
    UnsupportedVersion { version: u32, min: u32, max: u32 },

    #[error("truncated buffer: {len} bytes at offset {offset} overrun length {buffer_len}")]
    TruncatedBuffer {
        offset: usize,
        len: usize,
        buffer_len: usize,
    },

    #[error("{what} index {index} out of range (limit {limit})")]
    OutOfRangeIndex {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("bone {bone} is its own ancestor")]
    CyclicHierarchy { bone: usize },

    #[error("{what} count {count} exceeds maximum allowed limit {limit}")]
    ArrayTooLarge {
        what: &'static str,
        count: usize,
        limit: usize,
    },
}

/// Errors raised while setting up animation playback. These are fatal for the
/// clip (or the animation file) but never for the model's mesh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnimationError {
    #[error("sequence index {index} not found ({count} sequences)")]
    MissingSequence { index: usize, count: usize },

    #[error("no sequence with clip id {id}")]
    MissingSequenceId { id: u16 },

    #[error("corrupt keyframe index table: {reason}")]
    CorruptIndexTable { reason: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Errors surfaced by the async fetch-then-parse loader.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Animation(#[from] AnimationError),

    #[error("parse task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, ParseError>;
