//! Error types for streamwire framing

use thiserror::Error;

/// Result type alias for framing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Framing error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Buffer does not hold enough bytes
    #[error("buffer too small: need {needed} bytes, have {have}")]
    BufferTooSmall { needed: usize, have: usize },

    /// Tag type byte is not audio, video or data
    #[error("unknown tag type: {0}")]
    UnknownTagType(u8),

    /// AVC packet type byte is not a sequence header, NAL or end of sequence
    #[error("unknown AVC packet type: {0}")]
    UnknownPacketType(u8),

    /// Video frame type nibble out of range
    #[error("unknown video frame type: {0}")]
    UnknownFrameType(u8),

    /// Video codec nibble out of range
    #[error("unknown video codec: {0}")]
    UnknownVideoCodec(u8),

    /// Audio format nibble is not an assigned sound format
    #[error("unknown sound format: {0}")]
    UnknownSoundFormat(u8),

    /// AAC packet type byte is not a sequence header or raw data
    #[error("unknown AAC packet type: {0}")]
    UnknownAacPacketType(u8),

    /// Audio settings rejected by validation
    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    /// Value does not fit into a 24-bit field
    #[error("value {0} does not fit in 24 bits")]
    OutOfRange(u32),
}
