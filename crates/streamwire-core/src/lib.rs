//! streamwire core
//!
//! Media framing primitives for RTMP-style streaming.
//!
//! This crate provides:
//! - Media message types and their body codecs ([`Message`], [`AvcVideoMessage`])
//! - Annex-B to length-prefixed NAL rewriting ([`avc`])
//! - FLV tag records for local recording ([`FlvTag`])
//! - Audio encoder settings ([`AudioSettings`])

pub mod avc;
pub mod error;
pub mod message;
pub mod settings;
pub mod tag;
pub mod types;

pub use error::{Error, Result};
pub use message::{
    AudioMessage, AvcVideoMessage, DataMessage, Message, NalFormat, VideoMessage,
    AVC_HEADER_SIZE,
};
pub use settings::AudioSettings;
pub use tag::{join_timestamp, split_timestamp, FlvTag, TAG_HEADER_SIZE};
pub use types::*;

/// Default RTMP port
pub const DEFAULT_RTMP_PORT: u16 = 1935;
