//! FLV tag records
//!
//! Tag header layout:
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Byte 0:     Tag type (8=audio, 9=video, 18=data)        │
//! │ Byte 1-3:   Data size (uint24 big-endian)               │
//! │ Byte 4-6:   Timestamp, lower 24 bits (big-endian)       │
//! │ Byte 7:     Timestamp extended (upper 8 bits)           │
//! │ Byte 8-10:  Stream id (uint24 big-endian, always 0)     │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data (message body, `data size` bytes)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ Previous tag size (uint32, 11 + data size)              │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The tag's `offset` is bookkeeping for the recorder and never serialized.

use bytes::{Buf, BufMut};

use crate::{Error, Message, MessageType, Result};

/// Tag header size
pub const TAG_HEADER_SIZE: usize = 11;

/// Size of the trailing previous-tag-size field
pub const PREVIOUS_TAG_SIZE_LEN: usize = 4;

/// Largest value of a 24-bit field
pub const MAX_UINT24: u32 = 0x00FF_FFFF;

/// Split a millisecond timestamp into its lower 24 bits and the extended byte
pub fn split_timestamp(timestamp: u32) -> (u32, u8) {
    (timestamp & MAX_UINT24, (timestamp >> 24) as u8)
}

/// Inverse of [`split_timestamp`]
pub fn join_timestamp(timestamp: u32, extended: u8) -> u32 {
    (extended as u32) << 24 | (timestamp & MAX_UINT24)
}

/// One stored media unit of an FLV container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlvTag {
    pub tag_type: MessageType,
    pub data_size: u32,
    /// Lower 24 bits of the timestamp
    pub timestamp: u32,
    /// Upper 8 bits of the timestamp
    pub timestamp_extended: u8,
    pub stream_id: u32,
    /// Byte position of the tag in the container file
    pub offset: u64,
}

impl FlvTag {
    pub fn new(tag_type: MessageType) -> Self {
        Self {
            tag_type,
            data_size: 0,
            timestamp: 0,
            timestamp_extended: 0,
            stream_id: 0,
            offset: 0,
        }
    }

    /// Describe `message` as a tag written at `offset`
    pub fn from_message(message: &Message, stream_id: u32, offset: u64) -> Self {
        let (timestamp, timestamp_extended) = split_timestamp(message.timestamp());
        Self {
            tag_type: message.message_type(),
            data_size: message.length() as u32,
            timestamp,
            timestamp_extended,
            stream_id,
            offset,
        }
    }

    /// Full millisecond timestamp
    pub fn full_timestamp(&self) -> u32 {
        join_timestamp(self.timestamp, self.timestamp_extended)
    }

    /// Header plus data, the value of the trailing previous-tag-size field
    pub fn tag_size(&self) -> u32 {
        TAG_HEADER_SIZE as u32 + self.data_size
    }

    /// Offset of the tag that follows this one
    pub fn next_offset(&self) -> u64 {
        self.offset + self.tag_size() as u64 + PREVIOUS_TAG_SIZE_LEN as u64
    }

    /// Write the 11-byte tag header
    pub fn encode_header(&self, buf: &mut impl BufMut) -> Result<()> {
        for value in [self.data_size, self.timestamp, self.stream_id] {
            if value > MAX_UINT24 {
                return Err(Error::OutOfRange(value));
            }
        }

        buf.put_u8(self.tag_type as u8);
        buf.put_uint(self.data_size as u64, 3);
        buf.put_uint(self.timestamp as u64, 3);
        buf.put_u8(self.timestamp_extended);
        buf.put_uint(self.stream_id as u64, 3);
        Ok(())
    }

    /// Read an 11-byte tag header; `offset` is left at zero
    pub fn decode_header(buf: &mut impl Buf) -> Result<Self> {
        if buf.remaining() < TAG_HEADER_SIZE {
            return Err(Error::BufferTooSmall {
                needed: TAG_HEADER_SIZE,
                have: buf.remaining(),
            });
        }

        let type_byte = buf.get_u8();
        let tag_type = MessageType::from_u8(type_byte).ok_or(Error::UnknownTagType(type_byte))?;

        Ok(Self {
            tag_type,
            data_size: buf.get_uint(3) as u32,
            timestamp: buf.get_uint(3) as u32,
            timestamp_extended: buf.get_u8(),
            stream_id: buf.get_uint(3) as u32,
            offset: 0,
        })
    }
}
