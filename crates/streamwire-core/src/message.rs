//! Media message encoding/decoding
//!
//! Message bodies as they travel inside RTMP chunks (and inside FLV tags):
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ AVC video                                                        │
//! │ Byte 0:     [7:4] frame type  [3:0] codec id (7 = AVC)           │
//! │ Byte 1:     AVC packet type (0=seq header, 1=NAL, 2=end of seq)  │
//! │ Byte 2-4:   Composition time (int24 big-endian, ms)              │
//! │ Payload:    length-prefixed NAL units or decoder config record   │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Audio                                                            │
//! │ Byte 0:     [7:4] format  [3:2] rate  [1] size  [0] type         │
//! │ [AAC only] Byte 1: AAC packet type                               │
//! │ Payload:    encoded samples                                      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Data:       opaque payload (AMF encoded)                         │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `length()` of every message is the exact number of bytes `encode` writes.
//! The message timestamp is carried by the chunk or tag header, not the body.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::avc;
use crate::{
    AacPacketType, AudioSettings, AvcPacketType, Error, FrameType, MessageType, Result,
    SoundFormat, SoundRate, SoundSize, SoundType, VideoCodec,
};

/// Header size of an AVC video message
pub const AVC_HEADER_SIZE: usize = 5;

/// Layout of the NAL units in an AVC payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NalFormat {
    /// Start-code delimited, as produced by encoders
    #[default]
    AnnexB,
    /// Length-prefixed, as carried on the wire
    LengthPrefixed,
}

/// A media message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Audio(AudioMessage),
    Video(VideoMessage),
    AvcVideo(AvcVideoMessage),
    Data(DataMessage),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::Audio(_) => MessageType::Audio,
            Message::Video(_) | Message::AvcVideo(_) => MessageType::Video,
            Message::Data(_) => MessageType::Data,
        }
    }

    /// Timestamp in milliseconds
    pub fn timestamp(&self) -> u32 {
        match self {
            Message::Audio(m) => m.timestamp,
            Message::Video(m) => m.timestamp,
            Message::AvcVideo(m) => m.timestamp,
            Message::Data(m) => m.timestamp,
        }
    }

    /// Encoded body size
    pub fn length(&self) -> usize {
        match self {
            Message::Audio(m) => m.length(),
            Message::Video(m) => m.length(),
            Message::AvcVideo(m) => m.length(),
            Message::Data(m) => m.length(),
        }
    }

    /// Encode the message body into `buf`
    pub fn encode(&self, buf: &mut impl BufMut) {
        match self {
            Message::Audio(m) => m.encode(buf),
            Message::Video(m) => m.encode(buf),
            Message::AvcVideo(m) => m.encode(buf),
            Message::Data(m) => m.encode(buf),
        }
    }

    /// Encode the message body into a new buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.length());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Skip a message body of `length` bytes without interpreting it
    pub fn skip(buf: &mut impl Buf, length: usize) -> Result<()> {
        ensure_remaining(buf.remaining(), length)?;
        buf.advance(length);
        Ok(())
    }

    /// Decode a message body of `length` bytes.
    ///
    /// Exactly `length` bytes are consumed whenever the buffer holds that
    /// many, even if the body turns out to be malformed.
    pub fn decode(message_type: MessageType, buf: &mut impl Buf, length: usize) -> Result<Self> {
        ensure_remaining(buf.remaining(), length)?;
        let body = buf.copy_to_bytes(length);
        match message_type {
            MessageType::Audio => AudioMessage::parse(body).map(Message::Audio),
            MessageType::Video => {
                let codec = body.first().map(|b| b & 0x0F);
                if codec == Some(VideoCodec::Avc as u8) {
                    AvcVideoMessage::parse(body).map(Message::AvcVideo)
                } else {
                    VideoMessage::parse(body).map(Message::Video)
                }
            }
            MessageType::Data => Ok(Message::Data(DataMessage {
                timestamp: 0,
                payload: body,
            })),
        }
    }
}

fn ensure_remaining(have: usize, needed: usize) -> Result<()> {
    if have < needed {
        return Err(Error::BufferTooSmall { needed, have });
    }
    Ok(())
}

fn ensure_len(body: &Bytes, needed: usize) -> Result<()> {
    ensure_remaining(body.len(), needed)
}

/// AVC (H.264) video message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AvcVideoMessage {
    pub timestamp: u32,
    pub frame_type: FrameType,
    pub packet_type: AvcPacketType,
    /// Presentation offset in milliseconds, signed 24 bits on the wire
    pub composition_time: i32,
    pub payload: Bytes,
    /// Layout of `payload` when `packet_type` is NAL
    pub nal_format: NalFormat,
}

impl AvcVideoMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_frame_type(mut self, frame_type: FrameType) -> Self {
        self.frame_type = frame_type;
        self
    }

    pub fn with_packet_type(mut self, packet_type: AvcPacketType) -> Self {
        self.packet_type = packet_type;
        self
    }

    pub fn with_composition_time(mut self, composition_time: i32) -> Self {
        self.composition_time = composition_time;
        self
    }

    pub fn with_nal_format(mut self, nal_format: NalFormat) -> Self {
        self.nal_format = nal_format;
        self
    }

    fn rewrites_payload(&self) -> bool {
        self.packet_type == AvcPacketType::Nal && self.nal_format == NalFormat::AnnexB
    }

    /// Header plus payload size as written on the wire (after NAL rewriting)
    pub fn length(&self) -> usize {
        let payload = if self.rewrites_payload() {
            avc::length_prefixed_size(&self.payload)
        } else {
            self.payload.len()
        };
        AVC_HEADER_SIZE + payload
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8((self.frame_type as u8) << 4 | VideoCodec::Avc as u8);
        buf.put_u8(self.packet_type as u8);
        let ct = self.composition_time;
        buf.put_slice(&[(ct >> 16) as u8, (ct >> 8) as u8, ct as u8]);

        if self.rewrites_payload() {
            avc::put_length_prefixed(&self.payload, buf);
        } else {
            buf.put_slice(&self.payload);
        }
    }

    /// Decode a body of `length` bytes; the payload stays length-prefixed
    pub fn decode(buf: &mut impl Buf, length: usize) -> Result<Self> {
        ensure_remaining(buf.remaining(), length)?;
        Self::parse(buf.copy_to_bytes(length))
    }

    fn parse(mut body: Bytes) -> Result<Self> {
        ensure_len(&body, AVC_HEADER_SIZE)?;

        let first = body.get_u8();
        let frame_type = FrameType::from_u8(first >> 4).ok_or(Error::UnknownFrameType(first >> 4))?;
        let codec = first & 0x0F;
        if codec != VideoCodec::Avc as u8 {
            return Err(Error::UnknownVideoCodec(codec));
        }

        let packet = body.get_u8();
        let packet_type = AvcPacketType::from_u8(packet).ok_or(Error::UnknownPacketType(packet))?;

        // Sign-extend the 24-bit value
        let raw = body.get_uint(3) as u32;
        let composition_time = ((raw << 8) as i32) >> 8;

        Ok(Self {
            timestamp: 0,
            frame_type,
            packet_type,
            composition_time,
            payload: body,
            nal_format: NalFormat::LengthPrefixed,
        })
    }

    /// NAL units of the payload, whatever its layout
    pub fn nal_units(&self) -> Result<Vec<&[u8]>> {
        match self.nal_format {
            NalFormat::AnnexB => Ok(avc::nal_units(&self.payload).collect()),
            NalFormat::LengthPrefixed => avc::split_length_prefixed(&self.payload),
        }
    }
}

/// Video message for codecs whose payload needs no repackaging
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMessage {
    pub timestamp: u32,
    pub frame_type: FrameType,
    pub codec: VideoCodec,
    pub payload: Bytes,
}

impl VideoMessage {
    pub fn new(codec: VideoCodec, payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp: 0,
            frame_type: FrameType::default(),
            codec,
            payload: payload.into(),
        }
    }

    pub fn length(&self) -> usize {
        1 + self.payload.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8((self.frame_type as u8) << 4 | self.codec as u8);
        buf.put_slice(&self.payload);
    }

    fn parse(mut body: Bytes) -> Result<Self> {
        ensure_len(&body, 1)?;
        let first = body.get_u8();
        let frame_type = FrameType::from_u8(first >> 4).ok_or(Error::UnknownFrameType(first >> 4))?;
        let codec = VideoCodec::from_u8(first & 0x0F).ok_or(Error::UnknownVideoCodec(first & 0x0F))?;
        Ok(Self {
            timestamp: 0,
            frame_type,
            codec,
            payload: body,
        })
    }
}

/// Audio message
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AudioMessage {
    pub timestamp: u32,
    pub format: SoundFormat,
    pub rate: SoundRate,
    pub size: SoundSize,
    pub sound_type: SoundType,
    /// Only written for AAC
    pub aac_packet_type: AacPacketType,
    pub payload: Bytes,
}

impl AudioMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_aac_packet_type(mut self, aac_packet_type: AacPacketType) -> Self {
        self.aac_packet_type = aac_packet_type;
        self
    }

    /// Apply the encoder output format to the header fields
    pub fn configure(&mut self, settings: &AudioSettings) -> Result<()> {
        settings.validate()?;
        self.rate = settings.sound_rate();
        self.sound_type = settings.sound_type();
        Ok(())
    }

    fn header_size(&self) -> usize {
        if self.format == SoundFormat::Aac {
            2
        } else {
            1
        }
    }

    pub fn length(&self) -> usize {
        self.header_size() + self.payload.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u8(
            (self.format as u8) << 4
                | (self.rate as u8) << 2
                | (self.size as u8) << 1
                | self.sound_type as u8,
        );
        if self.format == SoundFormat::Aac {
            buf.put_u8(self.aac_packet_type as u8);
        }
        buf.put_slice(&self.payload);
    }

    fn parse(mut body: Bytes) -> Result<Self> {
        ensure_len(&body, 1)?;
        let first = body.get_u8();
        let format =
            SoundFormat::from_u8(first >> 4).ok_or(Error::UnknownSoundFormat(first >> 4))?;
        let rate = match (first >> 2) & 0x03 {
            0 => SoundRate::Khz5_5,
            1 => SoundRate::Khz11,
            2 => SoundRate::Khz22,
            _ => SoundRate::Khz44,
        };
        let size = if first & 0x02 != 0 {
            SoundSize::Bits16
        } else {
            SoundSize::Bits8
        };
        let sound_type = if first & 0x01 != 0 {
            SoundType::Stereo
        } else {
            SoundType::Mono
        };

        let mut aac_packet_type = AacPacketType::default();
        if format == SoundFormat::Aac {
            ensure_len(&body, 1)?;
            let packet = body.get_u8();
            aac_packet_type =
                AacPacketType::from_u8(packet).ok_or(Error::UnknownAacPacketType(packet))?;
        }

        Ok(Self {
            timestamp: 0,
            format,
            rate,
            size,
            sound_type,
            aac_packet_type,
            payload: body,
        })
    }
}

/// Data message (script data, metadata)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataMessage {
    pub timestamp: u32,
    pub payload: Bytes,
}

impl DataMessage {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            timestamp: 0,
            payload: payload.into(),
        }
    }

    pub fn length(&self) -> usize {
        self.payload.len()
    }

    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_slice(&self.payload);
    }
}
