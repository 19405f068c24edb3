//! Protocol enumerations shared by messages and tags

/// Media kind of a message or tag.
///
/// The discriminants are both the RTMP message type ids and the FLV tag
/// type bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Audio = 8,
    Video = 9,
    Data = 18,
}

impl MessageType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            8 => Some(MessageType::Audio),
            9 => Some(MessageType::Video),
            18 => Some(MessageType::Data),
            _ => None,
        }
    }
}

/// Video frame type (high nibble of the first video byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FrameType {
    #[default]
    Key = 1,
    Inter = 2,
    DisposableInter = 3,
    GeneratedKey = 4,
    Command = 5,
}

impl FrameType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            1 => Some(FrameType::Key),
            2 => Some(FrameType::Inter),
            3 => Some(FrameType::DisposableInter),
            4 => Some(FrameType::GeneratedKey),
            5 => Some(FrameType::Command),
            _ => None,
        }
    }

    pub fn is_key(&self) -> bool {
        matches!(self, FrameType::Key | FrameType::GeneratedKey)
    }
}

/// Video codec identifier (low nibble of the first video byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum VideoCodec {
    SorensonH263 = 2,
    Screen1 = 3,
    On2Vp6 = 4,
    On2Vp6Alpha = 5,
    Screen2 = 6,
    #[default]
    Avc = 7,
}

impl VideoCodec {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            2 => Some(VideoCodec::SorensonH263),
            3 => Some(VideoCodec::Screen1),
            4 => Some(VideoCodec::On2Vp6),
            5 => Some(VideoCodec::On2Vp6Alpha),
            6 => Some(VideoCodec::Screen2),
            7 => Some(VideoCodec::Avc),
            _ => None,
        }
    }
}

/// AVC packet type (second byte of an AVC video message)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AvcPacketType {
    /// AVCDecoderConfigurationRecord
    SequenceHeader = 0,
    /// One or more NAL units
    #[default]
    Nal = 1,
    EndOfSequence = 2,
}

impl AvcPacketType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(AvcPacketType::SequenceHeader),
            1 => Some(AvcPacketType::Nal),
            2 => Some(AvcPacketType::EndOfSequence),
            _ => None,
        }
    }
}

/// Audio sound format (high nibble of the first audio byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SoundFormat {
    LinearPcmPlatform = 0,
    Adpcm = 1,
    Mp3 = 2,
    LinearPcmLe = 3,
    Nellymoser16kMono = 4,
    Nellymoser8kMono = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    #[default]
    Aac = 10,
    Speex = 11,
    Mp3_8k = 14,
    DeviceSpecific = 15,
}

impl SoundFormat {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(SoundFormat::LinearPcmPlatform),
            1 => Some(SoundFormat::Adpcm),
            2 => Some(SoundFormat::Mp3),
            3 => Some(SoundFormat::LinearPcmLe),
            4 => Some(SoundFormat::Nellymoser16kMono),
            5 => Some(SoundFormat::Nellymoser8kMono),
            6 => Some(SoundFormat::Nellymoser),
            7 => Some(SoundFormat::G711ALaw),
            8 => Some(SoundFormat::G711MuLaw),
            10 => Some(SoundFormat::Aac),
            11 => Some(SoundFormat::Speex),
            14 => Some(SoundFormat::Mp3_8k),
            15 => Some(SoundFormat::DeviceSpecific),
            _ => None,
        }
    }
}

/// Audio sampling rate bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SoundRate {
    Khz5_5 = 0,
    Khz11 = 1,
    Khz22 = 2,
    #[default]
    Khz44 = 3,
}

impl SoundRate {
    /// Closest rate bits for a sample rate in Hz
    pub fn from_sample_rate(hz: u32) -> Self {
        match hz {
            0..=8_250 => SoundRate::Khz5_5,
            8_251..=16_537 => SoundRate::Khz11,
            16_538..=33_075 => SoundRate::Khz22,
            _ => SoundRate::Khz44,
        }
    }
}

/// Audio sample size bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SoundSize {
    Bits8 = 0,
    #[default]
    Bits16 = 1,
}

/// Audio channel layout bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SoundType {
    #[default]
    Mono = 0,
    Stereo = 1,
}

/// AAC packet type (second byte of an AAC audio message)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum AacPacketType {
    /// AudioSpecificConfig
    SequenceHeader = 0,
    #[default]
    Raw = 1,
}

impl AacPacketType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(AacPacketType::SequenceHeader),
            1 => Some(AacPacketType::Raw),
            _ => None,
        }
    }
}
