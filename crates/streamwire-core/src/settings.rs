//! Encoder settings consumed by the framing layer
//!
//! The encoder itself lives outside this crate. Its output format is applied
//! to messages through [`crate::AudioMessage::configure`].

use serde::{Deserialize, Serialize};

use crate::{Error, Result, SoundRate, SoundType};

/// Default audio sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default audio channel count
pub const DEFAULT_CHANNEL_COUNT: u8 = 1;

/// Default audio bit rate in bits per second
pub const DEFAULT_BIT_RATE: u32 = 64_000;

/// Audio encoder output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 or 2)
    pub channel_count: u8,
    /// Bit rate in bits per second
    pub bit_rate: u32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: DEFAULT_CHANNEL_COUNT,
            bit_rate: DEFAULT_BIT_RATE,
        }
    }
}

impl AudioSettings {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channel_count(mut self, channel_count: u8) -> Self {
        self.channel_count = channel_count;
        self
    }

    pub fn with_bit_rate(mut self, bit_rate: u32) -> Self {
        self.bit_rate = bit_rate;
        self
    }

    /// Check the values against what the tag format can describe
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidSetting("sample rate must be positive".into()));
        }
        if !(1..=2).contains(&self.channel_count) {
            return Err(Error::InvalidSetting(format!(
                "channel count must be 1 or 2, got {}",
                self.channel_count
            )));
        }
        if self.bit_rate == 0 {
            return Err(Error::InvalidSetting("bit rate must be positive".into()));
        }
        Ok(())
    }

    pub fn sound_rate(&self) -> SoundRate {
        SoundRate::from_sample_rate(self.sample_rate)
    }

    pub fn sound_type(&self) -> SoundType {
        if self.channel_count > 1 {
            SoundType::Stereo
        } else {
            SoundType::Mono
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AudioSettings::default();
        assert_eq!(settings.sample_rate, 44_100);
        assert_eq!(settings.channel_count, 1);
        assert_eq!(settings.bit_rate, 64_000);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.sound_rate(), SoundRate::Khz44);
        assert_eq!(settings.sound_type(), SoundType::Mono);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(AudioSettings::default().with_sample_rate(0).validate().is_err());
        assert!(AudioSettings::default().with_channel_count(6).validate().is_err());
        assert!(AudioSettings::default().with_bit_rate(0).validate().is_err());
    }

    #[test]
    fn test_rate_mapping() {
        let settings = AudioSettings::default().with_sample_rate(22_050).with_channel_count(2);
        assert_eq!(settings.sound_rate(), SoundRate::Khz22);
        assert_eq!(settings.sound_type(), SoundType::Stereo);
        assert_eq!(SoundRate::from_sample_rate(11_025), SoundRate::Khz11);
        assert_eq!(SoundRate::from_sample_rate(5_512), SoundRate::Khz5_5);
        assert_eq!(SoundRate::from_sample_rate(48_000), SoundRate::Khz44);
    }
}
