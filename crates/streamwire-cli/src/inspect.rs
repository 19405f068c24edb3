//! H.264 elementary stream inspection

use anyhow::{Context, Result};
use bytes::{BufMut, BytesMut};
use colored::Colorize;
use std::path::Path;
use streamwire_core::avc::{self, NAL_TYPE_IDR};
use streamwire_core::{AvcVideoMessage, FlvTag, FrameType, Message, TAG_HEADER_SIZE};

const START_CODE: [u8; 4] = [0, 0, 0, 1];

/// One picture: the NAL units up to and including a coded slice
#[derive(Debug, Default)]
struct AccessUnit {
    payload: BytesMut,
    nal_types: Vec<u8>,
}

impl AccessUnit {
    fn push(&mut self, unit: &[u8], nal_type: u8) {
        self.payload.put_slice(&START_CODE);
        self.payload.put_slice(unit);
        self.nal_types.push(nal_type);
    }

    fn is_key(&self) -> bool {
        self.nal_types.contains(&NAL_TYPE_IDR)
    }
}

/// Coded slice NAL unit types
fn is_slice(nal_type: u8) -> bool {
    (1..=5).contains(&nal_type)
}

/// Group Annex-B NAL units into pictures. Trailing non-slice units form a
/// last unit of their own.
fn access_units(stream: &[u8]) -> Vec<AccessUnit> {
    let mut units = Vec::new();
    let mut current = AccessUnit::default();

    for unit in avc::nal_units(stream) {
        let nal_type = avc::nal_unit_type(unit).unwrap_or(0);
        current.push(unit, nal_type);
        if is_slice(nal_type) {
            units.push(std::mem::take(&mut current));
        }
    }
    if !current.nal_types.is_empty() {
        units.push(current);
    }
    units
}

/// Frame each picture as an AVC video message at `frame_ms` spacing
fn frame_messages(stream: &[u8], frame_ms: u32) -> Vec<(Vec<u8>, Message)> {
    access_units(stream)
        .into_iter()
        .enumerate()
        .map(|(index, unit)| {
            let frame_type = if unit.is_key() {
                FrameType::Key
            } else {
                FrameType::Inter
            };
            let message = AvcVideoMessage::new(unit.payload.freeze())
                .with_timestamp((index as u32).wrapping_mul(frame_ms))
                .with_frame_type(frame_type);
            (unit.nal_types, Message::AvcVideo(message))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run_inspect(path: &Path, frame_ms: u32, quiet: bool) -> Result<()> {
    let stream =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    println!(
        "{} Inspecting {} ({} bytes)",
        "streamwire".cyan().bold(),
        path.display(),
        stream.len()
    );

    let mut offset = 0u64;
    let mut keyframes = 0usize;
    let messages = frame_messages(&stream, frame_ms);

    for (index, (nal_types, message)) in messages.iter().enumerate() {
        let tag = FlvTag::from_message(message, 0, offset);
        let mut header = BytesMut::with_capacity(TAG_HEADER_SIZE);
        tag.encode_header(&mut header)
            .with_context(|| format!("Picture {} does not fit an FLV tag", index))?;

        let key = matches!(message, Message::AvcVideo(m) if m.frame_type.is_key());
        if key {
            keyframes += 1;
        }
        if !quiet {
            println!(
                "{:>6} {:>8}ms {} nal {:?} length {:>7} @{:<9} tag [{}]",
                index,
                message.timestamp(),
                if key { "KEY  ".green() } else { "INTER".normal() },
                nal_types,
                message.length(),
                offset,
                hex(&header)
            );
        }
        offset = tag.next_offset();
    }

    println!(
        "{} pictures, {} keyframes, {} bytes as FLV tags",
        messages.len(),
        keyframes,
        offset
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SPS, PPS, IDR slice, then a non-IDR slice
    const STREAM: &[u8] = &[
        0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, //
        0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80, //
        0, 0, 1, 0x65, 0x88, 0x84, //
        0, 0, 0, 1, 0x41, 0x9A, 0x02,
    ];

    #[test]
    fn test_parameter_sets_join_first_picture() {
        let units = access_units(STREAM);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].nal_types, vec![7u8, 8, 5]);
        assert!(units[0].is_key());
        assert_eq!(units[1].nal_types, vec![1u8]);
        assert!(!units[1].is_key());
    }

    #[test]
    fn test_frame_messages_timing_and_length() {
        let messages = frame_messages(STREAM, 40);
        assert_eq!(messages.len(), 2);

        let (_, first) = &messages[0];
        assert_eq!(first.timestamp(), 0);
        // 5-byte AVC header, then three length-prefixed units of 4, 4 and 3 bytes
        assert_eq!(first.length(), 5 + (4 + 4) + (4 + 4) + (4 + 3));
        assert_eq!(&first.to_bytes()[..2], &[0x17, 0x01]);

        let (_, second) = &messages[1];
        assert_eq!(second.timestamp(), 40);
        assert_eq!(second.to_bytes()[0], 0x27);
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x09, 0x00, 0xFF]), "09 00 ff");
    }
}
