//! AVC (H.264) NAL unit helpers
//!
//! Encoders hand out Annex-B payloads where every NAL unit is preceded by a
//! `00 00 01` or `00 00 00 01` start code. RTMP and FLV carry the same units
//! in length-prefixed form:
//!
//! ```text
//! Annex-B:          00 00 00 01 | NAL 1 | 00 00 01 | NAL 2
//! Length-prefixed:  len(NAL 1) u32 BE | NAL 1 | len(NAL 2) u32 BE | NAL 2
//! ```

use bytes::BufMut;

use crate::{Error, Result};

/// Size of the big-endian length field in front of each NAL unit
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// NAL unit type of an IDR slice
pub const NAL_TYPE_IDR: u8 = 5;

/// NAL unit type of a sequence parameter set
pub const NAL_TYPE_SPS: u8 = 7;

/// NAL unit type of a picture parameter set
pub const NAL_TYPE_PPS: u8 = 8;

/// Iterator over the NAL units of an Annex-B payload.
///
/// A payload that does not start with a start code yields its leading bytes
/// as the first unit, so a bare NAL unit comes back as a single item. Empty
/// units (back-to-back start codes) are skipped.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    rest: &'a [u8],
}

/// Split an Annex-B payload into NAL units
pub fn nal_units(payload: &[u8]) -> NalUnits<'_> {
    let rest = if payload.starts_with(&[0, 0, 0, 1]) {
        &payload[4..]
    } else if payload.starts_with(&[0, 0, 1]) {
        &payload[3..]
    } else {
        payload
    };
    NalUnits { rest }
}

impl<'a> Iterator for NalUnits<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        while !self.rest.is_empty() {
            let unit = match find_start_code(self.rest) {
                Some(idx) => {
                    let unit = trim_trailing_zeros(&self.rest[..idx]);
                    self.rest = &self.rest[idx + 3..];
                    unit
                }
                None => std::mem::take(&mut self.rest),
            };
            if !unit.is_empty() {
                return Some(unit);
            }
        }
        None
    }
}

/// Position of the next three-byte `00 00 01` sequence
fn find_start_code(data: &[u8]) -> Option<usize> {
    data.windows(3).position(|w| w == [0, 0, 1])
}

// The leading zero of a four-byte start code belongs to the previous unit's tail.
fn trim_trailing_zeros(unit: &[u8]) -> &[u8] {
    let end = unit.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    &unit[..end]
}

/// Number of bytes [`put_length_prefixed`] writes for `payload`
pub fn length_prefixed_size(payload: &[u8]) -> usize {
    nal_units(payload)
        .map(|unit| LENGTH_PREFIX_SIZE + unit.len())
        .sum()
}

/// Rewrite an Annex-B payload into length-prefixed form.
///
/// Returns the number of bytes written.
pub fn put_length_prefixed(payload: &[u8], buf: &mut impl BufMut) -> usize {
    let mut written = 0;
    for unit in nal_units(payload) {
        buf.put_u32(unit.len() as u32);
        buf.put_slice(unit);
        written += LENGTH_PREFIX_SIZE + unit.len();
    }
    written
}

/// Split a length-prefixed payload back into NAL units
pub fn split_length_prefixed(mut data: &[u8]) -> Result<Vec<&[u8]>> {
    let mut units = Vec::new();
    while !data.is_empty() {
        if data.len() < LENGTH_PREFIX_SIZE {
            return Err(Error::BufferTooSmall {
                needed: LENGTH_PREFIX_SIZE,
                have: data.len(),
            });
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        let body = &data[LENGTH_PREFIX_SIZE..];
        if body.len() < len {
            return Err(Error::BufferTooSmall {
                needed: LENGTH_PREFIX_SIZE + len,
                have: data.len(),
            });
        }
        units.push(&body[..len]);
        data = &body[len..];
    }
    Ok(units)
}

/// NAL unit type (low five bits of the first byte)
pub fn nal_unit_type(unit: &[u8]) -> Option<u8> {
    unit.first().map(|b| b & 0x1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mixed_start_codes() {
        let payload = [0, 0, 0, 1, 0x67, 0xAA, 0, 0, 1, 0x68, 0xBB, 0, 0, 0, 1, 0x65, 0xCC, 0xDD];
        let units: Vec<&[u8]> = nal_units(&payload).collect();

        assert_eq!(units, vec![&[0x67u8, 0xAA][..], &[0x68, 0xBB][..], &[0x65, 0xCC, 0xDD][..]]);
    }

    #[test]
    fn test_bare_unit_without_start_code() {
        let payload = [0x65, 0x01, 0x02];
        let units: Vec<&[u8]> = nal_units(&payload).collect();
        assert_eq!(units, vec![&payload[..]]);
    }

    #[test]
    fn test_empty_units_skipped() {
        let payload = [0, 0, 0, 1, 0, 0, 0, 1, 0x09, 0xF0];
        let units: Vec<&[u8]> = nal_units(&payload).collect();
        assert_eq!(units, vec![&[0x09u8, 0xF0][..]]);
        assert_eq!(nal_units(&[]).count(), 0);
    }

    #[test]
    fn test_length_prefixed_size_matches_written() {
        let payload = [0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x68, 0xCE, 0x38, 0x80];
        let mut buf = Vec::new();
        let written = put_length_prefixed(&payload, &mut buf);

        assert_eq!(written, buf.len());
        assert_eq!(length_prefixed_size(&payload), buf.len());
        assert_eq!(buf, vec![0, 0, 0, 2, 0x67, 0x42, 0, 0, 0, 4, 0x68, 0xCE, 0x38, 0x80]);
    }

    #[test]
    fn test_split_length_prefixed() {
        let data = [0, 0, 0, 2, 0x67, 0x42, 0, 0, 0, 1, 0x68];
        let units = split_length_prefixed(&data).unwrap();
        assert_eq!(units, vec![&[0x67u8, 0x42][..], &[0x68][..]]);

        let truncated = [0, 0, 0, 5, 0x65];
        assert!(matches!(
            split_length_prefixed(&truncated),
            Err(Error::BufferTooSmall { needed: 9, have: 5 })
        ));
    }

    #[test]
    fn test_nal_unit_type() {
        assert_eq!(nal_unit_type(&[0x65, 0x88]), Some(NAL_TYPE_IDR));
        assert_eq!(nal_unit_type(&[0x67]), Some(NAL_TYPE_SPS));
        assert_eq!(nal_unit_type(&[]), None);
    }
}
