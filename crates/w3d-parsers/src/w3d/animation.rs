// w3d-parsers/src/w3d/animation.rs
//! Animation records: headers and raw channel blobs
//!
//! Channels keep their sample data as raw little-endian bytes; turning the
//! bytes into per-frame vectors is done by [`crate::scene::animation`].

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use super::io::{self, Record, NAME_LEN};
use crate::traits::{ParseError, ParseResult};

/// Flavor of a compressed animation whose channels are time-coded
pub const FLAVOR_TIMECODED: u16 = 0;
/// Flavor of a compressed animation whose channels are adaptive-delta coded
pub const FLAVOR_ADAPTIVE_DELTA: u16 = 1;

/// Header of an uncompressed ANIMATION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationHeader {
    pub version: u32,
    pub name: String,
    pub hierarchy_name: String,
    pub num_frames: u32,
    pub frame_rate: u32,
}

impl Record for AnimationHeader {
    const SIZE: usize = 44;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, NAME_LEN)?,
            hierarchy_name: io::read_fixed_str(rdr, NAME_LEN)?,
            num_frames: rdr.read_u32::<LittleEndian>()?,
            frame_rate: rdr.read_u32::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        io::write_fixed_str(wtr, &self.name, NAME_LEN)?;
        io::write_fixed_str(wtr, &self.hierarchy_name, NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(self.num_frames)?;
        wtr.write_u32::<LittleEndian>(self.frame_rate)?;
        Ok(())
    }
}

/// One animated pivot property (ANIMATION_CHANNEL)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnimationChannel {
    pub first_frame: u16,
    pub last_frame: u16,
    /// Number of floats per frame
    pub vector_len: u16,
    /// Channel type, see [`crate::scene::ChannelKind`]
    pub flags: u16,
    /// Index of the animated pivot
    pub pivot: u16,
    /// Raw little-endian `f32` samples
    pub data: Vec<u8>,
}

impl AnimationChannel {
    /// Size of the fixed part preceding the samples
    pub const HEADER_SIZE: usize = 12;

    /// Byte length the sample data must have
    pub fn expected_data_len(&self) -> usize {
        expected_len(self.first_frame, self.last_frame, self.vector_len)
    }

    /// Decode a channel payload. Bytes after the samples are padding.
    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut rdr = Cursor::new(payload);
        let first_frame = rdr.read_u16::<LittleEndian>()?;
        let last_frame = rdr.read_u16::<LittleEndian>()?;
        let vector_len = rdr.read_u16::<LittleEndian>()?;
        let flags = rdr.read_u16::<LittleEndian>()?;
        let pivot = rdr.read_u16::<LittleEndian>()?;
        rdr.read_u16::<LittleEndian>()?;

        check_frame_range(first_frame, last_frame, "ANIMATION_CHANNEL")?;
        let expected = expected_len(first_frame, last_frame, vector_len);
        let available = payload.len() - Self::HEADER_SIZE;
        if available < expected {
            return Err(ParseError::LengthMismatch {
                context: format!("ANIMATION_CHANNEL for pivot {pivot}"),
                expected,
                actual: available,
            });
        }

        let start = Self::HEADER_SIZE;
        Ok(Self {
            first_frame,
            last_frame,
            vector_len,
            flags,
            pivot,
            data: payload[start..start + expected].to_vec(),
        })
    }

    pub fn encode<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u16::<LittleEndian>(self.first_frame)?;
        wtr.write_u16::<LittleEndian>(self.last_frame)?;
        wtr.write_u16::<LittleEndian>(self.vector_len)?;
        wtr.write_u16::<LittleEndian>(self.flags)?;
        wtr.write_u16::<LittleEndian>(self.pivot)?;
        wtr.write_u16::<LittleEndian>(0)?;
        wtr.write_all(&self.data)?;
        Ok(())
    }
}

/// Per-frame visibility of a pivot (BIT_CHANNEL). Read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BitChannel {
    pub first_frame: u16,
    pub last_frame: u16,
    pub flags: u16,
    pub pivot: u16,
    /// State for frames outside `first_frame..=last_frame`
    pub default_value: u8,
    /// One bit per frame, least significant bit first
    pub bits: Vec<u8>,
}

impl BitChannel {
    pub const HEADER_SIZE: usize = 9;

    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut rdr = Cursor::new(payload);
        let first_frame = rdr.read_u16::<LittleEndian>()?;
        let last_frame = rdr.read_u16::<LittleEndian>()?;
        let flags = rdr.read_u16::<LittleEndian>()?;
        let pivot = rdr.read_u16::<LittleEndian>()?;
        let default_value = rdr.read_u8()?;

        check_frame_range(first_frame, last_frame, "BIT_CHANNEL")?;
        let frames = usize::from(last_frame - first_frame) + 1;
        let expected = frames.div_ceil(8);
        let available = payload.len() - Self::HEADER_SIZE;
        if available < expected {
            return Err(ParseError::LengthMismatch {
                context: format!("BIT_CHANNEL for pivot {pivot}"),
                expected,
                actual: available,
            });
        }

        let start = Self::HEADER_SIZE;
        Ok(Self {
            first_frame,
            last_frame,
            flags,
            pivot,
            default_value,
            bits: payload[start..start + expected].to_vec(),
        })
    }
}

/// Header of a COMPRESSED_ANIMATION
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedAnimationHeader {
    pub version: u32,
    pub name: String,
    pub hierarchy_name: String,
    pub num_frames: u32,
    pub frame_rate: u16,
    /// Channel encoding, [`FLAVOR_TIMECODED`] or [`FLAVOR_ADAPTIVE_DELTA`]
    pub flavor: u16,
}

impl Record for CompressedAnimationHeader {
    const SIZE: usize = 44;

    fn read<R: Read>(rdr: &mut R) -> ParseResult<Self> {
        Ok(Self {
            version: rdr.read_u32::<LittleEndian>()?,
            name: io::read_fixed_str(rdr, NAME_LEN)?,
            hierarchy_name: io::read_fixed_str(rdr, NAME_LEN)?,
            num_frames: rdr.read_u32::<LittleEndian>()?,
            frame_rate: rdr.read_u16::<LittleEndian>()?,
            flavor: rdr.read_u16::<LittleEndian>()?,
        })
    }

    fn write<W: Write>(&self, wtr: &mut W) -> ParseResult<()> {
        wtr.write_u32::<LittleEndian>(self.version)?;
        io::write_fixed_str(wtr, &self.name, NAME_LEN)?;
        io::write_fixed_str(wtr, &self.hierarchy_name, NAME_LEN)?;
        wtr.write_u32::<LittleEndian>(self.num_frames)?;
        wtr.write_u16::<LittleEndian>(self.frame_rate)?;
        wtr.write_u16::<LittleEndian>(self.flavor)?;
        Ok(())
    }
}

/// Time-coded compressed channel. Read-only; samples stay packed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimecodedChannel {
    pub num_time_codes: u32,
    pub pivot: u16,
    pub vector_len: u8,
    pub flags: u8,
    pub data: Vec<u8>,
}

impl TimecodedChannel {
    pub const HEADER_SIZE: usize = 8;

    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut rdr = Cursor::new(payload);
        Ok(Self {
            num_time_codes: rdr.read_u32::<LittleEndian>()?,
            pivot: rdr.read_u16::<LittleEndian>()?,
            vector_len: rdr.read_u8()?,
            flags: rdr.read_u8()?,
            data: payload[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

/// Adaptive-delta compressed channel. Read-only; samples stay packed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptiveDeltaChannel {
    pub num_frames: u32,
    pub pivot: u16,
    pub vector_len: u8,
    pub flags: u8,
    pub scale: f32,
    pub data: Vec<u8>,
}

impl AdaptiveDeltaChannel {
    pub const HEADER_SIZE: usize = 12;

    pub fn decode(payload: &[u8]) -> ParseResult<Self> {
        let mut rdr = Cursor::new(payload);
        Ok(Self {
            num_frames: rdr.read_u32::<LittleEndian>()?,
            pivot: rdr.read_u16::<LittleEndian>()?,
            vector_len: rdr.read_u8()?,
            flags: rdr.read_u8()?,
            scale: rdr.read_f32::<LittleEndian>()?,
            data: payload[Self::HEADER_SIZE..].to_vec(),
        })
    }
}

fn expected_len(first: u16, last: u16, vector_len: u16) -> usize {
    let frames = usize::from(last.saturating_sub(first)) + 1;
    frames * usize::from(vector_len) * 4
}

fn check_frame_range(first: u16, last: u16, what: &str) -> ParseResult<()> {
    if last < first {
        return Err(ParseError::InvalidStructure(format!(
            "{what} ends at frame {last} before its first frame {first}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_payload(first: u16, last: u16, vector_len: u16, data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in [first, last, vector_len, 0, 1, 0] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf.extend_from_slice(data);
        buf
    }

    #[test]
    fn test_channel_trailing_padding_is_dropped() {
        let mut data = Vec::new();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        data.extend_from_slice(&[0, 0, 0, 0]);

        let channel = AnimationChannel::decode(&channel_payload(0, 1, 1, &data)).unwrap();
        assert_eq!(channel.data.len(), 8);
        assert_eq!(channel.expected_data_len(), 8);
    }

    #[test]
    fn test_channel_short_data_is_rejected() {
        let err = AnimationChannel::decode(&channel_payload(0, 3, 1, &[0; 8])).unwrap_err();
        assert!(matches!(
            err,
            ParseError::LengthMismatch { expected: 16, actual: 8, .. }
        ));
    }

    #[test]
    fn test_channel_reversed_range_is_rejected() {
        let err = AnimationChannel::decode(&channel_payload(5, 2, 1, &[])).unwrap_err();
        assert!(matches!(err, ParseError::InvalidStructure(_)));
    }

    #[test]
    fn test_bit_channel_byte_count() {
        let mut payload = Vec::new();
        for v in [0u16, 9, 0, 2] {
            payload.extend_from_slice(&v.to_le_bytes());
        }
        payload.push(1);
        payload.extend_from_slice(&[0b1010_1010, 0b0000_0011]);

        let channel = BitChannel::decode(&payload).unwrap();
        assert_eq!(channel.bits.len(), 2);
        assert_eq!(channel.default_value, 1);
        assert_eq!(channel.pivot, 2);
    }
}
