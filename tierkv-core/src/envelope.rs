//! Record envelope: the byte frame every tier stores.
//!
//! # Binary Format
//!
//! - Byte 0: magic (0xA7)
//! - Byte 1: format version (0x01)
//! - Byte 2: type tag (see [`ValueType::tag`])
//! - Bytes 3-6: data length (u32, big-endian)
//! - Bytes 7..: data
//!
//! The explicit length makes truncation and trailing garbage detectable, so
//! a frame either decodes to exactly the value that was encoded or fails.

use crate::error::{CodecError, CodecResult};
use crate::value::{TaggedValue, ValueType};

const MAGIC: u8 = 0xA7;
const VERSION: u8 = 0x01;
const HEADER_LEN: usize = 7;

/// Encode a value into its stored frame.
pub fn encode(value: &TaggedValue) -> CodecResult<Vec<u8>> {
    let data = value.bytes();
    let len = u32::try_from(data.len()).map_err(|_| CodecError::MalformedEnvelope {
        reason: format!("data length {} exceeds u32", data.len()),
    })?;

    let mut frame = Vec::with_capacity(HEADER_LEN + data.len());
    frame.push(MAGIC);
    frame.push(VERSION);
    frame.push(value.value_type().tag());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(data);
    Ok(frame)
}

/// Decode a stored frame back into a value.
pub fn decode(frame: &[u8]) -> CodecResult<TaggedValue> {
    if frame.len() < HEADER_LEN {
        return Err(malformed(format!(
            "frame too short: {} bytes, header needs {}",
            frame.len(),
            HEADER_LEN
        )));
    }
    if frame[0] != MAGIC {
        return Err(malformed(format!("bad magic byte 0x{:02X}", frame[0])));
    }
    if frame[1] != VERSION {
        return Err(malformed(format!("unsupported version {}", frame[1])));
    }

    let value_type = ValueType::from_tag(frame[2])?;

    let len_bytes: [u8; 4] = frame[3..HEADER_LEN]
        .try_into()
        .map_err(|_| malformed("invalid length field".to_string()))?;
    let declared = u32::from_be_bytes(len_bytes) as usize;
    let data = &frame[HEADER_LEN..];
    if data.len() != declared {
        return Err(malformed(format!(
            "declared {} data bytes, found {}",
            declared,
            data.len()
        )));
    }

    TaggedValue::from_parts(value_type, data.to_vec())
}

fn malformed(reason: String) -> CodecError {
    CodecError::MalformedEnvelope { reason }
}

// =============================================================================
// TESTS
// =============================================================================
