//! CRC-16 used for link-level frame integrity and inside encrypted payloads

use bytes::{BufMut, BytesMut};
use crc::{CRC_16_ISO_IEC_14443_3_A, Crc};

use crate::response::FrameError;

const CRC_16_A: Crc<u16> = Crc::<u16>::new(&CRC_16_ISO_IEC_14443_3_A);

/// Length of the trailing checksum
pub const CHECKSUM_LEN: usize = 2;

/// CRC-16 (ISO/IEC 14443-3 type A) of `data`
pub fn crc16(data: &[u8]) -> u16 {
    CRC_16_A.checksum(data)
}

/// Append the little-endian checksum of the buffer contents
pub fn append_checksum(buf: &mut BytesMut) {
    let crc = crc16(buf);
    buf.put_u16_le(crc);
}

/// Verify and strip a trailing little-endian checksum
pub fn strip_checksum(frame: &[u8]) -> Result<&[u8], FrameError> {
    let Some(split) = frame.len().checked_sub(CHECKSUM_LEN) else {
        return Err(FrameError::Malformed {
            length: frame.len(),
        });
    };
    let (body, trailer) = frame.split_at(split);
    let expected = u16::from_le_bytes([trailer[0], trailer[1]]);
    let actual = crc16(body);
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }
    Ok(body)
}
