//! Ziplist blob walking.
//!
//! A ziplist arrives as one length-prefixed string: an 11-byte header
//! (zlbytes, zltail, zllen), the packed entries, and a 0xFF end byte. Each
//! entry carries a previous-entry length (1 byte, or 5 when the first byte is
//! 254) followed by a flag byte selecting an embedded integer or a string of
//! 6/14/32-bit length.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::cursor::ByteCursor;
use crate::types::{RdbError, RdbResult};

#[derive(Debug, Clone)]
pub enum ZiplistEntry {
    String(Vec<u8>),
    Number(i64),
}

/// Read zlbytes, zltail and the 16-bit element count.
pub fn read_ziplist_metadata(cur: &mut ByteCursor) -> RdbResult<(u32, u32, u16)> {
    let zlbytes = cur.read_u32_le()?;
    let zltail = cur.read_u32_le()?;
    let zllen = cur.read_u16_le()?;

    Ok((zlbytes, zltail, zllen))
}

/// Read one entry, rendering embedded integers to decimal text.
pub fn read_ziplist_entry_string(cur: &mut ByteCursor) -> RdbResult<Vec<u8>> {
    match read_ziplist_entry(cur)? {
        ZiplistEntry::String(val) => Ok(val),
        ZiplistEntry::Number(val) => Ok(val.to_string().into_bytes()),
    }
}

fn read_ziplist_entry(cur: &mut ByteCursor) -> RdbResult<ZiplistEntry> {
    // 1 or 5 bytes length of the previous entry, not needed for a forward walk
    let prev_len = cur.read_u8()?;
    if prev_len == 254 {
        cur.skip(4)?;
    }

    let flag = cur.read_u8()?;

    let length: u64 = match (flag & 0xC0) >> 6 {
        0 => (flag & 0x3F) as u64,
        1 => {
            let next_byte = cur.read_u8()?;
            (((flag & 0x3F) as u64) << 8) | next_byte as u64
        }
        2 => BigEndian::read_u32(cur.slice(4)?) as u64,
        _ => {
            let number: i64 = match flag {
                0xC0 => cur.read_i16_le()? as i64,
                0xD0 => cur.read_i32_le()? as i64,
                0xE0 => cur.read_i64_le()?,
                0xF0 => {
                    let bytes = cur.slice(3)?;
                    let mut quad = [0u8; 4];
                    quad[1..].copy_from_slice(bytes);
                    (LittleEndian::read_i32(&quad) >> 8) as i64
                }
                0xFE => cur.read_i8()? as i64,
                _ if flag >> 4 == 0xF => (flag & 0x0F) as i64 - 1,
                _ => {
                    return Err(RdbError::ParsingError {
                        context: "ziplist",
                        message: format!("unknown entry header byte {}", flag),
                    })
                }
            };

            return Ok(ZiplistEntry::Number(number));
        }
    };

    Ok(ZiplistEntry::String(cur.slice(length as usize)?.to_vec()))
}
