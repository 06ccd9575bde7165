//! Zipmap blob walking (legacy compact hash encoding).
//!
//! Layout: a count byte (>= 254 means the count must be recovered by
//! scanning), then alternating field/value items, then a 0xFF terminator.
//! Each item is a length prefix (1 byte, or 253 followed by a 4-byte length)
//! and values additionally carry a free-space byte whose padding follows the
//! data.

use byteorder::{BigEndian, ByteOrder};

use crate::cursor::ByteCursor;
use crate::types::{RdbError, RdbResult};

/// Item length plus free-space suffix. `None` marks the 0xFF terminator.
fn read_zipmap_item_length(
    cur: &mut ByteCursor,
    read_free: bool,
) -> RdbResult<Option<(usize, usize)>> {
    let first = cur.read_u8()?;
    let length = match first {
        253 => BigEndian::read_u32(cur.slice(4)?) as usize,
        254 => {
            return Err(RdbError::ParsingError {
                context: "zipmap",
                message: format!("invalid item length byte {}", first),
            })
        }
        255 => return Ok(None),
        _ => first as usize,
    };

    let free = if read_free { cur.read_u8()? as usize } else { 0 };
    Ok(Some((length, free)))
}

/// Read one item, skipping its free-space padding.
pub fn read_zipmap_item(cur: &mut ByteCursor, read_free: bool) -> RdbResult<Option<Vec<u8>>> {
    let (length, free) = match read_zipmap_item_length(cur, read_free)? {
        Some(pair) => pair,
        None => return Ok(None),
    };

    let value = cur.slice(length)?.to_vec();
    cur.skip(free)?;
    Ok(Some(value))
}

/// Count the items by scanning the whole blob once. Used when the count byte
/// signals "unknown". The cursor is consumed; callers scan a throwaway view.
pub fn count_zipmap_items(cur: &mut ByteCursor) -> RdbResult<usize> {
    let mut n = 0;
    loop {
        let (length, free) = match read_zipmap_item_length(cur, n % 2 != 0)? {
            Some(pair) => pair,
            None => break,
        };
        cur.skip(length + free)?;
        n += 1;
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    // field "f" -> value "val" with one byte of free space
    fn sample() -> Vec<u8> {
        vec![
            1, b'f', // field, no free byte
            3, 1, b'v', b'a', b'l', 0, // value, free = 1, one padding byte
            0xFF,
        ]
    }

    #[test]
    fn items_round_trip() {
        let blob = sample();
        let mut cur = ByteCursor::new(&blob);
        assert_eq!(b"f".to_vec(), read_zipmap_item(&mut cur, false).unwrap().unwrap());
        assert_eq!(
            b"val".to_vec(),
            read_zipmap_item(&mut cur, true).unwrap().unwrap()
        );
        assert_eq!(None, read_zipmap_item(&mut cur, false).unwrap());
    }

    #[test]
    fn counting_scans_to_terminator() {
        let blob = sample();
        let mut cur = ByteCursor::new(&blob);
        assert_eq!(2, count_zipmap_items(&mut cur).unwrap());
    }

    #[test]
    fn long_item_length() {
        let mut blob = vec![253];
        blob.extend_from_slice(&300u32.to_be_bytes());
        blob.extend(std::iter::repeat(b'x').take(300));
        blob.push(0xFF);
        let mut cur = ByteCursor::new(&blob);
        let item = read_zipmap_item(&mut cur, false).unwrap().unwrap();
        assert_eq!(300, item.len());
    }
}
