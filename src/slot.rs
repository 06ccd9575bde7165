//! Cluster hash-slot assignment.

use crc::{Crc, CRC_16_XMODEM};

pub const SLOT_COUNT: u16 = 16384;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Slot for a key: CRC16 of the key modulo 16384. When the key carries a
/// non-empty `{...}` hash tag, only the tag participates, so related keys can
/// be pinned to one slot.
pub fn key_slot(key: &str) -> u16 {
    let hashed = hash_tag(key).unwrap_or(key);
    CRC16.checksum(hashed.as_bytes()) % SLOT_COUNT
}

fn hash_tag(key: &str) -> Option<&str> {
    let open = key.find('{')?;
    let close = key[open + 1..].find('}')?;
    if close == 0 {
        return None; // "{}" does not count
    }
    Some(&key[open + 1..open + 1 + close])
}
