//! Decoding of single-object payloads produced by the `DUMP` command.
//!
//! A payload is `<type byte><object bytes><2-byte LE version><8-byte LE
//! CRC64>`. The trailer is verified before any object bytes are touched.

use crc::{Crc, CRC_64_REDIS};

use super::rdb::RdbParser;
use crate::constants::version;
use crate::events::EventSink;
use crate::types::{RdbError, RdbOk};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Decode one DUMP payload against `sink`, bracketed by synthetic
/// file/database events. The database, key and expiry are not part of the
/// payload and must be supplied by the caller.
pub fn decode_dump<S: EventSink>(
    payload: &[u8],
    db: u64,
    key: &[u8],
    expiry: Option<u64>,
    mut sink: S,
) -> RdbOk {
    verify_dump(payload)?;

    let value_type = payload[0];
    let body = &payload[1..payload.len() - 10];

    sink.start_rdb(0);
    sink.start_database(db);

    let mut parser = RdbParser::new(body, &mut sink);
    let result = parser.read_object(key, value_type, expiry);

    sink.end_database(db);
    sink.end_rdb();

    result
}

fn verify_dump(payload: &[u8]) -> RdbOk {
    if payload.len() < 10 {
        return Err(RdbError::MissingValue("DUMP payload trailer"));
    }

    let trailer = &payload[payload.len() - 10..];
    let payload_version = u16::from_le_bytes([trailer[0], trailer[1]]) as u32;
    if payload_version > version::SUPPORTED_MAXIMUM {
        return Err(RdbError::UnsupportedVersion(payload_version));
    }

    let stored_crc = u64::from_le_bytes(trailer[2..].try_into().expect("8-byte trailer"));
    let computed_crc = CRC64.checksum(&payload[..payload.len() - 8]);
    if stored_crc != computed_crc {
        return Err(RdbError::InvalidChecksum);
    }

    Ok(())
}

/// Append the version/CRC trailer to a bare object image. Only used to build
/// fixtures; the tool itself never encodes.
#[cfg(test)]
pub(crate) fn seal_dump(mut payload: Vec<u8>, payload_version: u16) -> Vec<u8> {
    payload.extend_from_slice(&payload_version.to_le_bytes());
    let crc = CRC64.checksum(&payload);
    payload.extend_from_slice(&crc.to_le_bytes());
    payload
}
