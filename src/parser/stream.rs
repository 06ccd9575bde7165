use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use super::common::utils::{read_blob, read_exact, read_length};
use crate::events::EventSink;
use crate::types::{ObjectInfo, RdbError, RdbOk, StreamConsumer, StreamGroup, StreamPendingEntry};

/// Streams store master entries as a 16-byte big-endian ID plus a listpack
/// blob. The listpack payload is handed to the sink unopened; only its size
/// matters for accounting. The trailer (item count, last-delivered ID,
/// consumer groups with their pending-entry lists) is decoded so the sink can
/// account for its overhead.
pub fn read_stream<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    info: ObjectInfo,
) -> RdbOk {
    let mut cardinality = read_length(input)?;

    sink.start_stream(key, cardinality as i64, expiry, &info);

    while cardinality > 0 {
        let id = read_blob(input)?;
        let listpack = read_blob(input)?;
        sink.stream_add(key, &id, &listpack);
        cardinality -= 1;
    }

    let items = read_length(input)?;
    let last_id_ms = read_length(input)?;
    let last_id_seq = read_length(input)?;
    let last_entry_id = format!("{}-{}", last_id_ms, last_id_seq);

    let mut groups_count = read_length(input)?;
    let mut groups = Vec::with_capacity(groups_count as usize);

    while groups_count > 0 {
        groups.push(read_group(input)?);
        groups_count -= 1;
    }

    sink.end_stream(key, items, &last_entry_id, &groups);

    Ok(())
}

fn read_group<R: Read>(input: &mut R) -> Result<StreamGroup, RdbError> {
    let name = read_blob(input)?;
    let id_ms = read_length(input)?;
    let id_seq = read_length(input)?;
    let last_entry_id = format!("{}-{}", id_ms, id_seq);

    let mut pel_size = read_length(input)?;
    let mut pending = Vec::with_capacity(pel_size as usize);
    while pel_size > 0 {
        let id = read_raw_id(input)?;
        let delivery_time = input.read_u64::<LittleEndian>()?;
        let delivery_count = read_length(input)?;
        pending.push(StreamPendingEntry {
            id,
            delivery_time,
            delivery_count,
        });
        pel_size -= 1;
    }

    let mut consumers_count = read_length(input)?;
    let mut consumers = Vec::with_capacity(consumers_count as usize);
    while consumers_count > 0 {
        let name = read_blob(input)?;
        let seen_time = input.read_u64::<LittleEndian>()?;

        let mut pel_size = read_length(input)?;
        let mut pending = Vec::with_capacity(pel_size as usize);
        while pel_size > 0 {
            pending.push(read_raw_id(input)?);
            pel_size -= 1;
        }

        consumers.push(StreamConsumer {
            name,
            seen_time,
            pending,
        });
        consumers_count -= 1;
    }

    Ok(StreamGroup {
        name,
        last_entry_id,
        pending,
        consumers,
    })
}

fn read_raw_id<R: Read>(input: &mut R) -> Result<[u8; 16], RdbError> {
    let bytes = read_exact(input, 16)?;
    Ok(bytes.try_into().expect("16-byte read"))
}
