use std::io::Read;

use super::common::utils::{read_blob, read_length};
use super::common::{read_ziplist_entry_string, read_ziplist_metadata};
use crate::cursor::ByteCursor;
use crate::events::EventSink;
use crate::types::{ObjectInfo, RdbError, RdbOk};

pub fn read_linked_list<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    info: ObjectInfo,
) -> RdbOk {
    let mut len = read_length(input)?;

    sink.start_list(key, len as i64, expiry, &info);

    while len > 0 {
        let blob = read_blob(input)?;
        sink.list_push(key, &blob);
        len -= 1;
    }

    sink.end_list(key);
    Ok(())
}

pub fn read_list_ziplist<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    mut info: ObjectInfo,
) -> RdbOk {
    let ziplist = read_blob(input)?;
    info.size_of_value = Some(ziplist.len() as u64);

    let mut cur = ByteCursor::new(&ziplist);
    let (_zlbytes, _zltail, zllen) = read_ziplist_metadata(&mut cur)?;

    sink.start_list(key, zllen as i64, expiry, &info);

    for _ in 0..zllen {
        let entry = read_ziplist_entry_string(&mut cur)?;
        sink.list_push(key, &entry);
    }

    if cur.read_u8()? != 0xFF {
        return Err(RdbError::MissingValue("end byte of ziplist"));
    }

    sink.end_list(key);

    Ok(())
}

/// A quicklist is a sequence of ziplist nodes. The overall length is unknown
/// until every node has been walked, so `start_list` reports -1.
pub fn read_quicklist<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    mut info: ObjectInfo,
) -> RdbOk {
    let nodes = read_length(input)?;
    info.quicklist_nodes = nodes;

    sink.start_list(key, -1, expiry, &info);
    for _ in 0..nodes {
        read_quicklist_node(input, sink, key)?;
    }
    sink.end_list(key);

    Ok(())
}

fn read_quicklist_node<R: Read, S: EventSink>(input: &mut R, sink: &mut S, key: &[u8]) -> RdbOk {
    let ziplist = read_blob(input)?;

    let mut cur = ByteCursor::new(&ziplist);
    let (_zlbytes, _zltail, zllen) = read_ziplist_metadata(&mut cur)?;

    for _ in 0..zllen {
        let entry = read_ziplist_entry_string(&mut cur)?;
        sink.list_push(key, &entry);
    }

    if cur.read_u8()? != 0xFF {
        return Err(RdbError::MissingValue("end byte of quicklist node"));
    }

    Ok(())
}
