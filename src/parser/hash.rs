use std::io::Read;

use super::common::utils::{read_blob, read_length};
use super::common::{
    count_zipmap_items, read_zipmap_item, read_ziplist_entry_string, read_ziplist_metadata,
};
use crate::cursor::ByteCursor;
use crate::events::EventSink;
use crate::types::{ObjectInfo, RdbError, RdbOk};

pub fn read_hash<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    info: ObjectInfo,
) -> RdbOk {
    let mut hash_items = read_length(input)?;

    sink.start_hash(key, hash_items as i64, expiry, &info);

    while hash_items > 0 {
        let field = read_blob(input)?;
        let value = read_blob(input)?;
        sink.hash_set(key, &field, &value);
        hash_items -= 1;
    }

    sink.end_hash(key);

    Ok(())
}

pub fn read_hash_ziplist<R: Read, S: EventSink>(
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

    if zllen % 2 != 0 {
        return Err(RdbError::ParsingError {
            context: "read_hash_ziplist",
            message: format!("odd entry count {} in hash ziplist", zllen),
        });
    }
    let pairs = zllen / 2;

    sink.start_hash(key, pairs as i64, expiry, &info);

    for _ in 0..pairs {
        let field = read_ziplist_entry_string(&mut cur)?;
        let value = read_ziplist_entry_string(&mut cur)?;
        sink.hash_set(key, &field, &value);
    }

    if cur.read_u8()? != 0xFF {
        return Err(RdbError::MissingValue("end byte of ziplist"));
    }

    sink.end_hash(key);

    Ok(())
}

pub fn read_hash_zipmap<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    mut info: ObjectInfo,
) -> RdbOk {
    let zipmap = read_blob(input)?;
    info.size_of_value = Some(zipmap.len() as u64);

    let mut cur = ByteCursor::new(&zipmap);
    let zmlen = cur.read_u8()?;

    // A count byte of 254+ means the header cannot hold the real count and
    // the blob has to be scanned once.
    let pairs = if zmlen < 254 {
        zmlen as usize
    } else {
        count_zipmap_items(&mut ByteCursor::new(&zipmap[1..]))? / 2
    };

    sink.start_hash(key, pairs as i64, expiry, &info);

    for _ in 0..pairs {
        let field = read_zipmap_item(&mut cur, false)?
            .ok_or(RdbError::MissingValue("zipmap field"))?;
        let value = read_zipmap_item(&mut cur, true)?
            .ok_or(RdbError::MissingValue("zipmap value"))?;
        sink.hash_set(key, &field, &value);
    }

    if cur.read_u8()? != 0xFF {
        return Err(RdbError::MissingValue("end byte of zipmap"));
    }

    sink.end_hash(key);

    Ok(())
}
