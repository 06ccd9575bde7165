use std::io::Read;

use super::common::utils::{read_binary_double, read_blob, read_float, read_length};
use super::common::{read_ziplist_entry_string, read_ziplist_metadata};
use crate::cursor::ByteCursor;
use crate::events::EventSink;
use crate::types::{ObjectInfo, RdbError, RdbOk};

/// Scores are decimal text in the legacy encoding and raw little-endian
/// doubles in the newer one.
pub fn read_sorted_set<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    info: ObjectInfo,
    binary_scores: bool,
) -> RdbOk {
    let mut cardinality = read_length(input)?;

    sink.start_zset(key, cardinality as i64, expiry, &info);

    while cardinality > 0 {
        let member = read_blob(input)?;
        let score = if binary_scores {
            read_binary_double(input)?
        } else {
            read_float(input)?
        };
        sink.zset_add(key, score, &member);
        cardinality -= 1;
    }

    sink.end_zset(key);

    Ok(())
}

pub fn read_sortedset_ziplist<R: Read, S: EventSink>(
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
            context: "read_sortedset_ziplist",
            message: format!("odd entry count {} in sorted-set ziplist", zllen),
        });
    }
    let pairs = zllen / 2;

    sink.start_zset(key, pairs as i64, expiry, &info);

    for _ in 0..pairs {
        let member = read_ziplist_entry_string(&mut cur)?;
        let score_text = read_ziplist_entry_string(&mut cur)?;
        let score = std::str::from_utf8(&score_text)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or(RdbError::MissingValue("sorted set score"))?;
        sink.zset_add(key, score, &member);
    }

    if cur.read_u8()? != 0xFF {
        return Err(RdbError::MissingValue("end byte of ziplist"));
    }

    sink.end_zset(key);

    Ok(())
}
