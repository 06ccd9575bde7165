use std::io::Read;

use super::common::utils::{read_blob, read_length};
use crate::cursor::ByteCursor;
use crate::events::EventSink;
use crate::types::{ObjectInfo, RdbError, RdbOk};

pub fn read_set<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    info: ObjectInfo,
) -> RdbOk {
    let mut cardinality = read_length(input)?;

    sink.start_set(key, cardinality as i64, expiry, &info);

    while cardinality > 0 {
        let member = read_blob(input)?;
        sink.set_add(key, &member);
        cardinality -= 1;
    }

    sink.end_set(key);

    Ok(())
}

pub fn read_set_intset<R: Read, S: EventSink>(
    input: &mut R,
    sink: &mut S,
    key: &[u8],
    expiry: Option<u64>,
    mut info: ObjectInfo,
) -> RdbOk {
    let intset = read_blob(input)?;
    info.size_of_value = Some(intset.len() as u64);

    let mut cur = ByteCursor::new(&intset);
    let byte_size = cur.read_u32_le()?;

    if byte_size != 2 && byte_size != 4 && byte_size != 8 {
        return Err(RdbError::ParsingError {
            context: "read_set_intset",
            message: format!("unknown intset element width {}", byte_size),
        });
    }

    let cardinality = cur.read_u32_le()?;

    sink.start_set(key, cardinality as i64, expiry, &info);

    for _ in 0..cardinality {
        let value = match byte_size {
            2 => cur.read_i16_le()? as i64,
            4 => cur.read_i32_le()? as i64,
            _ => cur.read_i64_le()?,
        };

        sink.set_add(key, value.to_string().as_bytes());
    }

    sink.end_set(key);

    Ok(())
}
