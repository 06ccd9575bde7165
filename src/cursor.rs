//! Zero-copy reader over an in-memory blob.
//!
//! Compact encodings (ziplist, zipmap, intset) arrive as one length-prefixed
//! string and are walked in place; slices borrow from the blob instead of
//! copying element by element.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::types::{RdbError, RdbResult};

pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> ByteCursor<'a> {
        ByteCursor { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Borrow the next `len` bytes and advance past them.
    pub fn slice(&mut self, len: usize) -> RdbResult<&'a [u8]> {
        if self.remaining() < len {
            return Err(RdbError::MissingValue("bytes in compact encoding"));
        }
        let s = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(s)
    }

    pub fn skip(&mut self, len: usize) -> RdbResult<()> {
        self.slice(len).map(|_| ())
    }

    pub fn read_u8(&mut self) -> RdbResult<u8> {
        Ok(self.slice(1)?[0])
    }

    pub fn read_i8(&mut self) -> RdbResult<i8> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_u16_le(&mut self) -> RdbResult<u16> {
        Ok(LittleEndian::read_u16(self.slice(2)?))
    }

    pub fn read_i16_le(&mut self) -> RdbResult<i16> {
        Ok(LittleEndian::read_i16(self.slice(2)?))
    }

    pub fn read_u32_le(&mut self) -> RdbResult<u32> {
        Ok(LittleEndian::read_u32(self.slice(4)?))
    }

    pub fn read_i32_le(&mut self) -> RdbResult<i32> {
        Ok(LittleEndian::read_i32(self.slice(4)?))
    }

    pub fn read_u32_be(&mut self) -> RdbResult<u32> {
        Ok(BigEndian::read_u32(self.slice(4)?))
    }

    pub fn read_u64_le(&mut self) -> RdbResult<u64> {
        Ok(LittleEndian::read_u64(self.slice(8)?))
    }

    pub fn read_i64_le(&mut self) -> RdbResult<i64> {
        Ok(LittleEndian::read_i64(self.slice(8)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slices_advance_and_borrow() {
        let data = [1u8, 2, 3, 4, 5];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(&[1, 2], cur.slice(2).unwrap());
        assert_eq!(2, cur.position());
        assert_eq!(3, cur.read_u8().unwrap());
        assert_eq!(2, cur.remaining());
    }

    #[test]
    fn short_reads_fail() {
        let mut cur = ByteCursor::new(&[1u8, 2]);
        assert!(cur.slice(3).is_err());
        // failed read must not consume anything
        assert_eq!(0, cur.position());
    }

    #[test]
    fn endian_reads() {
        let mut cur = ByteCursor::new(&[0x01, 0x02, 0x00, 0x00, 0x00, 0x02]);
        assert_eq!(0x0201, cur.read_u16_le().unwrap());
        assert_eq!(2, cur.read_u32_be().unwrap());
    }
}
