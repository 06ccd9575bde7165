//! Length, string and float primitives shared by every object reader.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use crate::constants::{constant, encoding, version};
use crate::types::{RdbError, RdbOk, RdbResult};

/// Read a length prefix. Returns the value plus a flag telling whether it is
/// a real length or one of the special string encodings (int8/16/32, LZF).
pub fn read_length_with_encoding<R: Read>(input: &mut R) -> RdbResult<(u64, bool)> {
    let enc_type = input.read_u8()?;

    match (enc_type & 0xC0) >> 6 {
        constant::RDB_ENCVAL => Ok(((enc_type & 0x3F) as u64, true)),
        constant::RDB_6BITLEN => Ok(((enc_type & 0x3F) as u64, false)),
        constant::RDB_14BITLEN => {
            let next_byte = input.read_u8()?;
            Ok(((((enc_type & 0x3F) as u64) << 8) | next_byte as u64, false))
        }
        _ => match enc_type {
            constant::RDB_32BITLEN => Ok((input.read_u32::<byteorder::BigEndian>()? as u64, false)),
            constant::RDB_64BITLEN => Ok((input.read_u64::<byteorder::BigEndian>()?, false)),
            _ => Err(RdbError::ParsingError {
                context: "read_length",
                message: format!("unknown length encoding {}", enc_type),
            }),
        },
    }
}

pub fn read_length<R: Read>(input: &mut R) -> RdbResult<u64> {
    let (length, _) = read_length_with_encoding(input)?;
    Ok(length)
}

pub fn verify_magic<R: Read>(input: &mut R) -> RdbOk {
    let mut magic = [0; 5];
    match input.read(&mut magic) {
        Ok(5) => (),
        Ok(_) => return Err(RdbError::MissingValue("magic bytes")),
        Err(e) => return Err(RdbError::Io(e)),
    };

    if magic == constant::RDB_MAGIC.as_bytes() {
        Ok(())
    } else {
        Err(RdbError::MissingValue("invalid magic string"))
    }
}

/// Read and validate the 4-digit ASCII version following the magic.
pub fn read_version<R: Read>(input: &mut R) -> RdbResult<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;

    for &byte in &buf {
        if !byte.is_ascii_digit() {
            return Err(RdbError::MissingValue("invalid version number"));
        }
    }

    let version = std::str::from_utf8(&buf)
        .expect("ascii digits")
        .parse::<u32>()
        .expect("ascii digits");

    if !(version::SUPPORTED_MINIMUM..=version::SUPPORTED_MAXIMUM).contains(&version) {
        return Err(RdbError::UnsupportedVersion(version));
    }

    Ok(version)
}

/// Read one string value. Integer encodings are rendered to decimal text,
/// LZF payloads are decompressed.
pub fn read_blob<R: Read>(input: &mut R) -> RdbResult<Vec<u8>> {
    let (length, is_encoded) = read_length_with_encoding(input)?;

    if is_encoded {
        let result = match length as u32 {
            encoding::INT8 => int_to_vec(i64::from(input.read_i8()?)),
            encoding::INT16 => int_to_vec(i64::from(input.read_i16::<LittleEndian>()?)),
            encoding::INT32 => int_to_vec(i64::from(input.read_i32::<LittleEndian>()?)),
            encoding::LZF => {
                let compressed_length = read_length(input)?;
                let real_length = read_length(input)?;
                let data = read_exact(input, compressed_length as usize)?;
                lzf::decompress(&data, real_length as usize).map_err(|e| {
                    RdbError::ParsingError {
                        context: "lzf",
                        message: format!("{:?}", e),
                    }
                })?
            }
            other => return Err(RdbError::UnknownEncodingValue(other)),
        };

        Ok(result)
    } else {
        read_exact(input, length as usize)
    }
}

/// Legacy score format: a length-prefixed decimal string with sentinel
/// lengths for NaN and the infinities.
pub fn read_float<R: Read>(input: &mut R) -> RdbResult<f64> {
    let length = input.read_u8()?;
    match length {
        253 => Ok(f64::NAN),
        254 => Ok(f64::INFINITY),
        255 => Ok(f64::NEG_INFINITY),
        _ => {
            let bytes = read_exact(input, length as usize)?;
            std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .ok_or(RdbError::MissingValue("float value"))
        }
    }
}

/// Newer score format: a raw little-endian IEEE-754 double.
pub fn read_binary_double<R: Read>(input: &mut R) -> RdbResult<f64> {
    Ok(input.read_f64::<LittleEndian>()?)
}

pub fn int_to_vec(number: i64) -> Vec<u8> {
    number.to_string().into_bytes()
}

pub fn read_exact<T: Read>(reader: &mut T, len: usize) -> RdbResult<Vec<u8>> {
    let mut buf = vec![0; len];
    reader.read_exact(&mut buf)?;

    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::io::Cursor;

    #[rstest]
    #[case(&[0x0], (0, false), 1)]
    #[case(&[0x7f, 0xff], (16383, false), 2)]
    #[case(&[0x80, 0xff, 0xff, 0xff, 0xff], (4294967295, false), 5)]
    #[case(&[0x81, 0, 0, 0, 1, 0, 0, 0, 0], (1 << 32, false), 9)]
    #[case(&[0xC0], (0, true), 1)]
    fn test_read_length(
        #[case] input: &[u8],
        #[case] expected: (u64, bool),
        #[case] expected_position: u64,
    ) {
        let mut cursor = Cursor::new(Vec::from(input));
        assert_eq!(expected, read_length_with_encoding(&mut cursor).unwrap());
        assert_eq!(expected_position, cursor.position());
    }

    #[test]
    fn test_read_blob_plain() {
        assert_eq!(
            vec![0x61, 0x62, 0x63, 0x64],
            read_blob(&mut Cursor::new(vec![4, 0x61, 0x62, 0x63, 0x64])).unwrap()
        );
    }

    #[rstest]
    #[case(&[0xC0, 0x7B], b"123")]
    #[case(&[0xC0, 0x85], b"-123")]
    #[case(&[0xC1, 0x39, 0x30], b"12345")]
    #[case(&[0xC2, 0x87, 0xD6, 0x12, 0x00], b"1234567")]
    fn test_read_blob_integer_encodings(#[case] input: &[u8], #[case] expected: &[u8]) {
        assert_eq!(
            expected.to_vec(),
            read_blob(&mut Cursor::new(Vec::from(input))).unwrap()
        );
    }

    #[test]
    fn test_read_blob_lzf() {
        // "aaaaaaaaaaaaaaaaaaaaaaaa" (24 bytes) as one literal + back-reference
        let mut input = vec![0xC3];
        input.push(5); // compressed length
        input.push(24); // uncompressed length
        input.extend_from_slice(&[0x00, 0x61, 0xE0, 0x0E, 0x00]);
        assert_eq!(
            vec![b'a'; 24],
            read_blob(&mut Cursor::new(input)).unwrap()
        );
    }

    #[test]
    fn test_verify_magic() {
        assert!(verify_magic(&mut Cursor::new(vec![0x52, 0x45, 0x44, 0x49, 0x53])).is_ok());
        assert!(verify_magic(&mut Cursor::new(vec![0x51, 0x0, 0x0, 0x0, 0x0])).is_err());
    }

    #[rstest]
    #[case(&[0x30, 0x30, 0x30, 0x33], Some(3))]
    #[case(&[0x30, 0x30, 0x30, 0x39], Some(9))]
    #[case(&[0x30, 0x30, 0x31, 0x30], None)] // 10 is above the supported maximum
    #[case(&[0x30, 0x30, 0x30, 0x3a], None)] // not a digit
    fn test_read_version(#[case] input: &[u8], #[case] expected: Option<u32>) {
        let result = read_version(&mut Cursor::new(Vec::from(input)));
        match expected {
            Some(v) => assert_eq!(v, result.unwrap()),
            None => assert!(result.is_err()),
        }
    }

    #[rstest]
    #[case(&[253], f64::NAN)]
    #[case(&[254], f64::INFINITY)]
    #[case(&[255], f64::NEG_INFINITY)]
    #[case(&[4, b'3', b'.', b'1', b'4'], 3.14)]
    fn test_read_float(#[case] input: &[u8], #[case] expected: f64) {
        let got = read_float(&mut Cursor::new(Vec::from(input))).unwrap();
        if expected.is_nan() {
            assert!(got.is_nan());
        } else {
            assert_eq!(expected, got);
        }
    }
}
