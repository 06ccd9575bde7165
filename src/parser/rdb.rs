use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Read;

use super::common::utils::{read_blob, read_length, read_version, verify_magic};
use super::{hash, list, set, sorted_set, stream};
use crate::constants::{encoding_type, op_code};
use crate::events::EventSink;
use crate::types::{Encoding, ObjectInfo, RdbError, RdbOk};

/// Streaming RDB reader. Walks the byte stream strictly once, translating
/// opcodes and objects into calls on the sink.
///
/// Any malformed or unsupported construct aborts the whole decode: the format
/// is not self-describing enough to resynchronize past a bad object.
pub struct RdbParser<R: Read, S: EventSink> {
    input: R,
    sink: S,
    last_expiretime: Option<u64>,
    last_idle: u64,
    last_freq: u8,
    rdb_version: u32,
}

impl<R: Read, S: EventSink> RdbParser<R, S> {
    pub fn new(input: R, sink: S) -> RdbParser<R, S> {
        RdbParser {
            input,
            sink,
            last_expiretime: None,
            last_idle: 0,
            last_freq: 0,
            rdb_version: 0,
        }
    }

    /// Format version declared in the header, available after `parse` has
    /// consumed it.
    pub fn rdb_version(&self) -> u32 {
        self.rdb_version
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    pub fn parse(&mut self) -> RdbOk {
        verify_magic(&mut self.input)?;
        self.rdb_version = read_version(&mut self.input)?;

        self.sink.start_rdb(self.rdb_version);

        let mut current_database: u64 = 0;
        let mut seen_database = false;
        loop {
            let next_op = self.input.read_u8()?;

            match next_op {
                op_code::SELECTDB => {
                    if seen_database {
                        self.sink.end_database(current_database);
                    }
                    current_database = read_length(&mut self.input)?;
                    seen_database = true;
                    self.sink.start_database(current_database);
                }
                op_code::EOF => {
                    self.sink.end_database(current_database);
                    self.sink.end_rdb();
                    break;
                }
                op_code::EXPIRETIME_MS => {
                    self.last_expiretime = Some(self.input.read_u64::<LittleEndian>()?);
                }
                op_code::EXPIRETIME => {
                    let seconds = self.input.read_u32::<LittleEndian>()?;
                    self.last_expiretime = Some(seconds as u64 * 1000);
                }
                op_code::IDLE => {
                    self.last_idle = read_length(&mut self.input)?;
                }
                op_code::FREQ => {
                    self.last_freq = self.input.read_u8()?;
                }
                op_code::RESIZEDB => {
                    let db_size = read_length(&mut self.input)?;
                    let expires_size = read_length(&mut self.input)?;
                    self.sink.resize_database(db_size, expires_size);
                }
                op_code::AUX => {
                    let aux_key = read_blob(&mut self.input)?;
                    let aux_value = read_blob(&mut self.input)?;
                    self.sink.aux(&aux_key, &aux_value);
                }
                op_code::MODULE_AUX => {
                    return Err(RdbError::UnsupportedModuleAux);
                }
                value_type => {
                    let key = read_blob(&mut self.input)?;
                    let expiry = self.last_expiretime;
                    self.read_object(&key, value_type, expiry)?;

                    self.last_expiretime = None;
                    self.last_idle = 0;
                    self.last_freq = 0;
                }
            }
        }

        Ok(())
    }

    pub(crate) fn read_object(
        &mut self,
        key: &[u8],
        value_type: u8,
        expiry: Option<u64>,
    ) -> RdbOk {
        match value_type {
            encoding_type::STRING => {
                let value = read_blob(&mut self.input)?;
                let info = self.object_info(Encoding::String);
                self.sink.set(key, &value, expiry, &info);
                Ok(())
            }
            encoding_type::LIST => {
                let info = self.object_info(Encoding::LinkedList);
                list::read_linked_list(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::SET => {
                let info = self.object_info(Encoding::Hashtable);
                set::read_set(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::ZSET | encoding_type::ZSET_2 => {
                let info = self.object_info(Encoding::Skiplist);
                sorted_set::read_sorted_set(
                    &mut self.input,
                    &mut self.sink,
                    key,
                    expiry,
                    info,
                    value_type == encoding_type::ZSET_2,
                )
            }
            encoding_type::HASH => {
                let info = self.object_info(Encoding::Hashtable);
                hash::read_hash(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::HASH_ZIPMAP => {
                let info = self.object_info(Encoding::Zipmap);
                hash::read_hash_zipmap(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::LIST_ZIPLIST => {
                let info = self.object_info(Encoding::Ziplist);
                list::read_list_ziplist(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::SET_INTSET => {
                let info = self.object_info(Encoding::Intset);
                set::read_set_intset(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::ZSET_ZIPLIST => {
                let info = self.object_info(Encoding::Ziplist);
                sorted_set::read_sortedset_ziplist(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::HASH_ZIPLIST => {
                let info = self.object_info(Encoding::Ziplist);
                hash::read_hash_ziplist(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::LIST_QUICKLIST => {
                let info = self.object_info(Encoding::Quicklist);
                list::read_quicklist(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::STREAM_LIST_PACKS => {
                let info = self.object_info(Encoding::Listpack);
                stream::read_stream(&mut self.input, &mut self.sink, key, expiry, info)
            }
            encoding_type::MODULE | encoding_type::MODULE_2 => {
                let id = read_length(&mut self.input)?;
                Err(RdbError::UnsupportedModule { id })
            }
            unknown => Err(RdbError::UnknownValueType(unknown)),
        }
    }

    fn object_info(&self, encoding: Encoding) -> ObjectInfo {
        ObjectInfo {
            encoding,
            size_of_value: None,
            quicklist_nodes: 0,
            idle: self.last_idle,
            freq: self.last_freq,
        }
    }
}

/// Decode a whole RDB stream into `sink`.
pub fn decode<R: Read, S: EventSink>(input: R, sink: S) -> RdbOk {
    RdbParser::new(input, sink).parse()
}
