use serde::Serialize;
use thiserror::Error;

use crate::constants::encoding_type;

#[derive(Error, Debug)]
pub enum RdbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No value found after {0}")]
    MissingValue(&'static str),
    #[error("Unknown value type: {0}")]
    UnknownValueType(u8),
    #[error("Unknown string encoding: {0}")]
    UnknownEncodingValue(u32),
    #[error("Unsupported RDB version: {0}")]
    UnsupportedVersion(u32),
    #[error("Module objects are not supported (module id {id})")]
    UnsupportedModule { id: u64 },
    #[error("Module aux fields are not supported")]
    UnsupportedModuleAux,
    #[error("Checksum mismatch in DUMP payload")]
    InvalidChecksum,
    #[error("Parsing error in {context}: {message}")]
    ParsingError {
        context: &'static str,
        message: String,
    },
}

pub type RdbResult<T> = Result<T, RdbError>;

pub type RdbOk = RdbResult<()>;

/// Logical key type, as reported in the output records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Type {
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Stream,
}

impl Type {
    pub fn from_value_type(value_type: u8) -> RdbResult<Type> {
        match value_type {
            encoding_type::STRING => Ok(Type::String),
            encoding_type::HASH | encoding_type::HASH_ZIPMAP | encoding_type::HASH_ZIPLIST => {
                Ok(Type::Hash)
            }
            encoding_type::LIST | encoding_type::LIST_ZIPLIST | encoding_type::LIST_QUICKLIST => {
                Ok(Type::List)
            }
            encoding_type::SET | encoding_type::SET_INTSET => Ok(Type::Set),
            encoding_type::ZSET | encoding_type::ZSET_2 | encoding_type::ZSET_ZIPLIST => {
                Ok(Type::SortedSet)
            }
            encoding_type::STREAM_LIST_PACKS => Ok(Type::Stream),
            _ => Err(RdbError::UnknownValueType(value_type)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Type::String => "string",
            Type::List => "list",
            Type::Set => "set",
            Type::SortedSet => "sortedset",
            Type::Hash => "hash",
            Type::Stream => "stream",
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the value is laid out inside the RDB stream. Selects the per-element
/// overhead formulas applied while accumulating an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    String,
    LinkedList,
    Hashtable,
    Skiplist,
    Intset,
    Ziplist,
    Zipmap,
    Quicklist,
    Listpack,
}

/// Per-object decode context, valid from a `start_*` event until the matching
/// `end_*`.
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub encoding: Encoding,
    /// Serialized blob size for compact encodings that report it up front.
    pub size_of_value: Option<u64>,
    /// Node count for quicklists; 0 otherwise.
    pub quicklist_nodes: u64,
    /// LRU idle time carried over from a preceding IDLE opcode.
    pub idle: u64,
    /// LFU access frequency carried over from a preceding FREQ opcode.
    pub freq: u8,
}

impl ObjectInfo {
    pub fn new(encoding: Encoding) -> ObjectInfo {
        ObjectInfo {
            encoding,
            size_of_value: None,
            quicklist_nodes: 0,
            idle: 0,
            freq: 0,
        }
    }
}

/// Estimated memory footprint of one top-level key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Entry {
    pub key: String,
    pub bytes: u64,
    #[serde(rename = "Type")]
    pub typ: Type,
    pub num_elements: u64,
    pub largest_element_length: u64,
    pub largest_element_name: String,
}

impl Entry {
    pub fn new(key: String, bytes: u64, typ: Type, num_elements: u64) -> Entry {
        Entry {
            key,
            bytes,
            typ,
            num_elements,
            largest_element_length: 0,
            largest_element_name: String::new(),
        }
    }
}

/// A pending stream entry: 16-byte big-endian ID plus delivery bookkeeping.
#[derive(Debug, Clone)]
pub struct StreamPendingEntry {
    pub id: [u8; 16],
    pub delivery_time: u64,
    pub delivery_count: u64,
}

#[derive(Debug, Clone)]
pub struct StreamConsumer {
    pub name: Vec<u8>,
    pub seen_time: u64,
    pub pending: Vec<[u8; 16]>,
}

#[derive(Debug, Clone)]
pub struct StreamGroup {
    pub name: Vec<u8>,
    pub last_entry_id: String,
    pub pending: Vec<StreamPendingEntry>,
    pub consumers: Vec<StreamConsumer>,
}
