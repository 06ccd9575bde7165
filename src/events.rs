//! The decode-event protocol emitted by the parser.

use crate::types::{ObjectInfo, StreamGroup};

/// Receiver for the parser's event stream.
///
/// The parser calls these hooks in document order: `start_rdb`, then per
/// database a `start_database`/`end_database` pair bracketing the keys, then
/// `end_rdb`. Collection values arrive as a `start_*` call, one element call
/// per member, and a matching `end_*`; plain strings arrive as a single
/// [`set`](EventSink::set). Lengths are `i64` because a quicklist reports its
/// up-front length as the unknown sentinel (-1).
///
/// All methods default to no-ops so consumers implement only what they need.
#[allow(unused_variables)]
pub trait EventSink {
    fn start_rdb(&mut self, version: u32) {}
    fn end_rdb(&mut self) {}

    fn start_database(&mut self, db: u64) {}
    fn end_database(&mut self, db: u64) {}

    fn aux(&mut self, key: &[u8], value: &[u8]) {}
    fn resize_database(&mut self, db_size: u64, expires_size: u64) {}

    fn set(&mut self, key: &[u8], value: &[u8], expiry: Option<u64>, info: &ObjectInfo) {}

    fn start_hash(&mut self, key: &[u8], length: i64, expiry: Option<u64>, info: &ObjectInfo) {}
    fn hash_set(&mut self, key: &[u8], field: &[u8], value: &[u8]) {}
    fn end_hash(&mut self, key: &[u8]) {}

    fn start_set(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {}
    fn set_add(&mut self, key: &[u8], member: &[u8]) {}
    fn end_set(&mut self, key: &[u8]) {}

    fn start_list(&mut self, key: &[u8], length: i64, expiry: Option<u64>, info: &ObjectInfo) {}
    fn list_push(&mut self, key: &[u8], value: &[u8]) {}
    fn end_list(&mut self, key: &[u8]) {}

    fn start_zset(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {
    }
    fn zset_add(&mut self, key: &[u8], score: f64, member: &[u8]) {}
    fn end_zset(&mut self, key: &[u8]) {}

    fn start_stream(
        &mut self,
        key: &[u8],
        cardinality: i64,
        expiry: Option<u64>,
        info: &ObjectInfo,
    ) {
    }
    fn stream_add(&mut self, key: &[u8], id: &[u8], listpack: &[u8]) {}
    fn end_stream(&mut self, key: &[u8], items: u64, last_entry_id: &str, groups: &[StreamGroup]) {}
}

/// Sink that ignores everything. Useful as a base for tests and for walking
/// a file purely for validation.
pub struct NopSink;

impl EventSink for NopSink {}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn start_rdb(&mut self, version: u32) {
        (**self).start_rdb(version)
    }
    fn end_rdb(&mut self) {
        (**self).end_rdb()
    }
    fn start_database(&mut self, db: u64) {
        (**self).start_database(db)
    }
    fn end_database(&mut self, db: u64) {
        (**self).end_database(db)
    }
    fn aux(&mut self, key: &[u8], value: &[u8]) {
        (**self).aux(key, value)
    }
    fn resize_database(&mut self, db_size: u64, expires_size: u64) {
        (**self).resize_database(db_size, expires_size)
    }
    fn set(&mut self, key: &[u8], value: &[u8], expiry: Option<u64>, info: &ObjectInfo) {
        (**self).set(key, value, expiry, info)
    }
    fn start_hash(&mut self, key: &[u8], length: i64, expiry: Option<u64>, info: &ObjectInfo) {
        (**self).start_hash(key, length, expiry, info)
    }
    fn hash_set(&mut self, key: &[u8], field: &[u8], value: &[u8]) {
        (**self).hash_set(key, field, value)
    }
    fn end_hash(&mut self, key: &[u8]) {
        (**self).end_hash(key)
    }
    fn start_set(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {
        (**self).start_set(key, cardinality, expiry, info)
    }
    fn set_add(&mut self, key: &[u8], member: &[u8]) {
        (**self).set_add(key, member)
    }
    fn end_set(&mut self, key: &[u8]) {
        (**self).end_set(key)
    }
    fn start_list(&mut self, key: &[u8], length: i64, expiry: Option<u64>, info: &ObjectInfo) {
        (**self).start_list(key, length, expiry, info)
    }
    fn list_push(&mut self, key: &[u8], value: &[u8]) {
        (**self).list_push(key, value)
    }
    fn end_list(&mut self, key: &[u8]) {
        (**self).end_list(key)
    }
    fn start_zset(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {
        (**self).start_zset(key, cardinality, expiry, info)
    }
    fn zset_add(&mut self, key: &[u8], score: f64, member: &[u8]) {
        (**self).zset_add(key, score, member)
    }
    fn end_zset(&mut self, key: &[u8]) {
        (**self).end_zset(key)
    }
    fn start_stream(
        &mut self,
        key: &[u8],
        cardinality: i64,
        expiry: Option<u64>,
        info: &ObjectInfo,
    ) {
        (**self).start_stream(key, cardinality, expiry, info)
    }
    fn stream_add(&mut self, key: &[u8], id: &[u8], listpack: &[u8]) {
        (**self).stream_add(key, id, listpack)
    }
    fn end_stream(&mut self, key: &[u8], items: u64, last_entry_id: &str, groups: &[StreamGroup]) {
        (**self).end_stream(key, items, last_entry_id, groups)
    }
}
