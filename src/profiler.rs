//! Turns the decode-event stream into per-key [`Entry`] records.

use crossbeam_channel::Sender;
use tracing::{debug, warn};

use crate::events::EventSink;
use crate::mem::MemProfiler;
use crate::types::{Encoding, Entry, ObjectInfo, StreamGroup, Type};

/// Event consumer that estimates the resident size of every key and pushes
/// finished entries into a queue.
///
/// Keys arrive strictly sequentially, never interleaved, so a single mutable
/// slot holds the in-progress entry together with its decode context.
pub struct Profiler {
    mem: MemProfiler,
    entries: Sender<Entry>,
    current: Option<CurrentObject>,
    rdb_version: u32,
    ctime: i64,
    used_mem: i64,
}

struct CurrentObject {
    entry: Entry,
    info: ObjectInfo,
}

impl Profiler {
    pub fn new(entries: Sender<Entry>) -> Profiler {
        Profiler::with_mem(MemProfiler::new(), entries)
    }

    pub fn with_mem(mem: MemProfiler, entries: Sender<Entry>) -> Profiler {
        Profiler {
            mem,
            entries,
            current: None,
            rdb_version: 0,
            ctime: 0,
            used_mem: 0,
        }
    }

    /// Snapshot creation time from the `ctime` AUX field, 0 if absent.
    pub fn ctime(&self) -> i64 {
        self.ctime
    }

    /// Recorded memory usage from the `used-mem` AUX field, 0 if absent.
    pub fn used_mem(&self) -> i64 {
        self.used_mem
    }

    fn open(&mut self, key: &[u8], typ: Type, bytes: u64, num_elements: u64, info: &ObjectInfo) {
        let entry = Entry::new(
            String::from_utf8_lossy(key).into_owned(),
            bytes,
            typ,
            num_elements,
        );
        self.current = Some(CurrentObject {
            entry,
            info: info.clone(),
        });
    }

    /// Start-of-object cost for the table-backed types (hash, set): fixed
    /// per-key overhead plus either the compact blob's own size or a
    /// synthesized hashtable estimate.
    fn open_table(
        &mut self,
        key: &[u8],
        typ: Type,
        length: i64,
        expiry: Option<u64>,
        info: &ObjectInfo,
    ) {
        let mut bytes = self.mem.top_level_obj_overhead(key, expiry);
        bytes += match info.size_of_value {
            Some(size) => size,
            None => self.mem.hashtable_overhead(length.max(0) as u64),
        };

        self.open(key, typ, bytes, length.max(0) as u64, info);
    }

    fn finish(&mut self) {
        if let Some(current) = self.current.take() {
            if self.entries.send(current.entry).is_err() {
                debug!("entry receiver dropped, discarding");
            }
        }
    }

    fn track_largest(entry: &mut Entry, len: u64, name: &[u8]) {
        if len > entry.largest_element_length {
            entry.largest_element_length = len;
            entry.largest_element_name = String::from_utf8_lossy(name).into_owned();
        }
    }

    /// Formats older than 8 wrapped each element in its own object header.
    fn legacy_robj_overhead(&self, count: u64) -> u64 {
        if self.rdb_version < 8 {
            count * self.mem.robj_overhead()
        } else {
            0
        }
    }
}

impl EventSink for Profiler {
    fn start_rdb(&mut self, version: u32) {
        self.rdb_version = version;
    }

    fn aux(&mut self, key: &[u8], value: &[u8]) {
        let field = match key {
            b"ctime" => &mut self.ctime,
            b"used-mem" => &mut self.used_mem,
            _ => return,
        };
        match std::str::from_utf8(value).ok().and_then(|v| v.parse().ok()) {
            Some(parsed) => *field = parsed,
            None => warn!(
                field = %String::from_utf8_lossy(key),
                value = %String::from_utf8_lossy(value),
                "unparseable aux field"
            ),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8], expiry: Option<u64>, _info: &ObjectInfo) {
        let bytes = self.mem.top_level_obj_overhead(key, expiry) + self.mem.sizeof_string(value);

        let entry = Entry::new(
            String::from_utf8_lossy(key).into_owned(),
            bytes,
            Type::String,
            0,
        );
        if self.entries.send(entry).is_err() {
            debug!("entry receiver dropped, discarding");
        }
    }

    fn start_hash(&mut self, key: &[u8], length: i64, expiry: Option<u64>, info: &ObjectInfo) {
        self.open_table(key, Type::Hash, length, expiry, info);
    }

    fn hash_set(&mut self, _key: &[u8], field: &[u8], value: &[u8]) {
        let field_cost = self.mem.sizeof_string(field) + self.mem.sizeof_string(value);
        let entry_overhead = self.mem.hashtable_entry_overhead();
        let legacy = self.legacy_robj_overhead(2);

        let len = self.mem.elem_len(field) + self.mem.elem_len(value);
        if let Some(current) = self.current.as_mut() {
            Profiler::track_largest(&mut current.entry, len, field);
            if current.info.encoding == Encoding::Hashtable {
                current.entry.bytes += field_cost + entry_overhead + legacy;
            }
        }
    }

    fn end_hash(&mut self, _key: &[u8]) {
        self.finish();
    }

    fn start_set(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {
        self.open_table(key, Type::Set, cardinality, expiry, info);
    }

    fn set_add(&mut self, _key: &[u8], member: &[u8]) {
        let member_cost = self.mem.sizeof_string(member) + self.mem.hashtable_entry_overhead();
        let legacy = self.legacy_robj_overhead(1);

        let len = self.mem.elem_len(member);
        if let Some(current) = self.current.as_mut() {
            Profiler::track_largest(&mut current.entry, len, member);
            if current.info.encoding == Encoding::Hashtable {
                current.entry.bytes += member_cost + legacy;
            }
        }
    }

    fn end_set(&mut self, _key: &[u8]) {
        self.finish();
    }

    fn start_list(&mut self, key: &[u8], _length: i64, expiry: Option<u64>, info: &ObjectInfo) {
        // The element count is unreliable here (quicklists report -1), so the
        // entry starts at 0 and counts pushes.
        let bytes = self.mem.top_level_obj_overhead(key, expiry);
        self.open(key, Type::List, bytes, 0, info);
    }

    fn list_push(&mut self, _key: &[u8], value: &[u8]) {
        let packed_cost = self.mem.ziplist_entry_overhead(value);
        let node_cost = self.mem.linked_list_entry_overhead();
        let value_cost = if parses_as_i32(value) {
            0
        } else {
            self.mem.sizeof_string(value)
        };
        let legacy = self.legacy_robj_overhead(1);

        let len = self.mem.elem_len(value);
        if let Some(current) = self.current.as_mut() {
            current.entry.num_elements += 1;

            match current.info.encoding {
                Encoding::Quicklist | Encoding::Ziplist => {
                    current.entry.bytes += packed_cost;
                }
                Encoding::LinkedList => {
                    current.entry.bytes += node_cost + value_cost + legacy;
                }
                _ => {}
            }

            Profiler::track_largest(&mut current.entry, len, value);
        }
    }

    fn end_list(&mut self, _key: &[u8]) {
        if let Some(current) = self.current.as_mut() {
            current.entry.bytes += match current.info.encoding {
                Encoding::Quicklist => {
                    self.mem.quicklist_overhead(current.info.quicklist_nodes)
                        + self.mem.ziplist_header_overhead() * current.info.quicklist_nodes
                }
                Encoding::Ziplist => self.mem.ziplist_header_overhead(),
                Encoding::LinkedList => self.mem.linkedlist_overhead(),
                _ => 0,
            };
        }
        self.finish();
    }

    fn start_zset(&mut self, key: &[u8], cardinality: i64, expiry: Option<u64>, info: &ObjectInfo) {
        let mut bytes = self.mem.top_level_obj_overhead(key, expiry);
        bytes += match info.size_of_value {
            Some(size) => size,
            None => self.mem.skiplist_overhead(cardinality.max(0) as u64),
        };

        self.open(key, Type::SortedSet, bytes, cardinality.max(0) as u64, info);
    }

    fn zset_add(&mut self, _key: &[u8], _score: f64, member: &[u8]) {
        let is_skiplist = self
            .current
            .as_ref()
            .is_some_and(|c| c.info.encoding == Encoding::Skiplist);

        // only skiplist members carry per-entry cost, and the level sampling
        // should not run for packed encodings
        let added = if is_skiplist {
            8 + self.mem.sizeof_string(member) // score is a double
                + self.mem.skiplist_entry_overhead()
                + self.legacy_robj_overhead(1)
        } else {
            0
        };

        let len = self.mem.elem_len(member);
        if let Some(current) = self.current.as_mut() {
            Profiler::track_largest(&mut current.entry, len, member);
            current.entry.bytes += added;
        }
    }

    fn end_zset(&mut self, _key: &[u8]) {
        self.finish();
    }

    fn start_stream(
        &mut self,
        key: &[u8],
        cardinality: i64,
        expiry: Option<u64>,
        info: &ObjectInfo,
    ) {
        let bytes = self.mem.top_level_obj_overhead(key, expiry)
            + self.mem.stream_overhead()
            + self.mem.sizeof_stream_radix_tree(cardinality.max(0) as u64);

        self.open(key, Type::Stream, bytes, 0, info);
    }

    fn stream_add(&mut self, _key: &[u8], _id: &[u8], listpack: &[u8]) {
        let cost = self.mem.malloc_overhead(listpack.len() as u64);
        if let Some(current) = self.current.as_mut() {
            current.entry.bytes += cost;
        }
    }

    fn end_stream(
        &mut self,
        _key: &[u8],
        _items: u64,
        _last_entry_id: &str,
        groups: &[StreamGroup],
    ) {
        let mut cost = 0;
        for group in groups {
            let pending = group.pending.len() as u64;
            cost += self.mem.sizeof_stream_radix_tree(pending);
            cost += self.mem.stream_nack_overhead(pending);

            for consumer in &group.consumers {
                cost += self.mem.stream_consumer_overhead(&consumer.name);
                cost += self.mem.sizeof_stream_radix_tree(pending);
            }
        }

        if let Some(current) = self.current.as_mut() {
            current.entry.bytes += cost;
        }
        self.finish();
    }
}

fn parses_as_i32(value: &[u8]) -> bool {
    std::str::from_utf8(value)
        .ok()
        .and_then(|s| s.parse::<i32>().ok())
        .is_some()
}
