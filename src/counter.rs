//! Streaming aggregation of the entry stream.
//!
//! Entries are folded into five independent views: the largest entries, the
//! largest key-name prefixes, totals per type, totals per length bucket and
//! totals per cluster slot. Everything except the prefix maps is bounded
//! while the stream is still running; prefixes accumulate unbounded and are
//! reduced to a bounded heap once, when the stream closes.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crossbeam_channel::Receiver;
use indexmap::IndexMap;
use serde::Serialize;

use crate::slot::key_slot;
use crate::types::{Entry, Type};

pub const DEFAULT_LARGEST_ENTRIES: usize = 500;
pub const DEFAULT_LARGEST_PREFIXES: usize = 1000;

/// Exclusive length buckets, largest first. An entry lands in the first
/// bucket its element count strictly exceeds.
const LENGTH_LEVELS: [u64; 5] = [1_000_000, 100_000, 10_000, 1_000, 100];

/// Characters a key name is split at for prefix aggregation.
const SEPARATORS: &[char] = &[':', ';', ',', '_', '-', ' '];

/// Aggregated bytes/count for one `(type, key)` dimension, where the key is a
/// key-name prefix or a length bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PrefixEntry {
    #[serde(rename = "Type")]
    pub typ: Type,
    pub key: String,
    pub bytes: u64,
    pub num: u64,
}

impl Ord for PrefixEntry {
    // Ranking order: bytes, then count, then key text DESCENDING. The
    // inverted key comparison is load-bearing for output compatibility.
    fn cmp(&self, other: &Self) -> Ordering {
        self.bytes
            .cmp(&other.bytes)
            .then_with(|| self.num.cmp(&other.num))
            .then_with(|| other.key.cmp(&self.key))
            .then_with(|| self.typ.cmp(&other.typ))
    }
}

impl PartialOrd for PrefixEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SlotEntry {
    pub slot: u16,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ByBytes(Entry);

impl Ord for ByBytes {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .bytes
            .cmp(&other.0.bytes)
            .then_with(|| self.0.key.cmp(&other.0.key))
    }
}

impl PartialOrd for ByBytes {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeKey {
    typ: Type,
    key: String,
}

/// Consumes [`Entry`] values and keeps the running aggregations. All folds
/// are commutative, so entry order does not matter.
pub struct Counter {
    largest_entries: BinaryHeap<Reverse<ByBytes>>,
    largest_prefixes: BinaryHeap<Reverse<PrefixEntry>>,
    entry_capacity: usize,
    prefix_capacity: usize,
    length_level_bytes: IndexMap<TypeKey, u64>,
    length_level_num: IndexMap<TypeKey, u64>,
    key_prefix_bytes: IndexMap<TypeKey, u64>,
    key_prefix_num: IndexMap<TypeKey, u64>,
    type_bytes: IndexMap<Type, u64>,
    type_num: IndexMap<Type, u64>,
    slot_bytes: IndexMap<u16, u64>,
    slot_num: IndexMap<u16, u64>,
}

impl Default for Counter {
    fn default() -> Counter {
        Counter::new()
    }
}

impl Counter {
    pub fn new() -> Counter {
        Counter::with_capacities(DEFAULT_LARGEST_ENTRIES, DEFAULT_LARGEST_PREFIXES)
    }

    pub fn with_capacities(entry_capacity: usize, prefix_capacity: usize) -> Counter {
        Counter {
            largest_entries: BinaryHeap::new(),
            largest_prefixes: BinaryHeap::new(),
            entry_capacity,
            prefix_capacity,
            length_level_bytes: IndexMap::new(),
            length_level_num: IndexMap::new(),
            key_prefix_bytes: IndexMap::new(),
            key_prefix_num: IndexMap::new(),
            type_bytes: IndexMap::new(),
            type_num: IndexMap::new(),
            slot_bytes: IndexMap::new(),
            slot_num: IndexMap::new(),
        }
    }

    /// Drain a queue until it closes, then run the final prefix reduction.
    pub fn consume(&mut self, entries: Receiver<Entry>) {
        for entry in entries {
            self.count(entry);
        }
        self.reduce_prefixes();
    }

    pub fn count(&mut self, entry: Entry) {
        self.count_by_type(&entry);
        self.count_by_length(&entry);
        self.count_by_prefix(&entry);
        self.count_by_slot(&entry);
        self.count_largest(entry);
    }

    /// Collapse the per-prefix maps into the bounded top-K heap. Call once,
    /// after the last entry.
    pub fn reduce_prefixes(&mut self) {
        let bytes = std::mem::take(&mut self.key_prefix_bytes);
        let mut nums = std::mem::take(&mut self.key_prefix_num);

        for (type_key, bytes) in bytes {
            let num = nums.swap_remove(&type_key).unwrap_or(0);
            self.largest_prefixes.push(Reverse(PrefixEntry {
                typ: type_key.typ,
                key: type_key.key,
                bytes,
                num,
            }));
            if self.largest_prefixes.len() > self.prefix_capacity {
                self.largest_prefixes.pop();
            }
        }
    }

    fn count_largest(&mut self, entry: Entry) {
        self.largest_entries.push(Reverse(ByBytes(entry)));
        if self.largest_entries.len() > self.entry_capacity {
            self.largest_entries.pop();
        }
    }

    fn count_by_type(&mut self, entry: &Entry) {
        *self.type_num.entry(entry.typ).or_default() += 1;
        *self.type_bytes.entry(entry.typ).or_default() += entry.bytes;
    }

    fn count_by_length(&mut self, entry: &Entry) {
        // buckets are checked largest first and are mutually exclusive
        let Some(level) = LENGTH_LEVELS
            .iter()
            .find(|&&level| entry.num_elements > level)
        else {
            return;
        };

        let type_key = TypeKey {
            typ: entry.typ,
            key: level.to_string(),
        };
        *self.length_level_bytes.entry(type_key.clone()).or_default() += entry.bytes;
        *self.length_level_num.entry(type_key).or_default() += 1;
    }

    fn count_by_prefix(&mut self, entry: &Entry) {
        let normalized: String = entry
            .key
            .chars()
            .map(|c| if c.is_ascii_digit() { '0' } else { c })
            .collect();

        for prefix in prefixes(&normalized) {
            if prefix.is_empty() {
                continue;
            }
            let type_key = TypeKey {
                typ: entry.typ,
                key: prefix,
            };
            *self.key_prefix_bytes.entry(type_key.clone()).or_default() += entry.bytes;
            *self.key_prefix_num.entry(type_key).or_default() += 1;
        }
    }

    fn count_by_slot(&mut self, entry: &Entry) {
        if entry.key.is_empty() {
            return;
        }
        let slot = key_slot(&entry.key);
        *self.slot_num.entry(slot).or_default() += 1;
        *self.slot_bytes.entry(slot).or_default() += entry.bytes;
    }

    /// Retained largest entries, sorted descending by size, with entries
    /// below `size_threshold` dropped, at most `num` returned.
    pub fn largest_entries(&self, num: usize, size_threshold: u64) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .largest_entries
            .iter()
            .map(|Reverse(ByBytes(e))| e.clone())
            .filter(|e| e.bytes >= size_threshold)
            .collect();
        entries.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.key.cmp(&b.key)));
        entries.truncate(num);
        entries
    }

    /// Reduced top prefixes, largest first.
    pub fn largest_prefixes(&self) -> Vec<PrefixEntry> {
        let mut prefixes: Vec<PrefixEntry> = self
            .largest_prefixes
            .iter()
            .map(|Reverse(p)| p.clone())
            .collect();
        prefixes.sort_by(|a, b| b.cmp(a));
        prefixes
    }

    /// One row per populated `(type, bucket)` pair.
    pub fn length_level_rows(&self) -> Vec<PrefixEntry> {
        self.length_level_bytes
            .iter()
            .map(|(type_key, &bytes)| PrefixEntry {
                typ: type_key.typ,
                key: type_key.key.clone(),
                bytes,
                num: self.length_level_num.get(type_key).copied().unwrap_or(0),
            })
            .collect()
    }

    pub fn type_bytes(&self) -> &IndexMap<Type, u64> {
        &self.type_bytes
    }

    pub fn type_num(&self) -> &IndexMap<Type, u64> {
        &self.type_num
    }

    pub fn top_slots_by_bytes(&self, num: usize) -> Vec<SlotEntry> {
        top_slots(&self.slot_bytes, num)
    }

    pub fn top_slots_by_count(&self, num: usize) -> Vec<SlotEntry> {
        top_slots(&self.slot_num, num)
    }
}

fn top_slots(totals: &IndexMap<u16, u64>, num: usize) -> Vec<SlotEntry> {
    let mut slots: Vec<SlotEntry> = totals
        .iter()
        .map(|(&slot, &size)| SlotEntry { slot, size })
        .collect();
    slots.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.slot.cmp(&b.slot)));
    slots.truncate(num);
    slots
}

/// Cumulative prefixes of `s` at every separator, trailing separators
/// stripped, duplicates removed. A key without separators yields itself.
fn prefixes(s: &str) -> Vec<String> {
    let mut res: Vec<String> = Vec::new();
    let mut rest = s;

    let mut sep_idx = rest.find(SEPARATORS);
    if sep_idx.is_none() {
        res.push(rest.to_string());
    }
    while let Some(idx) = sep_idx {
        let piece = &rest[..=idx];
        let combined = match res.last() {
            Some(prev) => format!("{}{}", prev, piece),
            None => piece.to_string(),
        };
        res.push(combined);
        rest = &rest[idx + 1..];
        sep_idx = rest.find(SEPARATORS);
    }

    for prefix in &mut res {
        while prefix.ends_with(SEPARATORS) {
            prefix.pop();
        }
    }

    let mut seen = std::collections::HashSet::new();
    res.retain(|p| seen.insert(p.clone()));
    res
}
