//! Read-only per-file report assembled after the entry stream closes.

use indexmap::IndexMap;
use serde::Serialize;

use crate::counter::{Counter, PrefixEntry, SlotEntry};
use crate::types::{Entry, Type};

/// A prefix group stops growing past this many rows unless a row is at least
/// one megabyte.
const PREFIX_GROUP_SOFT_LIMIT: usize = 50;
const PREFIX_GROUP_MIN_BYTES: u64 = 1000 * 1000;

#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// How many largest entries and slots to keep.
    pub top_n: usize,
    /// Drop largest entries smaller than this many bytes.
    pub size_threshold: u64,
}

impl Default for ReportOptions {
    fn default() -> ReportOptions {
        ReportOptions {
            top_n: 100,
            size_threshold: 0,
        }
    }
}

/// Everything the renderers need about one snapshot file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Report {
    pub current_instance: String,
    pub largest_keys: Vec<Entry>,
    pub largest_key_prefixes: IndexMap<Type, Vec<PrefixEntry>>,
    pub type_bytes: IndexMap<Type, u64>,
    pub type_num: IndexMap<Type, u64>,
    pub total_num: u64,
    pub total_bytes: u64,
    pub len_level_count: IndexMap<Type, Vec<PrefixEntry>>,
    pub slot_bytes: Vec<SlotEntry>,
    pub slot_nums: Vec<SlotEntry>,
    #[serde(rename = "CTime")]
    pub ctime: i64,
    pub memory_use: i64,
}

impl Report {
    /// Extract the final aggregations for one file.
    pub fn build(filename: &str, counter: &Counter, options: ReportOptions) -> Report {
        let mut largest_key_prefixes: IndexMap<Type, Vec<PrefixEntry>> = IndexMap::new();
        for prefix in counter.largest_prefixes() {
            let group = largest_key_prefixes.entry(prefix.typ).or_default();
            // below one megabyte a long group gains nothing from more rows
            if prefix.bytes < PREFIX_GROUP_MIN_BYTES && group.len() > PREFIX_GROUP_SOFT_LIMIT {
                continue;
            }
            group.push(prefix);
        }

        let mut len_level_count: IndexMap<Type, Vec<PrefixEntry>> = IndexMap::new();
        for row in counter.length_level_rows() {
            len_level_count.entry(row.typ).or_default().push(row);
        }

        let total_num = counter.type_num().values().sum();
        let total_bytes = counter.type_bytes().values().sum();

        Report {
            current_instance: filename.to_string(),
            largest_keys: counter.largest_entries(options.top_n, options.size_threshold),
            largest_key_prefixes,
            type_bytes: counter.type_bytes().clone(),
            type_num: counter.type_num().clone(),
            total_num,
            total_bytes,
            len_level_count,
            slot_bytes: counter.top_slots_by_bytes(options.top_n),
            slot_nums: counter.top_slots_by_count(options.top_n),
            ctime: 0,
            memory_use: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(key: &str, bytes: u64, typ: Type) -> Entry {
        Entry::new(key.to_string(), bytes, typ, 0)
    }

    fn counted(entries: Vec<Entry>) -> Counter {
        let mut counter = Counter::new();
        for e in entries {
            counter.count(e);
        }
        counter.reduce_prefixes();
        counter
    }

    #[test]
    fn totals_cover_all_types() {
        let counter = counted(vec![
            entry("a", 10, Type::String),
            entry("b", 20, Type::Hash),
            entry("c", 30, Type::Hash),
        ]);
        let report = Report::build("dump.rdb", &counter, ReportOptions::default());

        assert_eq!("dump.rdb", report.current_instance);
        assert_eq!(3, report.total_num);
        assert_eq!(60, report.total_bytes);
        assert_eq!(Some(&50), report.type_bytes.get(&Type::Hash));
    }

    #[test]
    fn largest_keys_honor_top_n() {
        let entries = (0..20u64)
            .map(|i| entry(&format!("k{}", i), i, Type::String))
            .collect();
        let counter = counted(entries);

        let report = Report::build(
            "x",
            &counter,
            ReportOptions {
                top_n: 3,
                size_threshold: 0,
            },
        );
        assert_eq!(3, report.largest_keys.len());
        assert_eq!(19, report.largest_keys[0].bytes);
    }

    #[test]
    fn prefixes_are_grouped_by_type() {
        let counter = counted(vec![
            entry("user:1", 10, Type::Hash),
            entry("user:2", 10, Type::Hash),
            entry("queue:a", 5, Type::List),
        ]);
        let report = Report::build("x", &counter, ReportOptions::default());

        let hash_rows = report.largest_key_prefixes.get(&Type::Hash).unwrap();
        assert!(hash_rows.iter().any(|p| p.key == "user" && p.num == 2));
        assert!(report.largest_key_prefixes.contains_key(&Type::List));
    }

    #[test]
    fn report_serializes_to_json() {
        let counter = counted(vec![entry("a:b", 10, Type::String)]);
        let report = Report::build("dump.rdb", &counter, ReportOptions::default());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!("dump.rdb", json["CurrentInstance"]);
        assert_eq!(10, json["TypeBytes"]["string"]);
        assert_eq!(1, json["TotalNum"]);
        assert!(json["CTime"].is_i64());
    }
}
