use std::io::Write;

use crc::{Crc, CRC_64_REDIS};
use pretty_assertions::assert_eq;

use rdbmem::events::{EventSink, NopSink};
use rdbmem::profile::{profile_file, profile_reader, ReportOptions};
use rdbmem::types::{ObjectInfo, RdbError, Type};
use rdbmem::{decode, decode_dump, MemProfiler};

/// Byte-image builder for synthetic snapshots.
#[derive(Default)]
struct Image {
    bytes: Vec<u8>,
}

impl Image {
    fn new() -> Image {
        let mut image = Image::default();
        image.bytes.extend_from_slice(b"REDIS0009");
        image
    }

    fn raw(mut self, bytes: &[u8]) -> Image {
        self.bytes.extend_from_slice(bytes);
        self
    }

    fn blob(mut self, data: &[u8]) -> Image {
        assert!(data.len() < 64, "fixture strings stay in the 6-bit range");
        self.bytes.push(data.len() as u8);
        self.bytes.extend_from_slice(data);
        self
    }

    fn select_db(self, db: u8) -> Image {
        self.raw(&[0xFE, db])
    }

    fn aux(self, key: &[u8], value: &[u8]) -> Image {
        self.raw(&[0xFA]).blob(key).blob(value)
    }

    fn string(self, key: &[u8], value: &[u8]) -> Image {
        self.raw(&[0]).blob(key).blob(value)
    }

    fn eof(self) -> Vec<u8> {
        self.raw(&[0xFF]).bytes
    }
}

/// A two-entry ziplist blob holding `values`, including its length prefix.
fn ziplist_blob(values: &[&[u8]]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&0u32.to_le_bytes()); // zlbytes, not validated
    body.extend_from_slice(&0u32.to_le_bytes()); // zltail, not validated
    body.extend_from_slice(&(values.len() as u16).to_le_bytes());

    let mut prev_len = 0u8;
    for value in values {
        body.push(prev_len);
        assert!(value.len() < 64);
        body.push(value.len() as u8);
        body.extend_from_slice(value);
        prev_len = 2 + value.len() as u8;
    }
    body.push(0xFF);

    let mut blob = vec![body.len() as u8];
    blob.extend_from_slice(&body);
    blob
}

#[test]
fn end_to_end_minimal_string_snapshot() {
    let image = Image::new().select_db(0).string(b"foo", b"12345").eof();
    let profile = profile_reader(image.as_slice(), "minimal.rdb", ReportOptions::default());

    assert!(profile.error.is_none());
    let report = profile.report;
    assert_eq!(Some(&1), report.type_num.get(&Type::String));
    assert_eq!(1, report.total_num);

    let entry = &report.largest_keys[0];
    assert_eq!("foo", entry.key);
    assert_eq!(Type::String, entry.typ);
    assert_eq!(0, entry.num_elements);

    // key overhead: dict entry + sds("foo") + robj; value: plain integer
    let mem = MemProfiler::with_seed(1);
    let expected = mem.top_level_obj_overhead(b"foo", None) + mem.sizeof_string(b"12345");
    assert_eq!(expected, entry.bytes);
}

#[test]
fn kitchen_sink_snapshot_counts_every_type() {
    let mut image = Image::new()
        .aux(b"ctime", b"1700000000")
        .aux(b"used-mem", b"4096")
        .select_db(0)
        // resize hint, forwarded as metadata only
        .raw(&[0xFB, 4, 1]);

    // string with a millisecond expiry
    image = image.raw(&[0xFC]).raw(&1_700_000_100_000u64.to_le_bytes());
    image = image.string(b"str", b"hello");

    // hashtable hash, two fields
    image = image.raw(&[4]).blob(b"h").raw(&[2]);
    image = image.blob(b"f1").blob(b"v1").blob(b"f2").blob(b"v2");

    // hashtable set, two members
    image = image.raw(&[2]).blob(b"s").raw(&[2]).blob(b"m1").blob(b"m2");

    // legacy sorted set, one member with a text score
    image = image.raw(&[3]).blob(b"z").raw(&[1]).blob(b"member");
    image = image.raw(&[4]).raw(b"3.14");

    // zset2, one member with a binary score
    image = image.raw(&[5]).blob(b"z2").raw(&[1]).blob(b"m");
    image = image.raw(&2.5f64.to_le_bytes());

    // linked list, two values
    image = image.raw(&[1]).blob(b"l").raw(&[2]).blob(b"aa").blob(b"bb");

    // ziplist-encoded list
    image = image.raw(&[10]).blob(b"zl").raw(&ziplist_blob(&[b"a", b"b"]));

    // quicklist with one ziplist node
    image = image.raw(&[14]).blob(b"ql").raw(&[1]).raw(&ziplist_blob(&[b"x", b"y"]));

    // intset with two 4-byte members
    let mut intset = Vec::new();
    intset.extend_from_slice(&4u32.to_le_bytes());
    intset.extend_from_slice(&2u32.to_le_bytes());
    intset.extend_from_slice(&100i32.to_le_bytes());
    intset.extend_from_slice(&200i32.to_le_bytes());
    image = image.raw(&[11]).blob(b"is").blob(&intset);

    // zipmap hash, one field with a free byte on the value
    let zipmap = vec![1u8, 1, b'f', 3, 1, b'v', b'a', b'l', 0, 0xFF];
    image = image.raw(&[9]).blob(b"zm").blob(&zipmap);

    // ziplist-encoded hash and sorted set, one pair each
    image = image.raw(&[13]).blob(b"hzl").raw(&ziplist_blob(&[b"f", b"v"]));
    image = image.raw(&[12]).blob(b"zzl").raw(&ziplist_blob(&[b"m", b"42"]));

    let profile = profile_reader(
        image.eof().as_slice(),
        "kitchen.rdb",
        ReportOptions::default(),
    );
    assert!(profile.error.is_none(), "decode failed: {:?}", profile.error);

    let report = profile.report;
    assert_eq!(Some(&1), report.type_num.get(&Type::String));
    assert_eq!(Some(&3), report.type_num.get(&Type::Hash));
    assert_eq!(Some(&2), report.type_num.get(&Type::Set));
    assert_eq!(Some(&3), report.type_num.get(&Type::SortedSet));
    assert_eq!(Some(&3), report.type_num.get(&Type::List));
    assert_eq!(12, report.total_num);

    assert_eq!(1_700_000_000, report.ctime);
    assert_eq!(4096, report.memory_use);

    let by_key = |key: &str| {
        report
            .largest_keys
            .iter()
            .find(|e| e.key == key)
            .unwrap_or_else(|| panic!("missing entry {key}"))
    };

    assert_eq!(2, by_key("ql").num_elements);
    assert_eq!(2, by_key("zl").num_elements);
    assert_eq!(2, by_key("is").num_elements);
    assert_eq!(1, by_key("zm").num_elements);
    assert_eq!(1, by_key("hzl").num_elements);
    assert_eq!(1, by_key("zzl").num_elements);
    // f1 and f2 tie on logical length, the earlier one wins
    assert_eq!("f1", by_key("h").largest_element_name);
}

#[test]
fn expiry_applies_to_the_next_key_only() {
    let image = Image::new()
        .select_db(0)
        .raw(&[0xFC])
        .raw(&1_700_000_100_000u64.to_le_bytes())
        .string(b"with", b"x")
        .string(b"without", b"x")
        .eof();

    let profile = profile_reader(image.as_slice(), "expiry.rdb", ReportOptions::default());
    assert!(profile.error.is_none());

    let mem = MemProfiler::with_seed(1);
    let report = profile.report;
    let bytes_of = |key: &str| {
        report
            .largest_keys
            .iter()
            .find(|e| e.key == key)
            .unwrap()
            .bytes
    };

    // the key names round to the same sds size class, so the expiry adds
    // exactly one dict entry + timestamp
    assert_eq!(
        mem.key_expiry_overhead(Some(1)),
        bytes_of("with") - bytes_of("without")
    );
}

#[test]
fn lzf_compressed_values_are_measured_decompressed() {
    // 24 * "a": one literal, then an overlapping back-reference of 23
    let mut image = Image::new().select_db(0).raw(&[0]).blob(b"k").bytes;
    image.extend_from_slice(&[0xC3, 5, 24, 0x00, 0x61, 0xE0, 0x0E, 0x00]);
    image.push(0xFF);

    let profile = profile_reader(image.as_slice(), "lzf.rdb", ReportOptions::default());
    assert!(profile.error.is_none());

    let mem = MemProfiler::with_seed(1);
    let entry = &profile.report.largest_keys[0];
    let expected =
        mem.top_level_obj_overhead(b"k", None) + mem.sizeof_string(&[b'a'; 24]);
    assert_eq!(expected, entry.bytes);
}

#[test]
fn stream_entries_are_size_accounted() {
    let mut image = Image::new().select_db(0).raw(&[15]).blob(b"st").bytes;
    image.push(1); // one master entry
    image.extend_from_slice(&[16]); // 16-byte stream ID
    image.extend_from_slice(&[0u8; 16]);
    image.push(6); // listpack blob, content never decoded
    image.extend_from_slice(b"opaque");
    image.push(2); // total items
    image.extend_from_slice(&[5, 1]); // last delivered ID 5-1
    image.push(1); // one consumer group
    let mut group = vec![1u8, b'g', 5, 0]; // name "g", last ID 5-0
    group.push(1); // one pending entry
    group.extend_from_slice(&[0u8; 16]);
    group.extend_from_slice(&7u64.to_le_bytes());
    group.push(2); // delivery count
    group.push(1); // one consumer
    group.extend_from_slice(&[1, b'c']);
    group.extend_from_slice(&9u64.to_le_bytes());
    group.push(1); // consumer pending list
    group.extend_from_slice(&[0u8; 16]);
    image.extend_from_slice(&group);
    image.push(0xFF);

    let profile = profile_reader(image.as_slice(), "stream.rdb", ReportOptions::default());
    assert!(profile.error.is_none(), "decode failed: {:?}", profile.error);

    let entry = &profile.report.largest_keys[0];
    assert_eq!(Type::Stream, entry.typ);

    let mem = MemProfiler::with_seed(1);
    let expected = mem.top_level_obj_overhead(b"st", None)
        + mem.stream_overhead()
        + mem.sizeof_stream_radix_tree(1)
        + mem.malloc_overhead(6)
        + mem.sizeof_stream_radix_tree(1) // group pending entries
        + mem.stream_nack_overhead(1)
        + mem.stream_consumer_overhead(b"c")
        + mem.sizeof_stream_radix_tree(1); // consumer allowance
    assert_eq!(expected, entry.bytes);
}

#[test]
fn module_objects_fail_fast_with_their_id() {
    let image = Image::new().select_db(0).raw(&[6]).blob(b"m").raw(&[42]).eof();
    let err = decode(image.as_slice(), NopSink).unwrap_err();
    assert!(matches!(err, RdbError::UnsupportedModule { id: 42 }));
}

#[test]
fn module_aux_fails_fast() {
    let image = Image::new().select_db(0).raw(&[0xF7]).eof();
    let err = decode(image.as_slice(), NopSink).unwrap_err();
    assert!(matches!(err, RdbError::UnsupportedModuleAux));
}

#[test]
fn unknown_value_types_fail_fast() {
    let image = Image::new().select_db(0).raw(&[99]).blob(b"k").eof();
    let err = decode(image.as_slice(), NopSink).unwrap_err();
    assert!(matches!(err, RdbError::UnknownValueType(99)));
}

#[test]
fn bad_magic_fails_fast() {
    let err = decode(&b"RESIS0009\xFF"[..], NopSink).unwrap_err();
    assert!(matches!(err, RdbError::MissingValue(_)));
}

#[test]
fn future_versions_are_rejected() {
    let err = decode(&b"REDIS0010\xFF"[..], NopSink).unwrap_err();
    assert!(matches!(err, RdbError::UnsupportedVersion(10)));
}

#[test]
fn dump_payload_round_trip_and_rejection() {
    const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

    let mut payload = vec![0u8, 5];
    payload.extend_from_slice(b"hello");
    payload.extend_from_slice(&9u16.to_le_bytes());
    let crc = CRC64.checksum(&payload);
    payload.extend_from_slice(&crc.to_le_bytes());

    #[derive(Default)]
    struct Captured(Vec<String>);
    impl EventSink for Captured {
        fn set(&mut self, key: &[u8], _value: &[u8], _expiry: Option<u64>, _info: &ObjectInfo) {
            self.0.push(String::from_utf8_lossy(key).into_owned());
        }
    }

    let mut sink = Captured::default();
    decode_dump(&payload, 0, b"k", None, &mut sink).unwrap();
    assert_eq!(vec!["k".to_string()], sink.0);

    let mut corrupted = payload.clone();
    let last = corrupted.len() - 1;
    corrupted[last] ^= 1;
    assert!(matches!(
        decode_dump(&corrupted, 0, b"k", None, NopSink).unwrap_err(),
        RdbError::InvalidChecksum
    ));
}

#[test]
fn profiles_a_file_on_disk() {
    let image = Image::new().select_db(0).string(b"foo", b"12345").eof();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&image).unwrap();

    let profile = profile_file(file.path(), ReportOptions::default()).unwrap();
    assert!(profile.error.is_none());
    assert_eq!(1, profile.report.total_num);
}
