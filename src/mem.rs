//! Memory-cost model for Redis internal data structures.
//!
//! Every function returns the estimated number of bytes the server itself
//! would spend to hold a piece of data, derived from the struct layouts of
//! dict/adlist/zskiplist/quicklist/ziplist/rax and the allocator's size-class
//! rounding. Skiplist entries include a sampled node level, so those
//! estimates are statistical rather than exact.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const LONG_SIZE: u64 = 8;
const POINTER_SIZE: u64 = 8;
const SHARED_INTEGERS: i64 = 10000;
const SKIPLIST_MAX_LEVEL: u64 = 32;
const LRU_BITS: u64 = 24;

/// Jemalloc small/large/huge size classes. Allocation requests are padded up
/// to the next class.
#[rustfmt::skip]
const JEMALLOC_SIZE_CLASSES: &[u64] = &[
    8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 448, 512,
    640, 768, 896, 1024, 1280, 1536, 1792, 2048, 2560, 3072, 3584, 4096, 5120, 6144, 7168,
    8192, 10240, 12288, 14336, 16384, 20480, 24576, 28672, 32768, 40960, 49152, 57344, 65536,
    81920, 98304, 114688, 131072, 163840, 196608, 229376, 262144, 327680, 393216, 458752,
    524288, 655360, 786432, 917504, 1048576, 1310720, 1572864, 1835008, 2097152, 2621440,
    3145728, 3670016, 4194304, 5242880, 6291456, 7340032, 8388608, 10485760, 12582912,
    14680064, 16777216, 20971520, 25165824, 29360128, 33554432, 41943040, 50331648, 58720256,
    67108864, 83886080, 100663296, 117440512, 134217728, 167772160, 201326592, 234881024,
    268435456, 335544320, 402653184, 469762048, 536870912, 671088640, 805306368, 939524096,
    1073741824, 1342177280, 1610612736, 1879048192, 2147483648, 2684354560, 3221225472,
    3758096384, 4294967296, 5368709120, 6442450944, 7516192768, 8589934592, 10737418240,
    12884901888, 15032385536, 17179869184, 21474836480, 25769803776, 30064771072, 34359738368,
    42949672960, 51539607552, 60129542144, 68719476736, 85899345920, 103079215104,
    120259084288, 137438953472, 171798691840, 206158430208, 240518168576, 274877906944,
    343597383680, 412316860416, 481036337152, 549755813888, 687194767360, 824633720832,
    962072674304, 1099511627776, 1374389534720, 1649267441664, 1924145348608, 2199023255552,
    2748779069440, 3298534883328, 3848290697216, 4398046511104, 5497558138880, 6597069766656,
    7696581394432, 8796093022208, 10995116277760, 13194139533312, 15393162788864,
    17592186044416, 21990232555520, 26388279066624, 30786325577728, 35184372088832,
    43980465111040, 52776558133248, 61572651155456, 70368744177664, 87960930222080,
    105553116266496, 123145302310912, 140737488355328, 175921860444160, 211106232532992,
    246290604621824, 281474976710656, 351843720888320, 422212465065984, 492581209243648,
    562949953421312, 703687441776640, 844424930131968, 985162418487296, 1125899906842624,
    1407374883553280, 1688849860263936, 1970324836974592, 2251799813685248, 2814749767106560,
    3377699720527872, 3940649673949184, 4503599627370496, 5629499534213120, 6755399441055744,
    7881299347898368, 9007199254740992, 11258999068426240, 13510798882111488,
    15762598695796736, 18014398509481984, 22517998136852480, 27021597764222976,
    31525197391593472, 36028797018963968, 45035996273704960, 54043195528445952,
    63050394783186944, 72057594037927936, 90071992547409920, 108086391056891904,
    126100789566373888, 144115188075855872, 180143985094819840, 216172782113783808,
    252201579132747776, 288230376151711744, 360287970189639680, 432345564227567616,
    504403158265495552, 576460752303423488, 720575940379279360, 864691128455135232,
    1008806316530991104, 1152921504606846976, 1441151880758558720, 1729382256910270464,
    2017612633061982208, 2305843009213693952, 2882303761517117440, 3458764513820540928,
    4035225266123964416, 4611686018427387904, 5764607523034234880, 6917529027641081856,
    8070450532247928832, 9223372036854775808, 11529215046068469760, 13835058055282163712,
    16140901064495857664,
];

/// Memory-use estimator for every kind of Redis value.
///
/// All methods are pure except [`skiplist_entry_overhead`], which samples a
/// node level from the held RNG. Use [`MemProfiler::with_seed`] for
/// reproducible estimates.
///
/// [`skiplist_entry_overhead`]: MemProfiler::skiplist_entry_overhead
#[derive(Debug)]
pub struct MemProfiler {
    rng: StdRng,
}

impl Default for MemProfiler {
    fn default() -> MemProfiler {
        MemProfiler::new()
    }
}

impl MemProfiler {
    pub fn new() -> MemProfiler {
        MemProfiler {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> MemProfiler {
        MemProfiler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Round an allocation request up to the allocator size class serving it.
    /// Requests beyond the largest class are returned unchanged.
    pub fn malloc_overhead(&self, size: u64) -> u64 {
        match JEMALLOC_SIZE_CLASSES.binary_search(&size) {
            Ok(idx) => JEMALLOC_SIZE_CLASSES[idx],
            Err(idx) if idx < JEMALLOC_SIZE_CLASSES.len() => JEMALLOC_SIZE_CLASSES[idx],
            Err(_) => size,
        }
    }

    /// Overhead of one top-level key: its slot in the keyspace dict, the key
    /// sds string, the value's robj header and the expiry bookkeeping.
    pub fn top_level_obj_overhead(&self, key: &[u8], expiry: Option<u64>) -> u64 {
        self.hashtable_entry_overhead()
            + self.sizeof_string(key)
            + self.robj_overhead()
            + self.key_expiry_overhead(expiry)
    }

    /// Overhead of a dict holding `size` entries. The bucket table length is
    /// the next power of two, and while rehashing both the old and new tables
    /// exist, so the table cost carries a 1.5x worst-case multiplier.
    pub fn hashtable_overhead(&self, size: u64) -> u64 {
        4 + 7 * LONG_SIZE + 4 * POINTER_SIZE + next_power(size) * POINTER_SIZE * 3 / 2
    }

    /// Each dictEntry is three pointer-sized words: key, value union, next.
    pub fn hashtable_entry_overhead(&self) -> u64 {
        3 * POINTER_SIZE
    }

    /// An adlist header: 5 pointers plus an unsigned long.
    pub fn linkedlist_overhead(&self) -> u64 {
        LONG_SIZE + 5 * POINTER_SIZE
    }

    /// An adlist node: 3 pointers.
    pub fn linked_list_entry_overhead(&self) -> u64 {
        3 * POINTER_SIZE
    }

    /// A zset: dict overhead plus the skiplist struct and its head-node
    /// allowance.
    pub fn skiplist_overhead(&self, size: u64) -> u64 {
        2 * POINTER_SIZE + self.hashtable_overhead(size) + (2 * POINTER_SIZE + 16)
    }

    /// A zset entry: the dict entry, the score/backlink, and one forward
    /// pointer + span per sampled level.
    pub fn skiplist_entry_overhead(&mut self) -> u64 {
        self.hashtable_entry_overhead()
            + 2 * POINTER_SIZE
            + 8
            + (POINTER_SIZE + 8) * self.zset_rand_level()
    }

    /// Quicklist struct plus a fixed cost per node.
    pub fn quicklist_overhead(&self, nodes: u64) -> u64 {
        let quicklist = 2 * POINTER_SIZE + 8 + 2 * 4;
        let quickitem = 4 * POINTER_SIZE + 8 + 2 * 4;
        quicklist + nodes * quickitem
    }

    /// zlbytes + zltail + zllen + the trailing end byte.
    pub fn ziplist_header_overhead(&self) -> u64 {
        4 + 4 + 2 + 1
    }

    /// Cost of one entry in the packed representation the server would build:
    /// integers take the tightest of the immediate/8/16/24/32/64-bit forms,
    /// strings take a 1/2/10-byte length header by size.
    pub fn ziplist_entry_overhead(&self, value: &[u8]) -> u64 {
        let header: u64;
        let size: u64;

        if let Some(n) = parse_i64(value) {
            header = 1;
            size = if n < 12 {
                0
            } else if n < 256 {
                1
            } else if n < 65536 {
                2
            } else if n < 16777216 {
                3
            } else if n < 4294967296 {
                4
            } else {
                8
            };
        } else {
            size = value.len() as u64;
            header = if size <= 63 {
                1
            } else if size <= 16383 {
                2
            } else if size >= 254 {
                10
            } else {
                5
            };
        }

        header + size
    }

    /// Expiries live in their own dict keyed by the same key, storing an
    /// int64 timestamp.
    pub fn key_expiry_overhead(&self, expiry: Option<u64>) -> u64 {
        match expiry {
            Some(_) => self.hashtable_entry_overhead() + 8,
            None => 0,
        }
    }

    pub fn robj_overhead(&self) -> u64 {
        POINTER_SIZE + 4 + 4 + LRU_BITS + 4
    }

    /// Storage cost of an sds string. Small shared integers are interned and
    /// cost nothing; other integers collapse to a tagged pointer.
    pub fn sizeof_string(&self, bytes: &[u8]) -> u64 {
        if let Some(num) = parse_i64(bytes) {
            if (0..SHARED_INTEGERS).contains(&num) {
                return 0;
            }
            return 8;
        }
        self.malloc_overhead(bytes.len() as u64 + 8 + 1)
    }

    /// Logical element length used for largest-element tracking and length
    /// buckets: integers count as their stored width, text as its byte size.
    pub fn elem_len(&self, element: &[u8]) -> u64 {
        if looks_like_integer(element) {
            return match parse_i64(element) {
                Some(_) => 8,
                // integer text outside the i64 range
                None => 16,
            };
        }
        element.len() as u64
    }

    /// Approximate rax cost: ~2.5 nodes per element, 16 bytes of key per
    /// element, per-node header and pointer block.
    pub fn sizeof_stream_radix_tree(&self, num_elements: u64) -> u64 {
        let num_nodes = (num_elements as f64 * 2.5) as u64;
        16 * num_elements + num_nodes * 4 + num_nodes * 30 * 8
    }

    pub fn stream_overhead(&self) -> u64 {
        2 * POINTER_SIZE + 8 + 16 // stream struct
            + POINTER_SIZE + 8 * 2 // rax struct
    }

    pub fn stream_consumer_overhead(&self, name: &[u8]) -> u64 {
        POINTER_SIZE * 2 + 8 + self.sizeof_string(name)
    }

    pub fn stream_cg_overhead(&self) -> u64 {
        POINTER_SIZE * 2 + 16
    }

    /// Not-yet-acknowledged entries: one rax value per pending ID.
    pub fn stream_nack_overhead(&self, length: u64) -> u64 {
        length * (POINTER_SIZE + 8 + 8)
    }

    fn zset_rand_level(&mut self) -> u64 {
        let mut level: u64 = 1;
        let mut rint: u32 = self.rng.gen_range(0..0xFFFF);
        while rint < 0xFFFF / 4 {
            level += 1;
            rint = self.rng.gen_range(0..0xFFFF);
        }
        level.min(SKIPLIST_MAX_LEVEL)
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse::<i64>().ok()
}

fn looks_like_integer(bytes: &[u8]) -> bool {
    let digits = match bytes.first() {
        Some(b'+') | Some(b'-') => &bytes[1..],
        _ => bytes,
    };
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}

/// Smallest power of two strictly greater than `size`.
fn next_power(size: u64) -> u64 {
    let mut power: u64 = 1;
    while power <= size {
        power <<= 1;
    }
    power
}
