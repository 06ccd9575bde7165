//! Estimate per-key Redis memory usage from RDB snapshot files, without a
//! running server.
//!
//! The crate decodes every object encoding an RDB stream can carry, applies
//! a cost model of the server's internal data structures to each key, and
//! reduces the resulting entry stream into bounded reports: largest keys,
//! largest key-name prefixes, totals per type, per collection-size bucket and
//! per cluster slot.
//!
//! ```no_run
//! use rdbmem::profile::{profile_file, ReportOptions};
//!
//! let profile = profile_file("dump.rdb", ReportOptions::default())?;
//! println!("{}", serde_json::to_string_pretty(&profile.report)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Lower layers are public for custom consumers: [`parser`] drives any
//! [`events::EventSink`] implementation, [`mem`] exposes the raw cost
//! formulas, and [`counter`] aggregates entries from any source.

pub mod constants;
pub mod counter;
pub mod cursor;
pub mod events;
pub mod mem;
pub mod parser;
pub mod profile;
pub mod profiler;
pub mod report;
pub mod slot;
pub mod types;

pub use counter::Counter;
pub use events::EventSink;
pub use mem::MemProfiler;
pub use parser::{decode, decode_dump, RdbParser};
pub use profile::{profile_file, profile_reader, Profile};
pub use profiler::Profiler;
pub use report::{Report, ReportOptions};
pub use types::{Entry, RdbError, RdbResult, Type};
