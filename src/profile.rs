//! Two-stage pipeline: decode on one thread, aggregate on the calling one.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::thread;

use crossbeam_channel::bounded;
use tracing::debug;

use crate::counter::Counter;
use crate::parser::RdbParser;
use crate::profiler::Profiler;
use crate::types::{RdbError, RdbResult};

pub use crate::report::{Report, ReportOptions};

/// Entries buffered between the decode and aggregation stages. A full queue
/// blocks the decoder, which bounds peak memory for huge files.
const QUEUE_CAPACITY: usize = 1024;

/// Outcome for one file. A decode failure closes the queue early, so the
/// report covers whatever prefix of the stream was readable; the error says
/// the numbers may be incomplete.
#[derive(Debug)]
pub struct Profile {
    pub report: Report,
    pub error: Option<RdbError>,
}

pub fn profile_reader<R: Read + Send>(input: R, filename: &str, options: ReportOptions) -> Profile {
    let (entries_tx, entries_rx) = bounded(QUEUE_CAPACITY);
    let mut counter = Counter::new();

    let (decode_result, ctime, used_mem) = thread::scope(|scope| {
        let producer = scope.spawn(move || {
            let mut profiler = Profiler::new(entries_tx);
            let result = {
                let mut parser = RdbParser::new(input, &mut profiler);
                parser.parse()
            };
            // dropping the profiler closes the queue
            (result, profiler.ctime(), profiler.used_mem())
        });

        counter.consume(entries_rx);
        producer.join().expect("decode thread panicked")
    });

    if let Err(error) = &decode_result {
        debug!(file = filename, %error, "decode aborted, report is partial");
    }

    let mut report = Report::build(filename, &counter, options);
    report.ctime = ctime;
    report.memory_use = used_mem;

    Profile {
        report,
        error: decode_result.err(),
    }
}

/// Profile one snapshot file. Open failures are fatal for this file only;
/// other files in a batch proceed independently.
pub fn profile_file<P: AsRef<Path>>(path: P, options: ReportOptions) -> RdbResult<Profile> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    debug!(file = %path.display(), "profiling snapshot");
    Ok(profile_reader(BufReader::new(file), &filename, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Type;
    use pretty_assertions::assert_eq;

    // header REDIS0009, SELECTDB 0, string foo=12345, EOF
    fn minimal_rdb() -> Vec<u8> {
        let mut image = Vec::new();
        image.extend_from_slice(b"REDIS0009");
        image.extend_from_slice(&[0xFE, 0]);
        image.push(0); // string type
        image.extend_from_slice(&[3, b'f', b'o', b'o']);
        image.extend_from_slice(&[5, b'1', b'2', b'3', b'4', b'5']);
        image.push(0xFF);
        image
    }

    #[test]
    fn pipeline_profiles_a_minimal_stream() {
        let profile = profile_reader(
            minimal_rdb().as_slice(),
            "minimal.rdb",
            ReportOptions::default(),
        );

        assert!(profile.error.is_none());
        let report = profile.report;
        assert_eq!(1, report.total_num);
        assert_eq!(Some(&1), report.type_num.get(&Type::String));
        assert_eq!(1, report.largest_keys.len());
        assert_eq!("foo", report.largest_keys[0].key);
        // dict entry 24 + key sds 16 + robj 44 + value int 8
        assert_eq!(92, report.largest_keys[0].bytes);
    }

    #[test]
    fn truncated_stream_yields_partial_report_and_error() {
        let mut image = minimal_rdb();
        image.pop(); // drop the EOF opcode
        image.extend_from_slice(&[0, 3, b'b', b'a', b'r']); // key with no value

        let profile = profile_reader(image.as_slice(), "broken.rdb", ReportOptions::default());
        assert!(profile.error.is_some());
        // the first key decoded before the failure
        assert_eq!(1, profile.report.total_num);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = profile_file("/nonexistent/nope.rdb", ReportOptions::default()).unwrap_err();
        assert!(matches!(err, RdbError::Io(_)));
    }
}
