use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use rdbmem::events::EventSink;
use rdbmem::profile::{profile_file, ReportOptions};
use rdbmem::types::ObjectInfo;
use rdbmem::{parser, Report};

#[derive(Parser)]
#[command(
    name = "rdbmem",
    version,
    about = "Estimate per-key Redis memory usage from RDB snapshot files"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print statistical information for each file as a JSON array
    Dump {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// How many largest keys and slots to report per file
        #[arg(long, default_value_t = 100)]
        top_n: usize,

        /// Ignore keys estimated below this many bytes
        #[arg(long, default_value_t = 0)]
        size_threshold: u64,
    },
    /// Print every key name, one per line
    Keys {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Dump {
            files,
            top_n,
            size_threshold,
        } => dump(
            &files,
            ReportOptions {
                top_n,
                size_threshold,
            },
        ),
        Command::Keys { files } => keys(&files),
    }
}

fn dump(files: &[PathBuf], options: ReportOptions) -> ExitCode {
    let mut reports: Vec<Report> = Vec::with_capacity(files.len());
    let mut failed = false;

    for file in files {
        match profile_file(file, options) {
            Ok(profile) => {
                if let Some(err) = profile.error {
                    warn!(file = %file.display(), %err, "decode aborted, report is partial");
                    failed = true;
                }
                reports.push(profile.report);
            }
            Err(err) => {
                error!(file = %file.display(), %err, "cannot profile file");
                failed = true;
            }
        }
    }

    match serde_json::to_string_pretty(&reports) {
        Ok(json) => println!("{}", json),
        Err(err) => {
            error!(%err, "cannot render report");
            return ExitCode::FAILURE;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn keys(files: &[PathBuf]) -> ExitCode {
    let mut failed = false;

    for file in files {
        let open = std::fs::File::open(file)
            .map(std::io::BufReader::new)
            .map_err(rdbmem::RdbError::from);

        let result = open.and_then(|reader| parser::decode(reader, KeyPrinter));
        if let Err(err) = result {
            error!(file = %file.display(), %err, "cannot list keys");
            failed = true;
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Sink that prints each key as it is reached.
struct KeyPrinter;

impl KeyPrinter {
    fn print(key: &[u8]) {
        println!("{}", String::from_utf8_lossy(key));
    }
}

impl EventSink for KeyPrinter {
    fn set(&mut self, key: &[u8], _value: &[u8], _expiry: Option<u64>, _info: &ObjectInfo) {
        KeyPrinter::print(key);
    }
    fn start_hash(&mut self, key: &[u8], _length: i64, _expiry: Option<u64>, _info: &ObjectInfo) {
        KeyPrinter::print(key);
    }
    fn start_set(
        &mut self,
        key: &[u8],
        _cardinality: i64,
        _expiry: Option<u64>,
        _info: &ObjectInfo,
    ) {
        KeyPrinter::print(key);
    }
    fn start_list(&mut self, key: &[u8], _length: i64, _expiry: Option<u64>, _info: &ObjectInfo) {
        KeyPrinter::print(key);
    }
    fn start_zset(
        &mut self,
        key: &[u8],
        _cardinality: i64,
        _expiry: Option<u64>,
        _info: &ObjectInfo,
    ) {
        KeyPrinter::print(key);
    }
    fn start_stream(
        &mut self,
        key: &[u8],
        _cardinality: i64,
        _expiry: Option<u64>,
        _info: &ObjectInfo,
    ) {
        KeyPrinter::print(key);
    }
}
