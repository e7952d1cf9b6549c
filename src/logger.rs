use std::io::{IsTerminal, Write};
use std::time::Instant;

use anstyle::Reset;
use log::{Log, Metadata, Record};
use parking_lot::Mutex;

use crate::theme;

struct FlexLogger {
    file: Option<Mutex<std::fs::File>>,
    filter: log::LevelFilter,
    color: bool,
    start: Instant,
}

impl Log for FlexLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.filter
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let level = record.level();
        if self.color {
            let style = theme::level_style(level);
            eprintln!("{style}{level:>5}{Reset} {}", record.args());
        } else {
            eprintln!("{level:>5} {}", record.args());
        }

        if let Some(ref file) = self.file {
            let elapsed = self.start.elapsed().as_secs_f64();
            let _ = writeln!(
                file.lock(),
                "[{elapsed:.3}s] [{level}] {} {}",
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.file {
            let _ = file.lock().flush();
        }
    }
}

/// Parse a `RUST_LOG` style level, falling back to `Info`.
fn parse_filter(value: Option<&str>) -> log::LevelFilter {
    value
        .and_then(|s| s.parse().ok())
        .unwrap_or(log::LevelFilter::Info)
}

/// Initialize the global logger. Must be called once before any logging.
///
/// # Panics
///
/// Panics if called more than once.
pub fn init(log_file: Option<std::fs::File>) {
    let filter = parse_filter(std::env::var("RUST_LOG").ok().as_deref());

    let logger = FlexLogger {
        file: log_file.map(Mutex::new),
        filter,
        color: std::io::stderr().is_terminal(),
        start: Instant::now(),
    };

    log::set_boxed_logger(Box::new(logger)).expect("logger already initialized");
    log::set_max_level(filter);
}
