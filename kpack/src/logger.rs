use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, Metadata, Record};
use std::path::Path;

static LOGGER: Logger = Logger;

/// Logs to stderr, stdout is left for the json output.
///
/// Below trace level only records from kpack itself are shown, so the http
/// stack does not drown the key server exchange.
pub struct Logger;

impl Logger {
    pub fn init(level: LevelFilter) {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
    }
}

impl log::Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
            && (log::max_level() == LevelFilter::Trace || is_own(metadata.target()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if log::max_level() <= LevelFilter::Info {
            match record.level() {
                Level::Info => eprintln!("{}", record.args()),
                level => eprintln!("{} {}", label(level), record.args()),
            }
            return;
        }

        let location = record
            .file()
            .and_then(|x| Path::new(x).file_name())
            .zip(record.line())
            .map(|(file, line)| format!("[{}:{}]", file.to_string_lossy(), line))
            .unwrap_or_else(|| "[unk]".to_owned());

        eprintln!(
            "{} {} {}",
            label(record.level()),
            location.dimmed(),
            record.args()
        );
    }

    fn flush(&self) {}
}

fn is_own(target: &str) -> bool {
    target.starts_with("kpack")
}

fn label(level: Level) -> ColoredString {
    match level {
        Level::Error => "error:".bold().red(),
        Level::Warn => "warning:".bold().yellow(),
        Level::Info => "info:".bold().green(),
        Level::Debug => "debug:".bold().blue(),
        Level::Trace => "trace:".bold().purple(),
    }
}
