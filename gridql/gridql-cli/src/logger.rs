//! Writes log records to stderr, so stdout only carries command output.

use anstream::eprintln;
use log::{Log, Metadata, Record};

pub struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let target = record.module_path().unwrap_or_else(|| record.target());
        eprintln!("[{} {target}] {}", record.level(), record.args());
    }

    fn flush(&self) {}
}
