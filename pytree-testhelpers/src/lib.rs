//! Shared test setup for the pytree workspace: a colored stderr logger so
//! `trace!`/`debug!` output from the crates under test is visible when a
//! test fails. Call [`setup`] at the top of every test.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::io::Write;

use log::{Level, LevelFilter, Log, Metadata, Record};
use owo_colors::{OwoColorize, Style};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let level_style = match record.level() {
            Level::Error => Style::new().red(),
            Level::Warn => Style::new().yellow(),
            Level::Info => Style::new().green(),
            Level::Debug => Style::new().blue(),
            Level::Trace => Style::new().cyan(),
        };
        eprintln!(
            "{} - {}: {}",
            record.level().style(level_style),
            record.target().style(Style::new().blue()),
            record.args()
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the test logger at `Trace` level.
///
/// Safe to call from every test: installation errors from a logger that is
/// already set are ignored (tests share a process under the default
/// harness).
pub fn setup() {
    let logger = Box::new(SimpleLogger);
    let _ = log::set_boxed_logger(logger);
    log::set_max_level(LevelFilter::Trace);
}
