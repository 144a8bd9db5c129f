//! `log` backend writing to the serial port.
//!
//! Screen output is reserved for the terminals; diagnostics go out COM1
//! where QEMU or a lab machine can capture them.

use log::{LevelFilter, Metadata, Record};

use crate::arch::x86::serial;

struct SerialLogger;

static LOGGER: SerialLogger = SerialLogger;

impl log::Log for SerialLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        serial::write_fmt(format_args!(
            "[{:5}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }

    fn flush(&self) {}
}

/// Install the serial logger. Safe to call once; later calls are ignored.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(LevelFilter::Debug);
    }
}
