// Global logging for the launcher
//
// Every record goes through the `log` facade into `BootLogger`, which keeps
// the most recent lines in memory and forwards them to whatever console sink
// the platform installed.

use alloc::collections::VecDeque;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

const MAX_LOG_ENTRIES: usize = 64;

/// Destination for formatted log lines (firmware console, serial, ...)
pub trait LogSink: Send {
    fn write_line(&mut self, level: Level, line: &str);
}

/// Bounded FIFO of formatted log lines
pub struct LogHistory {
    entries: VecDeque<String>,
    capacity: usize,
}

impl LogHistory {
    pub const fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append a line, evicting the oldest one when full
    pub fn push(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(line);
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static HISTORY: Mutex<LogHistory> = Mutex::new(LogHistory::new(MAX_LOG_ENTRIES));
static LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static LOGGER: BootLogger = BootLogger {
    sink: Mutex::new(None),
};

/// `log::Log` front end backed by the history buffer and an optional sink
pub struct BootLogger {
    sink: Mutex<Option<&'static mut dyn LogSink>>,
}

impl Log for BootLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = format_line(record.level(), record.target(), record.args());
        LOG_COUNT.fetch_add(1, Ordering::SeqCst);

        // Sink must not log from inside write_line; the lock is not reentrant.
        if let Some(sink) = self.sink.lock().as_mut() {
            sink.write_line(record.level(), &line);
        }
        HISTORY.lock().push(line);
    }

    fn flush(&self) {}
}

/// Install the boot logger with `sink` as console output.
///
/// Fails if another logger was already registered with the facade; the
/// sink installed first stays in place.
pub fn init(sink: &'static mut dyn LogSink, level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    *LOGGER.sink.lock() = Some(sink);
    log::set_max_level(level);
    Ok(())
}

pub fn format_line(level: Level, target: &str, args: &fmt::Arguments<'_>) -> String {
    format!("[{}] {}: {}", level, target, args)
}

/// Snapshot of the retained log lines, oldest first
pub fn get_logs() -> Vec<String> {
    HISTORY.lock().lines().map(String::from).collect()
}

/// Number of lines currently retained
pub fn log_count() -> usize {
    HISTORY.lock().len()
}

/// Number of records logged since boot, including evicted ones
pub fn total_logged() -> usize {
    LOG_COUNT.load(Ordering::SeqCst)
}
