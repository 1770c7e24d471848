//! Ring-buffer `log::Log` backend.
//!
//! Adapted from the teacher's `core::logger` ring buffer (`LOG_BUFFER` /
//! `LOG_HEAD` / `LOG_COUNT` atomics), but wired up behind the standard
//! `log` facade via [`log::set_logger`] instead of a bespoke `log_info!`
//! macro, so call sites use `log::{info,warn,error}` like the rest of the
//! ecosystem and the backend stays swappable.

use core::sync::atomic::{AtomicUsize, Ordering};
use log::{Level, Log, Metadata, Record};

const MAX_LOG_ENTRIES: usize = 512;

/// One captured log line. Fixed-capacity so no allocator is required.
#[derive(Clone, Copy)]
pub struct LogEntry {
    pub level: Level,
    pub message: heapless::String<128>,
}

pub struct RingLogger {
    buffer: spin::Mutex<[Option<LogEntry>; MAX_LOG_ENTRIES]>,
    count: AtomicUsize,
}

impl RingLogger {
    pub const fn new() -> Self {
        Self {
            buffer: spin::Mutex::new([None; MAX_LOG_ENTRIES]),
            count: AtomicUsize::new(0),
        }
    }

    /// Total number of log calls observed, including ones since overwritten.
    pub fn total_log_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Number of entries currently retained (capped at [`MAX_LOG_ENTRIES`]).
    pub fn log_count(&self) -> usize {
        self.total_log_count().min(MAX_LOG_ENTRIES)
    }

    /// Copy the last `n` retained entries (oldest first) into `out`,
    /// returning the number written.
    pub fn copy_last_n(&self, n: usize, out: &mut [Option<LogEntry>]) -> usize {
        let total = self.total_log_count();
        let available = total.min(MAX_LOG_ENTRIES);
        let take = n.min(available).min(out.len());
        let start = if total >= MAX_LOG_ENTRIES {
            (total - take) % MAX_LOG_ENTRIES
        } else {
            total.saturating_sub(take)
        };

        let buffer = self.buffer.lock();
        for i in 0..take {
            out[i] = buffer[(start + i) % MAX_LOG_ENTRIES];
        }
        take
    }
}

impl Default for RingLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for RingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let idx = self.count.fetch_add(1, Ordering::SeqCst) % MAX_LOG_ENTRIES;
        let mut message: heapless::String<128> = heapless::String::new();
        // Truncate rather than fail: diagnostics must never panic the caller.
        let _ = core::fmt::write(&mut message, *record.args());

        let mut buffer = self.buffer.lock();
        buffer[idx] = Some(LogEntry { level: record.level(), message });
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Log as _;

    #[test]
    fn wraps_after_max_entries() {
        let logger = RingLogger::new();
        for i in 0..(MAX_LOG_ENTRIES + 3) {
            let args = format_args!("entry {i}");
            let rec = Record::builder()
                .level(Level::Info)
                .args(args)
                .target("test")
                .build();
            logger.log(&rec);
        }

        assert_eq!(logger.total_log_count(), MAX_LOG_ENTRIES + 3);
        assert_eq!(logger.log_count(), MAX_LOG_ENTRIES);

        let mut out = [None; 4];
        let written = logger.copy_last_n(4, &mut out);
        assert_eq!(written, 4);
        // The newest four entries should be "entry N-4".."entry N-1".
        let mut expected: heapless::String<128> = heapless::String::new();
        let _ = core::fmt::write(&mut expected, format_args!("entry {}", MAX_LOG_ENTRIES + 2));
        assert_eq!(out[3].unwrap().message, expected);
    }

    #[test]
    fn retains_everything_before_wrap() {
        let logger = RingLogger::new();
        for i in 0..5 {
            let args = format_args!("m{i}");
            let rec = Record::builder().level(Level::Debug).args(args).target("t").build();
            logger.log(&rec);
        }
        assert_eq!(logger.log_count(), 5);
    }
}
</content>
