use std::sync::Mutex;
use time::{Date, Duration, OffsetDateTime, UtcOffset};

/// Source of "now" for resolution, miss detection and adherence windows.
///
/// `now` is expressed in the host's local offset so that `now().date()` is the
/// local calendar date.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;

    fn offset(&self) -> UtcOffset {
        self.now().offset()
    }

    fn today(&self) -> Date {
        self.now().date()
    }
}

/// Wall clock pinned to the local offset captured at construction.
///
/// The offset must be read before any worker threads start; on unix the
/// lookup fails once the process is multi-threaded and falls back to UTC.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            offset: local_offset(),
        }
    }

    pub fn with_offset(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.offset)
    }

    fn offset(&self) -> UtcOffset {
        self.offset
    }
}

pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Manually driven clock for tests and replays.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<OffsetDateTime>,
}

impl FixedClock {
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
