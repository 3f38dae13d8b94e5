//! The source of "today" for exchange rate lookups.

use time::{Date, OffsetDateTime, UtcOffset};

use crate::timezone::get_local_offset;

/// Provides the current date.
pub trait Clock: Send + Sync {
    /// Today's date.
    fn today(&self) -> Date;
}

/// A [Clock] that reads the system time in a local timezone.
#[derive(Debug, Clone)]
pub struct SystemClock {
    local_timezone: String,
}

impl SystemClock {
    /// Create a clock for a canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// Unknown timezones fall back to UTC.
    pub fn new(local_timezone: &str) -> Self {
        Self {
            local_timezone: local_timezone.to_owned(),
        }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> Date {
        let offset = get_local_offset(&self.local_timezone).unwrap_or_else(|| {
            tracing::warn!(
                "Unknown timezone \"{}\", falling back to UTC.",
                self.local_timezone
            );
            UtcOffset::UTC
        });

        OffsetDateTime::now_utc().to_offset(offset).date()
    }
}

/// A [Clock] that always returns the same date.
#[cfg(test)]
#[derive(Debug, Clone)]
pub(crate) struct FixedClock(pub Date);

#[cfg(test)]
impl Clock for FixedClock {
    fn today(&self) -> Date {
        self.0
    }
}
