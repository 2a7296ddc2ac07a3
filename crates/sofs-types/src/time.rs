use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp wrapper around `chrono::DateTime<Utc>`.
///
/// Used to stamp destructive object-store operations with a modification
/// time so replicas can order them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcTime {
    inner: DateTime<Utc>,
}

impl UtcTime {
    /// Get the current UTC time.
    pub fn now() -> Self {
        Self { inner: Utc::now() }
    }

    /// Create from a chrono `DateTime<Utc>`.
    pub fn from_chrono(dt: DateTime<Utc>) -> Self {
        Self { inner: dt }
    }

    /// Create from nanoseconds since the Unix epoch.
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            inner: Utc.timestamp_nanos(nanos),
        }
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_chrono(&self) -> &DateTime<Utc> {
        &self.inner
    }

    /// Nanoseconds since the Unix epoch.
    pub fn unix_nanos(&self) -> i64 {
        self.inner.timestamp_nanos_opt().unwrap_or(0)
    }
}

impl fmt::Debug for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UtcTime({})", self.inner.to_rfc3339())
    }
}

impl fmt::Display for UtcTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_ordered() {
        let a = UtcTime::now();
        let b = UtcTime::now();
        assert!(a <= b);
    }

    #[test]
    fn test_unix_nanos_roundtrip() {
        let t = UtcTime::from_unix_nanos(1_700_000_000_000_000_123);
        assert_eq!(t.unix_nanos(), 1_700_000_000_000_000_123);
    }

    #[test]
    fn test_display_rfc3339() {
        let t = UtcTime::from_unix_nanos(0);
        assert!(format!("{}", t).starts_with("1970-01-01T00:00:00"));
    }
}
