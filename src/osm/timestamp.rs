//! Timestamps as seconds since the epoch.

use chrono::DateTime;

/// A point in time, stored as seconds since 1970-01-01T00:00:00Z.
///
/// Zero doubles as "not set", which is how OSM files without timestamp
/// attributes are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create from raw epoch seconds.
    #[inline]
    pub fn new(seconds: i64) -> Self {
        Timestamp(seconds)
    }

    /// Parse an ISO-8601 / RFC 3339 timestamp such as
    /// `2020-01-01T00:00:00Z`. Returns `None` for anything else.
    pub fn parse(value: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| Timestamp(dt.timestamp()))
    }

    /// Seconds since the epoch.
    #[inline]
    pub fn seconds(&self) -> i64 {
        self.0
    }

    /// True when a timestamp was actually set.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0 != 0
    }
}

impl From<i64> for Timestamp {
    fn from(seconds: i64) -> Self {
        Timestamp(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let ts = Timestamp::parse("2020-01-01T00:00:00Z").unwrap();
        assert_eq!(ts.seconds(), 1_577_836_800);
        assert!(ts.is_set());
    }

    #[test]
    fn test_parse_with_offset() {
        let ts = Timestamp::parse("2020-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts.seconds(), 1_577_836_800);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Timestamp::parse("yesterday"), None);
        assert_eq!(Timestamp::parse("2020-01-01"), None);
        assert_eq!(Timestamp::parse(""), None);
    }
}
