//! Timestamps for measures.

use chrono::{DateTime, Utc};

/// UTC timestamp attached to every [`Measure`](crate::measure::Measure).
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Parse an RFC 3339 string (any offset) into a UTC [`Timestamp`].
///
/// # Errors
///
/// Returns the chrono parse error when `value` is not valid RFC 3339.
pub fn parse_rfc3339(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.to_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_normalize_offset_to_utc_when_parsing() {
        let ts = parse_rfc3339("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-03-01T10:00:00+00:00");
    }

    #[test]
    fn should_reject_non_rfc3339_input() {
        assert!(parse_rfc3339("yesterday").is_err());
    }
}
