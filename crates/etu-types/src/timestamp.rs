//! Wire timestamps and their conversion to `DateTime<Utc>`.
//!
//! The backend encodes timestamps as `{seconds, nanos}`. Depending on the
//! producer, `seconds` arrives as a JSON string (64-bit values are stringified
//! to survive JavaScript number precision) or as a plain number, and `nanos`
//! may be missing entirely. Anything else (a boolean, a nested object, a
//! bare string in place of the whole timestamp) is kept as-is so the record
//! around it still decodes.
//!
//! Decoding never fails. An absent or malformed timestamp resolves to the
//! current time; malformed input is reported with a `warn!` so bad backend
//! data stays visible in the logs.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Largest magnitude accepted, in milliseconds since the epoch (±100 million days).
const MAX_EPOCH_MILLIS: f64 = 8.64e15;

/// An integer field that may be encoded as a JSON number or a decimal string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireInt {
    Int(i64),
    Float(f64),
    Text(String),
    /// Any other JSON value; never numeric.
    Other(serde_json::Value),
}

impl WireInt {
    /// Numeric value of this field, or `None` when it is not a finite number.
    ///
    /// Strings follow `parseInt` rules: leading whitespace and an optional sign
    /// are accepted, and parsing stops at the first non-digit.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Epoch seconds are far below 2^52
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireInt::Int(n) => Some(*n as f64),
            WireInt::Float(f) => f.is_finite().then_some(*f),
            WireInt::Text(s) => parse_leading_integer(s).map(|n| n as f64),
            WireInt::Other(_) => None,
        }
    }
}

impl From<i64> for WireInt {
    fn from(n: i64) -> Self {
        WireInt::Int(n)
    }
}

impl From<&str> for WireInt {
    fn from(s: &str) -> Self {
        WireInt::Text(s.to_string())
    }
}

impl From<String> for WireInt {
    fn from(s: String) -> Self {
        WireInt::Text(s)
    }
}

fn parse_leading_integer(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    let magnitude: i64 = digits[..end].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Wire timestamp: seconds and nanoseconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "RawTimestamp")]
pub struct Timestamp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<WireInt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nanos: Option<WireInt>,
}

/// Decoding shape for [`Timestamp`]: the usual object, or any other value.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Fields {
        #[serde(default)]
        seconds: Option<WireInt>,
        #[serde(default)]
        nanos: Option<WireInt>,
    },
    Other(serde_json::Value),
}

impl From<RawTimestamp> for Timestamp {
    fn from(raw: RawTimestamp) -> Self {
        match raw {
            RawTimestamp::Fields { seconds, nanos } => Self { seconds, nanos },
            // Not an object: keep the value in `seconds` so it reads as malformed, not absent
            RawTimestamp::Other(value) => Self {
                seconds: Some(WireInt::Other(value)),
                nanos: None,
            },
        }
    }
}

impl Timestamp {
    #[must_use]
    pub fn new(seconds: impl Into<WireInt>, nanos: i64) -> Self {
        Self {
            seconds: Some(seconds.into()),
            nanos: Some(WireInt::Int(nanos)),
        }
    }

    /// Encode a point in time the way the backend emits it (string seconds).
    #[must_use]
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        Self {
            seconds: Some(WireInt::Text(time.timestamp().to_string())),
            nanos: Some(WireInt::Int(i64::from(time.timestamp_subsec_nanos()))),
        }
    }

    /// Strict decode: `None` if either component is missing or not a finite
    /// number, or the result is outside the representable range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // Range-checked against MAX_EPOCH_MILLIS
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let seconds = self.seconds.as_ref()?.as_f64()?;
        let nanos = match &self.nanos {
            Some(nanos) => nanos.as_f64()?,
            None => 0.0,
        };

        let millis = seconds * 1000.0 + nanos / 1_000_000.0;
        if !millis.is_finite() || millis.abs() > MAX_EPOCH_MILLIS {
            return None;
        }

        let whole = millis.floor();
        let sub_nanos = ((millis - whole) * 1_000_000.0).round() as i64;

        DateTime::from_timestamp_millis(whole as i64)?
            .checked_add_signed(TimeDelta::nanoseconds(sub_nanos))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

/// Convert an optional wire timestamp into a point in time.
///
/// Returns `Utc::now()` when the timestamp is absent, or when it is present
/// but cannot be decoded (a warning is logged in that case).
#[must_use]
pub fn to_time(timestamp: Option<&Timestamp>) -> DateTime<Utc> {
    let Some(timestamp) = timestamp else {
        return Utc::now();
    };

    timestamp.to_datetime().unwrap_or_else(|| {
        warn!(
            "Malformed timestamp {:?}, substituting current time",
            timestamp
        );
        Utc::now()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close_to_now(time: DateTime<Utc>) {
        let drift = (Utc::now() - time).num_milliseconds().abs();
        assert!(drift < 1_000, "expected ~now, drifted {drift}ms");
    }

    #[test]
    fn test_numeric_seconds() {
        let ts = Timestamp::new(1_700_000_000, 0);
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_string_seconds() {
        let ts = Timestamp::new("1700000000", 0);
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_nanos_contribute_milliseconds() {
        let ts = Timestamp::new("1700000000", 250_000_000);
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), 1_700_000_000_250);
    }

    #[test]
    fn test_sub_millisecond_nanos_preserved() {
        let ts = Timestamp::new(10, 1_500_000);
        let time = to_time(Some(&ts));
        assert_eq!(time.timestamp(), 10);
        assert_eq!(time.timestamp_subsec_nanos(), 1_500_000);
    }

    #[test]
    fn test_string_nanos() {
        let ts = Timestamp {
            seconds: Some(WireInt::Int(5)),
            nanos: Some(WireInt::Text("7000000".to_string())),
        };
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), 5_007);
    }

    #[test]
    fn test_missing_nanos_defaults_to_zero() {
        let ts: Timestamp = serde_json::from_str(r#"{"seconds":"42"}"#).unwrap();
        assert!(ts.nanos.is_none());
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), 42_000);
    }

    #[test]
    fn test_absent_timestamp_is_now() {
        assert_close_to_now(to_time(None));
    }

    #[test]
    fn test_unparseable_seconds_is_now() {
        let ts = Timestamp::new("not-a-number", 0);
        assert!(ts.to_datetime().is_none());
        assert_close_to_now(to_time(Some(&ts)));
    }

    #[test]
    fn test_missing_seconds_is_now() {
        let ts: Timestamp = serde_json::from_str(r#"{"nanos":5}"#).unwrap();
        assert!(ts.to_datetime().is_none());
        assert_close_to_now(to_time(Some(&ts)));
    }

    #[test]
    fn test_unparseable_nanos_is_now() {
        let ts = Timestamp {
            seconds: Some(WireInt::Int(1_700_000_000)),
            nanos: Some(WireInt::Text("abc".to_string())),
        };
        assert_close_to_now(to_time(Some(&ts)));
    }

    #[test]
    fn test_out_of_range_is_now() {
        let ts = Timestamp::new(i64::MAX, 0);
        assert!(ts.to_datetime().is_none());
        assert_close_to_now(to_time(Some(&ts)));
    }

    #[test]
    fn test_leading_integer_parse() {
        assert_eq!(parse_leading_integer("12abc"), Some(12));
        assert_eq!(parse_leading_integer("  -7"), Some(-7));
        assert_eq!(parse_leading_integer("+3"), Some(3));
        assert_eq!(parse_leading_integer(""), None);
        assert_eq!(parse_leading_integer("-"), None);
        assert_eq!(parse_leading_integer("x1"), None);
    }

    #[test]
    fn test_negative_seconds_before_epoch() {
        let ts = Timestamp::new(-1, 0);
        assert_eq!(to_time(Some(&ts)).timestamp_millis(), -1_000);
    }

    #[test]
    fn test_wire_int_deserialization() {
        let n: WireInt = serde_json::from_str("123").unwrap();
        assert_eq!(n, WireInt::Int(123));

        let s: WireInt = serde_json::from_str("\"123\"").unwrap();
        assert_eq!(s, WireInt::Text("123".to_string()));

        let f: WireInt = serde_json::from_str("1.5").unwrap();
        assert_eq!(f, WireInt::Float(1.5));
    }

    #[test]
    fn test_non_numeric_json_seconds_is_now() {
        for raw in [r#"{"seconds":true,"nanos":0}"#, r#"{"seconds":{},"nanos":0}"#] {
            let ts: Timestamp = serde_json::from_str(raw).unwrap();
            assert!(matches!(ts.seconds, Some(WireInt::Other(_))));
            assert!(ts.to_datetime().is_none());
            assert_close_to_now(to_time(Some(&ts)));
        }
    }

    #[test]
    fn test_non_object_timestamp_is_now() {
        for raw in [r#""2024-01-01T00:00:00Z""#, "17", "false"] {
            let ts: Timestamp = serde_json::from_str(raw).unwrap();
            assert!(ts.to_datetime().is_none());
            assert_close_to_now(to_time(Some(&ts)));
        }
    }

    #[test]
    fn test_from_datetime_encodes_string_seconds() {
        let time = DateTime::from_timestamp(1_700_000_123, 9).unwrap();
        let ts = Timestamp::from_datetime(time);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, r#"{"seconds":"1700000123","nanos":9}"#);
    }
}

/// Property tests for the timestamp adapter.
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn whole_seconds_decode_exactly(seconds in -10_000_000_000i64..10_000_000_000i64) {
            let numeric = Timestamp::new(seconds, 0);
            let textual = Timestamp::new(seconds.to_string(), 0);

            let expected = seconds * 1000;
            prop_assert_eq!(to_time(Some(&numeric)).timestamp_millis(), expected);
            prop_assert_eq!(to_time(Some(&textual)).timestamp_millis(), expected);
        }

        #[test]
        fn millisecond_nanos_decode_exactly(
            seconds in 0i64..4_000_000_000i64,
            millis in 0i64..1000i64,
        ) {
            let ts = Timestamp::new(seconds, millis * 1_000_000);
            prop_assert_eq!(
                to_time(Some(&ts)).timestamp_millis(),
                seconds * 1000 + millis
            );
        }

        #[test]
        fn non_numeric_text_never_panics(text in "[a-zA-Z ]{0,20}") {
            let ts = Timestamp::new(text, 0);
            prop_assert!(ts.to_datetime().is_none());
        }
    }
}
