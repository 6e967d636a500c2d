use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::MergeError;

static NUMERIC_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("numeric filename pattern"));

/// Numeric values above this are milliseconds since the epoch; at or below
/// it they are seconds. Millisecond instants after ~2001-09-09 sit above
/// the cutoff, so the split is unambiguous for realistic recordings.
const MILLIS_CUTOFF: i64 = 1_000_000_000_000;

/// Recover the wall-clock capture instant (milliseconds since the Unix
/// epoch) from a chunk key.
///
/// The base name (last path component, extension stripped) must be either a
/// numeric literal or an RFC 3339 date-time with an explicit timezone.
pub fn parse_capture_instant(key: &str) -> Result<i64, MergeError> {
    let base = base_name(key);
    if base.is_empty() {
        return Err(MergeError::Timestamp { key: key.to_string() });
    }

    if NUMERIC_NAME.is_match(base) {
        if let Some(instant) = parse_numeric_instant(base) {
            return Ok(instant);
        }
    } else if let Ok(datetime) = DateTime::parse_from_rfc3339(base) {
        return Ok(datetime.timestamp_millis());
    }

    Err(MergeError::Timestamp { key: key.to_string() })
}

fn parse_numeric_instant(base: &str) -> Option<i64> {
    if let Ok(integer) = base.parse::<i64>() {
        return Some(if integer > MILLIS_CUTOFF {
            integer
        } else {
            integer.checked_mul(1000)?
        });
    }
    // Decimal literal: sub-second precision in either unit.
    let value: f64 = base.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if value > MILLIS_CUTOFF as f64 {
        value.round() as i64
    } else {
        (value * 1000.0).round() as i64
    })
}

/// Last path component with its extension removed. A key of `.mp4` yields
/// an empty base name.
fn base_name(key: &str) -> &str {
    let file = key.rsplit('/').next().unwrap_or(key);
    match file.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => file,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_filenames_round_trip_literally() {
        // Above the cutoff: interpreted as milliseconds, returned verbatim.
        assert_eq!(
            parse_capture_instant("cam1/1696512345678.mp4").unwrap(),
            1_696_512_345_678
        );
    }

    #[test]
    fn second_filenames_are_scaled_to_milliseconds() {
        assert_eq!(
            parse_capture_instant("cam1/1696512345.mp4").unwrap(),
            1_696_512_345_000
        );
    }

    #[test]
    fn decimal_seconds_keep_sub_second_precision() {
        assert_eq!(
            parse_capture_instant("1696512345.5.mp4").unwrap(),
            1_696_512_345_500
        );
    }

    #[test]
    fn iso_8601_names_match_chrono_to_the_millisecond() {
        assert_eq!(
            parse_capture_instant("2023-10-05T12:45:45.678Z.mp4").unwrap(),
            DateTime::parse_from_rfc3339("2023-10-05T12:45:45.678Z")
                .unwrap()
                .timestamp_millis()
        );
        assert_eq!(
            parse_capture_instant("rec/2023-10-05T14:45:45+02:00.webm").unwrap(),
            DateTime::parse_from_rfc3339("2023-10-05T14:45:45+02:00")
                .unwrap()
                .timestamp_millis()
        );
    }

    #[test]
    fn base_name_ignores_directories_and_extension() {
        assert_eq!(
            parse_capture_instant("a/b/c/1696512345.mkv").unwrap(),
            1_696_512_345_000
        );
    }

    #[test]
    fn empty_base_name_fails() {
        let err = parse_capture_instant(".mp4").unwrap_err();
        assert!(err.to_string().contains(".mp4"));
    }

    #[test]
    fn unrecognized_names_fail_naming_the_key() {
        let err = parse_capture_instant("cam1/recording-final.mp4").unwrap_err();
        assert!(err.to_string().contains("cam1/recording-final.mp4"));
    }

    #[test]
    fn cutoff_boundary_value_is_treated_as_seconds() {
        // Exactly 10^12 does not exceed the cutoff.
        assert_eq!(
            parse_capture_instant("1000000000000.mp4").unwrap(),
            1_000_000_000_000_000
        );
    }
}
