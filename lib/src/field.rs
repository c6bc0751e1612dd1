//! Encoding of human-entered strings and dates into contract field values.
//!
//! Encoders never fail: they produce a raw signed candidate which is then
//! checked by [`validate_range`] / [`validate_field`]. Only validated values
//! become a [`FieldValue`].

use crate::error::FieldError;
use alloy_primitives::{I256, U256};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest value a contract field can hold: `2^254 - 1`.
pub const FIELD_MAX: U256 = U256::from_limbs([u64::MAX, u64::MAX, u64::MAX, (1 << 62) - 1]);

const DATE_TIME_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Date-time forms that carry their own offset but no seconds
const OFFSET_DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M%:z", "%Y-%m-%dT%H:%M%z"];

/// `%B` also accepts abbreviated month names when parsing
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%B %d %Y", "%d %B %Y"];

/// A validated field element in `[0, 2^254 - 1]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "U256", into = "U256")]
pub struct FieldValue(U256);

impl FieldValue {
    pub const ZERO: Self = Self(U256::ZERO);

    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        Self(U256::from(value))
    }

    #[must_use]
    pub const fn as_u256(&self) -> U256 {
        self.0
    }
}

impl TryFrom<U256> for FieldValue {
    type Error = FieldError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        if value > FIELD_MAX {
            return Err(FieldError::OutOfRange {
                field: "Field",
                value: I256::from_raw(value),
            });
        }
        Ok(Self(value))
    }
}

impl From<FieldValue> for U256 {
    fn from(value: FieldValue) -> Self {
        value.0
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lift a machine integer into a raw field candidate.
#[must_use]
pub fn signed(value: i64) -> I256 {
    let magnitude = I256::from_raw(U256::from(value.unsigned_abs()));
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// Encode a date: epoch seconds when `input` parses as a calendar date,
/// otherwise the sum of its character codes.
#[must_use]
pub fn encode_date(input: &str) -> I256 {
    parse_epoch_seconds(input).map_or_else(|| char_code_sum(input), signed)
}

/// Seconds since the Unix epoch (floored) for a recognised date, in UTC
/// unless the input carries its own offset.
#[must_use]
pub fn parse_epoch_seconds(input: &str) -> Option<i64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(date_time) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(date_time.timestamp());
    }

    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(date_time) = DateTime::parse_from_str(trimmed, format) {
            return Some(date_time.timestamp());
        }
    }

    // A trailing `Z` is UTC, which is already the default for naive forms
    let naive = trimmed.strip_suffix(['Z', 'z']).unwrap_or(trimmed);
    for format in DATE_TIME_FORMATS {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(date_time.and_utc().timestamp());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc().timestamp())
}

/// Sum of UTF-16 code units, the fallback encoding for non-dates.
#[must_use]
pub fn char_code_sum(input: &str) -> I256 {
    let sum: u64 = input.encode_utf16().map(u64::from).sum();
    I256::from_raw(U256::from(sum))
}

/// Stand-in for a name: its length in UTF-16 code units.
#[must_use]
pub fn encode_length(input: &str) -> I256 {
    I256::from_raw(U256::from(input.encode_utf16().count() as u64))
}

/// Parse the leading integer of `input` (optional sign, then digits).
/// Trailing characters after the digits are ignored.
pub fn parse_integer(input: &str) -> Result<I256, FieldError> {
    let trimmed = input.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => ("-", &trimmed[1..]),
        Some(b'+') => ("", &trimmed[1..]),
        _ => ("", trimmed),
    };

    let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(FieldError::NotAnInteger {
            input: input.to_string(),
        });
    }

    I256::from_dec_str(&format!("{sign}{digits}")).map_err(|_| FieldError::Overflow {
        input: input.to_string(),
    })
}

/// Check a candidate against the field domain.
pub fn validate_range(value: I256) -> Result<FieldValue, FieldError> {
    validate_field("Field", value)
}

/// Same as [`validate_range`], naming `field` in the error.
pub fn validate_field(field: &'static str, value: I256) -> Result<FieldValue, FieldError> {
    if value.is_negative() || value.into_raw() > FIELD_MAX {
        return Err(FieldError::OutOfRange { field, value });
    }
    Ok(FieldValue(value.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(value: u64) -> FieldValue {
        FieldValue::from_u64(value)
    }

    #[test]
    fn test_field_max_is_two_pow_254_minus_one() {
        let expected = (U256::from(1u64) << 254_usize) - U256::from(1u64);
        assert_eq!(FIELD_MAX, expected);
    }

    #[test]
    fn test_encode_date_calendar_dates() {
        assert_eq!(encode_date("2024-03-15"), signed(1_710_460_800));
        assert_eq!(encode_date("1970-01-01"), signed(0));
        assert_eq!(encode_date("2024-03-15T12:30:00Z"), signed(1_710_505_800));
        assert_eq!(encode_date("2024-03-15T12:30:00"), signed(1_710_505_800));
        assert_eq!(encode_date("2024-03-15T14:30:00+02:00"), signed(1_710_505_800));
        assert_eq!(encode_date("2024-03-15T12:30Z"), signed(1_710_505_800));
        assert_eq!(encode_date("2024-03-15T14:30+02:00"), signed(1_710_505_800));
        assert_eq!(encode_date("2024-03-15 12:30"), signed(1_710_505_800));
    }

    #[test]
    fn test_encode_date_slash_and_month_name_forms() {
        let march_15 = signed(1_710_460_800);
        assert_eq!(encode_date("2024/03/15"), march_15);
        assert_eq!(encode_date("2024/3/15"), march_15);
        assert_eq!(encode_date("March 15, 2024"), march_15);
        assert_eq!(encode_date("Mar 15, 2024"), march_15);
        assert_eq!(encode_date("March 15 2024"), march_15);
        assert_eq!(encode_date("15 March 2024"), march_15);
        assert_eq!(encode_date("15 Mar 2024"), march_15);
        assert_eq!(parse_epoch_seconds("Smarch 15, 2024"), None);
    }

    #[test]
    fn test_encode_date_floors_fractional_seconds() {
        assert_eq!(encode_date("2024-03-15T12:30:00.999Z"), signed(1_710_505_800));
    }

    #[test]
    fn test_encode_date_is_deterministic() {
        for input in ["2023-11-02", "harvest soon", "", "2024-02-30"] {
            assert_eq!(encode_date(input), encode_date(input));
        }
    }

    #[test]
    fn test_encode_date_falls_back_to_char_codes() {
        assert_eq!(encode_date("abc"), signed(294));
        // February 30th is not a calendar date
        let expected: i64 = "2024-02-30".bytes().map(i64::from).sum();
        assert_eq!(encode_date("2024-02-30"), signed(expected));
        assert_eq!(encode_date(""), signed(0));
        assert!(!encode_date("next tuesday").is_negative());
    }

    #[test]
    fn test_pre_epoch_date_is_rejected_by_validation() {
        let encoded = encode_date("1969-12-31");
        assert_eq!(encoded, signed(-86_400));
        assert!(matches!(
            validate_field("Registration date", encoded),
            Err(FieldError::OutOfRange { field: "Registration date", .. })
        ));
    }

    #[test]
    fn test_encode_length() {
        assert_eq!(encode_length("Amina Okafor"), signed(12));
        assert_eq!(encode_length(""), signed(0));
    }

    #[test]
    fn test_validate_range_bounds() {
        assert_eq!(validate_range(signed(0)).unwrap(), FieldValue::ZERO);
        assert_eq!(
            validate_range(I256::from_raw(FIELD_MAX)).unwrap().as_u256(),
            FIELD_MAX
        );

        let too_big = I256::from_raw(FIELD_MAX + U256::from(1u64));
        assert!(matches!(
            validate_range(too_big),
            Err(FieldError::OutOfRange { .. })
        ));
        assert!(matches!(
            validate_range(signed(-1)),
            Err(FieldError::OutOfRange { .. })
        ));
        assert!(validate_range(I256::MAX).is_err());
    }

    #[test]
    fn test_parse_integer() {
        assert_eq!(parse_integer("3").unwrap(), signed(3));
        assert_eq!(parse_integer(" 42 ").unwrap(), signed(42));
        assert_eq!(parse_integer("7kg").unwrap(), signed(7));
        assert_eq!(parse_integer("-2").unwrap(), signed(-2));
        assert!(matches!(
            parse_integer("grains"),
            Err(FieldError::NotAnInteger { .. })
        ));
        assert!(matches!(
            parse_integer(&"9".repeat(100)),
            Err(FieldError::Overflow { .. })
        ));
    }

    #[test]
    fn test_crop_type_three_is_accepted() {
        let value = validate_field("Crop type", parse_integer("3").unwrap()).unwrap();
        assert_eq!(value, field(3));
    }

    #[test]
    fn test_field_value_serde_rejects_out_of_range() {
        let json = serde_json::to_string(&field(5)).unwrap();
        let parsed: FieldValue = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, field(5));

        let too_big = serde_json::to_string(&U256::MAX).unwrap();
        assert!(serde_json::from_str::<FieldValue>(&too_big).is_err());
    }
}
