//! Value transforms applied between local and remote representations.
//!
//! Each transform is a pure function keyed by a [`TransformKind`] hint
//! declared per field on the record-type spec. Transforms run only when
//! the source value is present; absent values pass through unchanged.
//! Malformed input (the wrong value kind for the hint) is a fatal
//! [`TransformError`] that aborts the whole push.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use erpsync_model::{Direction, FieldValue};
use thiserror::Error;

/// The remote system stores timestamps against this fixed UTC offset.
const REMOTE_BASE_OFFSET_HOURS: i32 = 8;

/// Longest phone string the remote accepts.
const PHONE_MAX: usize = 22;

/// Longest first name the remote accepts.
const FIRST_NAME_MAX: usize = 33;

/// Declared transform hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    /// Phone-number normalization.
    Phone,
    /// Email whitespace trimming.
    Email,
    /// First-name truncation.
    FirstName,
    /// Calendar date pinned to a remote-safe instant.
    Date,
    /// Instant shifted into the remote instance's clock.
    DateTime,
}

/// Invocation context for transforms.
///
/// The remote instance's timezone offset is passed explicitly here rather
/// than read from process-wide state, so transforms stay deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformContext {
    /// UTC offset of the remote instance's configured timezone, in hours.
    pub remote_utc_offset_hours: i32,
}

impl TransformContext {
    /// Creates a context for a remote instance at the given UTC offset.
    #[must_use]
    pub fn new(remote_utc_offset_hours: i32) -> Self {
        Self {
            remote_utc_offset_hours,
        }
    }
}

/// A value failed its declared transform.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// The value kind does not match what the transform expects.
    #[error("{kind:?} transform expects {expected}, got {actual}")]
    WrongKind {
        /// The declared hint.
        kind: TransformKind,
        /// Value kind the transform operates on.
        expected: &'static str,
        /// Value kind actually supplied.
        actual: &'static str,
    },

    /// A timezone shift produced a timestamp outside the representable range.
    #[error("{kind:?} transform produced an out-of-range timestamp")]
    OutOfRange {
        /// The declared hint.
        kind: TransformKind,
    },
}

impl TransformError {
    /// Creates a wrong-kind error.
    #[must_use]
    pub fn wrong_kind(kind: TransformKind, expected: &'static str, actual: &'static str) -> Self {
        TransformError::WrongKind {
            kind,
            expected,
            actual,
        }
    }
}

/// Applies the transform declared by `kind` to a present value.
///
/// Formatting transforms (phone, email, first name) apply on push and pass
/// through on pull; datetime applies the inverse shift on pull.
pub fn apply_transform(
    kind: TransformKind,
    value: &FieldValue,
    direction: Direction,
    ctx: &TransformContext,
) -> Result<FieldValue, TransformError> {
    match kind {
        TransformKind::Phone => text_transform(kind, value, direction, normalize_phone),
        TransformKind::Email => text_transform(kind, value, direction, |s| s.trim().to_string()),
        TransformKind::FirstName => text_transform(kind, value, direction, truncate_first_name),
        TransformKind::Date => pin_date(value, direction, ctx),
        TransformKind::DateTime => shift_datetime(value, direction, ctx),
    }
}

fn text_transform(
    kind: TransformKind,
    value: &FieldValue,
    direction: Direction,
    f: impl Fn(&str) -> String,
) -> Result<FieldValue, TransformError> {
    let text = value
        .as_text()
        .ok_or_else(|| TransformError::wrong_kind(kind, "text", kind_name(value)))?;
    match direction {
        Direction::Push => Ok(FieldValue::Text(f(text))),
        Direction::Pull => Ok(value.clone()),
    }
}

/// Strips a phone number down to digits plus a single `x` extension
/// marker, dropping the national `1` prefix from 11-digit numbers and the
/// extension itself when the result would exceed the remote's limit.
fn normalize_phone(raw: &str) -> String {
    let collapsed = raw.trim().replace("extension", "x").replace("ext", "x");
    let mut phone: String = collapsed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == 'x')
        .collect();

    let bytes = phone.as_bytes();
    if bytes.len() >= 11 && bytes[0] == b'1' && bytes[1..11].iter().all(u8::is_ascii_digit) {
        phone.remove(0);
    }

    if phone.len() > PHONE_MAX {
        if let Some(pos) = phone.find('x') {
            phone.truncate(pos);
        }
    }

    phone
}

fn truncate_first_name(name: &str) -> String {
    name.chars().take(FIRST_NAME_MAX).collect()
}

/// Pins a calendar date to an instant at the remote base offset, at an
/// hour chosen so the date survives conversion into the remote instance's
/// configured timezone.
fn pin_date(
    value: &FieldValue,
    direction: Direction,
    ctx: &TransformContext,
) -> Result<FieldValue, TransformError> {
    let kind = TransformKind::Date;
    let date = match value {
        FieldValue::Date(d) => *d,
        other => return Err(TransformError::wrong_kind(kind, "date", kind_name(other))),
    };
    if direction == Direction::Pull {
        return Ok(value.clone());
    }

    let hour =
        (24 - (REMOTE_BASE_OFFSET_HOURS + ctx.remote_utc_offset_hours)).rem_euclid(24) as u32;
    pin(date, hour)
        .map(FieldValue::DateTime)
        .ok_or(TransformError::OutOfRange { kind })
}

fn pin(date: NaiveDate, hour: u32) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::west_opt(REMOTE_BASE_OFFSET_HOURS * 3600)?;
    date.and_hms_opt(hour, 0, 0)?
        .and_local_timezone(offset)
        .single()
}

/// Rebases an instant's wall-clock time onto the remote base offset, then
/// shifts it by the distance between base and instance timezones. Pull
/// applies the inverse shift.
fn shift_datetime(
    value: &FieldValue,
    direction: Direction,
    ctx: &TransformContext,
) -> Result<FieldValue, TransformError> {
    let kind = TransformKind::DateTime;
    let dt = match value {
        FieldValue::DateTime(dt) => *dt,
        other => {
            return Err(TransformError::wrong_kind(
                kind,
                "datetime",
                kind_name(other),
            ))
        }
    };

    let shift = Duration::hours((REMOTE_BASE_OFFSET_HOURS + ctx.remote_utc_offset_hours) as i64);
    let shifted = match direction {
        Direction::Push => FixedOffset::west_opt(REMOTE_BASE_OFFSET_HOURS * 3600)
            .and_then(|offset| dt.naive_local().and_local_timezone(offset).single())
            .and_then(|rebased| rebased.checked_sub_signed(shift)),
        Direction::Pull => dt.checked_add_signed(shift),
    };

    shifted
        .map(FieldValue::DateTime)
        .ok_or(TransformError::OutOfRange { kind })
}

fn kind_name(value: &FieldValue) -> &'static str {
    match value {
        FieldValue::Null => "null",
        FieldValue::Text(_) => "text",
        FieldValue::Integer(_) => "integer",
        FieldValue::Float(_) => "float",
        FieldValue::Boolean(_) => "boolean",
        FieldValue::Date(_) => "date",
        FieldValue::DateTime(_) => "datetime",
        FieldValue::Reference(_) => "reference",
        FieldValue::Map(_) => "map",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use proptest::prelude::*;

    fn push(kind: TransformKind, value: FieldValue) -> Result<FieldValue, TransformError> {
        apply_transform(kind, &value, Direction::Push, &TransformContext::new(-5))
    }

    #[test]
    fn phone_strips_formatting() {
        let out = push(TransformKind::Phone, FieldValue::from("(555) 123-4567")).unwrap();
        assert_eq!(out, FieldValue::from("5551234567"));
    }

    #[test]
    fn phone_drops_national_prefix() {
        let out = push(TransformKind::Phone, FieldValue::from("1-555-123-4567")).unwrap();
        assert_eq!(out, FieldValue::from("5551234567"));
    }

    #[test]
    fn phone_keeps_extension_marker() {
        let out = push(
            TransformKind::Phone,
            FieldValue::from("555-123-4567 ext. 89"),
        )
        .unwrap();
        assert_eq!(out, FieldValue::from("5551234567x89"));

        let out = push(
            TransformKind::Phone,
            FieldValue::from("555-123-4567 extension 89"),
        )
        .unwrap();
        assert_eq!(out, FieldValue::from("5551234567x89"));
    }

    #[test]
    fn phone_drops_extension_when_too_long() {
        let out = push(
            TransformKind::Phone,
            FieldValue::from("5551234567890123456789x123"),
        )
        .unwrap();
        assert_eq!(out, FieldValue::from("5551234567890123456789"));
    }

    #[test]
    fn email_trims() {
        let out = push(TransformKind::Email, FieldValue::from("  a@b.c ")).unwrap();
        assert_eq!(out, FieldValue::from("a@b.c"));
    }

    #[test]
    fn first_name_truncates() {
        let long = "a".repeat(40);
        let out = push(TransformKind::FirstName, FieldValue::from(long)).unwrap();
        assert_eq!(out.as_text().map(str::len), Some(FIRST_NAME_MAX));

        let out = push(TransformKind::FirstName, FieldValue::from("Ana")).unwrap();
        assert_eq!(out, FieldValue::from("Ana"));
    }

    #[test]
    fn date_pins_hour_for_instance_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let out = push(TransformKind::Date, FieldValue::Date(date)).unwrap();

        // 24 - (8 + (-5)) = 21, at the remote base offset.
        match out {
            FieldValue::DateTime(dt) => {
                assert_eq!(dt.hour(), 21);
                assert_eq!(dt.date_naive(), date);
                assert_eq!(dt.offset().local_minus_utc(), -8 * 3600);
            }
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn date_hour_wraps_at_base_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let out = apply_transform(
            TransformKind::Date,
            &FieldValue::Date(date),
            Direction::Push,
            &TransformContext::new(-8),
        )
        .unwrap();
        match out {
            FieldValue::DateTime(dt) => assert_eq!(dt.hour(), 0),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn datetime_shifts_into_instance_clock() {
        let dt = DateTime::parse_from_rfc3339("2024-03-15T12:00:00+00:00").unwrap();
        let out = push(TransformKind::DateTime, FieldValue::DateTime(dt)).unwrap();

        // Wall clock rebased to -08:00, then shifted by 8 + (-5) = 3 hours.
        let expected = DateTime::parse_from_rfc3339("2024-03-15T09:00:00-08:00").unwrap();
        assert_eq!(out, FieldValue::DateTime(expected));
    }

    #[test]
    fn datetime_pull_is_inverse() {
        let ctx = TransformContext::new(-5);
        let dt = DateTime::parse_from_rfc3339("2024-03-15T09:00:00-08:00").unwrap();
        let out = apply_transform(
            TransformKind::DateTime,
            &FieldValue::DateTime(dt),
            Direction::Pull,
            &ctx,
        )
        .unwrap();
        let expected = DateTime::parse_from_rfc3339("2024-03-15T12:00:00-08:00").unwrap();
        assert_eq!(out, FieldValue::DateTime(expected));
    }

    #[test]
    fn wrong_kind_is_fatal() {
        let err = push(TransformKind::Phone, FieldValue::Integer(5)).unwrap_err();
        assert!(matches!(err, TransformError::WrongKind { .. }));

        let err = push(TransformKind::Date, FieldValue::from("2024-03-15")).unwrap_err();
        assert!(matches!(err, TransformError::WrongKind { .. }));
    }

    #[test]
    fn formatting_passes_through_on_pull() {
        let ctx = TransformContext::default();
        let value = FieldValue::from("(555) 123-4567");
        let out = apply_transform(TransformKind::Phone, &value, Direction::Pull, &ctx).unwrap();
        assert_eq!(out, value);
    }

    proptest! {
        #[test]
        fn phone_output_is_digits_and_x(raw in ".{0,64}") {
            let out = normalize_phone(&raw);
            prop_assert!(out.chars().all(|c| c.is_ascii_digit() || c == 'x'));
        }

        #[test]
        fn first_name_never_exceeds_limit(raw in ".{0,64}") {
            let out = truncate_first_name(&raw);
            prop_assert!(out.chars().count() <= FIRST_NAME_MAX);
        }
    }
}
