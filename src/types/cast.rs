//! # Value Coercion
//!
//! Before a literal is hashed it is coerced to the partition column's declared
//! type, so `id = '42'` and `id = 42` land in the same partition. Coercion is
//! behind the [`ValueCaster`] trait so the session layer can plug in its own
//! rules; [`DefaultCaster`] implements MySQL's non-strict conversions.
//!
//! ## Default Rules
//!
//! | Target   | Source          | Result                                         |
//! |----------|-----------------|------------------------------------------------|
//! | integer  | int / uint      | clamped into the column range                  |
//! | integer  | decimal, string | parsed, rounded half away from zero, clamped   |
//! | integer  | hex             | big-endian unsigned value (at most 8 bytes)    |
//! | string   | string          | truncated to the column length, collated       |
//! | string   | number          | decimal text, collated                         |
//! | string   | hex             | raw bytes                                      |
//! | any      | NULL            | NULL                                           |
//!
//! Clamping and truncation are silent; `check_accuracy` is the strict-mode
//! counterpart that rejects values that would be altered.
//!
//! ## Canonical Bytes
//!
//! The hash input of a coerced value is: signed integers as 8 little-endian
//! bytes, unsigned integers as 8 little-endian bytes, strings as their
//! collation sort key, NULL as no bytes.

use eyre::{bail, Result};
use smallvec::SmallVec;

use super::column::{Collation, ColumnType};
use super::value::Literal;
use crate::error::RouteError;

pub type KeyBytes = SmallVec<[u8; 24]>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastValue {
    Int(i64),
    UInt(u64),
    Bytes(KeyBytes),
    Null,
}

impl CastValue {
    pub fn canonical_bytes(&self) -> KeyBytes {
        match self {
            CastValue::Int(v) => SmallVec::from_slice(&v.to_le_bytes()),
            CastValue::UInt(v) => SmallVec::from_slice(&v.to_le_bytes()),
            CastValue::Bytes(bytes) => bytes.clone(),
            CastValue::Null => SmallVec::new(),
        }
    }

    /// Absolute integer value, as used by HASH (modulo) partitioning.
    pub fn integer_magnitude(&self) -> Option<u64> {
        match *self {
            CastValue::Int(v) => Some(v.unsigned_abs()),
            CastValue::UInt(v) => Some(v),
            CastValue::Null => Some(0),
            CastValue::Bytes(_) => None,
        }
    }
}

pub trait ValueCaster: Send + Sync {
    fn cast(&self, value: &Literal<'_>, column: &ColumnType, collation: Collation) -> Result<CastValue>;

    /// Fails with `RouteError::Accuracy` when `cast` would alter the value.
    fn check_accuracy(&self, value: &Literal<'_>, column: &ColumnType) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCaster;

fn cast_error(value: &Literal<'_>, column: &ColumnType) -> RouteError {
    RouteError::Cast {
        value: value.to_string(),
        target: column.to_string(),
    }
}

fn accuracy_error(value: &Literal<'_>, column: &ColumnType) -> RouteError {
    RouteError::Accuracy {
        value: value.to_string(),
        target: column.to_string(),
    }
}

/// Decodes hex digits; an odd digit count gets an implicit leading zero.
pub fn decode_hex(digits: &str) -> Option<KeyBytes> {
    let bytes = digits.as_bytes();
    let mut out = KeyBytes::new();
    let (head, rest) = if bytes.len() % 2 == 1 {
        (Some(bytes[0]), &bytes[1..])
    } else {
        (None, bytes)
    };
    if let Some(digit) = head {
        out.push(hex_value(digit)?);
    }
    for pair in rest.chunks_exact(2) {
        out.push(hex_value(pair[0])? << 4 | hex_value(pair[1])?);
    }
    Some(out)
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|d| d as u8)
}

/// Numeric value of a literal as an integer, rounding decimals half away from zero.
fn literal_to_i128(value: &Literal<'_>) -> Option<i128> {
    match *value {
        Literal::Int(v) => Some(v as i128),
        Literal::UInt(v) => Some(v as i128),
        Literal::Bool(b) => Some(b as i128),
        Literal::Decimal(text) => decimal_to_i128(text),
        Literal::Str(text) => {
            let text = text.trim();
            text.parse::<i128>().ok().or_else(|| decimal_to_i128(text))
        }
        Literal::Hex(digits) => {
            let bytes = decode_hex(digits)?;
            if bytes.len() > 8 {
                return None;
            }
            Some(bytes.iter().fold(0i128, |acc, &b| acc << 8 | b as i128))
        }
        Literal::Null => None,
    }
}

fn decimal_to_i128(text: &str) -> Option<i128> {
    parse_decimal(text).map(|(value, _)| value)
}

/// Parses `[+-]digits[.digits][(e|E)[+-]digits]` exactly.
///
/// Returns the value rounded half away from zero and whether no nonzero
/// digit was lost. `None` for malformed text or a magnitude past `i128`.
fn parse_decimal(text: &str) -> Option<(i128, bool)> {
    let bytes = text.as_bytes();
    let (negative, rest) = match bytes.first()? {
        b'-' => (true, &bytes[1..]),
        b'+' => (false, &bytes[1..]),
        _ => (false, bytes),
    };
    let exponent_at = rest
        .iter()
        .position(|b| matches!(b, b'e' | b'E'))
        .unwrap_or(rest.len());
    let (mantissa, exponent) = rest.split_at(exponent_at);
    let (int_digits, frac_digits) = match mantissa.iter().position(|&b| b == b'.') {
        Some(dot) => (&mantissa[..dot], &mantissa[dot + 1..]),
        None => (mantissa, &[][..]),
    };
    if int_digits.is_empty() && frac_digits.is_empty() {
        return None;
    }
    if !int_digits.iter().chain(frac_digits).all(u8::is_ascii_digit) {
        return None;
    }
    let exponent = match exponent.split_first() {
        None => 0,
        Some((_, digits)) => parse_exponent(digits)?,
    };

    let digits: SmallVec<[u8; 32]> = int_digits.iter().chain(frac_digits).map(|b| b - b'0').collect();
    if digits.iter().all(|&d| d == 0) {
        return Some((0, true));
    }

    // Digits before `point` are the integer part; zeros pad past the end.
    let point = int_digits.len() as i64 + exponent;
    let mut value: i128 = 0;
    for i in 0..point.max(0) {
        let digit = digits.get(i as usize).copied().unwrap_or(0);
        value = value.checked_mul(10)?.checked_add(digit as i128)?;
    }
    let fraction: &[u8] = match usize::try_from(point) {
        Ok(point) => digits.get(point..).unwrap_or(&[]),
        Err(_) => &digits[..],
    };
    let exact = fraction.iter().all(|&d| d == 0);
    let half_or_more = point >= 0 && fraction.first().is_some_and(|&d| d >= 5);
    if half_or_more {
        value = value.checked_add(1)?;
    }
    Some((if negative { -value } else { value }, exact))
}

/// Exponent digits with an optional sign, saturated well past any `i128` scale.
fn parse_exponent(digits: &[u8]) -> Option<i64> {
    const LIMIT: i64 = 1 << 32;
    let (negative, digits) = match digits.first()? {
        b'-' => (true, &digits[1..]),
        b'+' => (false, &digits[1..]),
        _ => (false, digits),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let magnitude = digits
        .iter()
        .fold(0i64, |acc, &d| (acc * 10 + (d - b'0') as i64).min(LIMIT));
    Some(if negative { -magnitude } else { magnitude })
}

/// Whether the literal is an integer without any rounding.
fn literal_is_integral(value: &Literal<'_>) -> bool {
    match *value {
        Literal::Decimal(text) => parse_decimal(text).is_some_and(|(_, exact)| exact),
        Literal::Str(text) => {
            let text = text.trim();
            text.parse::<i128>().is_ok() || parse_decimal(text).is_some_and(|(_, exact)| exact)
        }
        _ => true,
    }
}

fn literal_text_bytes<'v>(value: &Literal<'v>) -> Option<std::borrow::Cow<'v, [u8]>> {
    use std::borrow::Cow;
    match *value {
        Literal::Str(text) => Some(Cow::Borrowed(text.as_bytes())),
        Literal::Decimal(text) => Some(Cow::Borrowed(text.as_bytes())),
        Literal::Int(v) => Some(Cow::Owned(v.to_string().into_bytes())),
        Literal::UInt(v) => Some(Cow::Owned(v.to_string().into_bytes())),
        Literal::Bool(b) => Some(Cow::Borrowed(if b { b"1" } else { b"0" })),
        Literal::Hex(digits) => decode_hex(digits).map(|bytes| Cow::Owned(bytes.to_vec())),
        Literal::Null => None,
    }
}

fn truncate_chars(bytes: &[u8], max_chars: usize) -> &[u8] {
    match std::str::from_utf8(bytes) {
        Ok(text) => match text.char_indices().nth(max_chars) {
            Some((cut, _)) => &bytes[..cut],
            None => bytes,
        },
        Err(_) => &bytes[..bytes.len().min(max_chars)],
    }
}

fn length_of(bytes: &[u8], column: &ColumnType) -> usize {
    match column {
        ColumnType::Binary { .. } => bytes.len(),
        _ => std::str::from_utf8(bytes).map_or(bytes.len(), |text| text.chars().count()),
    }
}

impl ValueCaster for DefaultCaster {
    fn cast(&self, value: &Literal<'_>, column: &ColumnType, collation: Collation) -> Result<CastValue> {
        if value.is_null() {
            return Ok(CastValue::Null);
        }

        match *column {
            ColumnType::Integer { unsigned, .. } => {
                let Some(n) = literal_to_i128(value) else {
                    bail!(cast_error(value, column));
                };
                let (min, max) = column.int_range().unwrap_or((i64::MIN as i128, i64::MAX as i128));
                let clamped = n.clamp(min, max);
                if unsigned {
                    Ok(CastValue::UInt(clamped as u64))
                } else {
                    Ok(CastValue::Int(clamped as i64))
                }
            }
            ColumnType::Varchar { .. } | ColumnType::Char { .. } | ColumnType::Binary { .. } => {
                let Some(text) = literal_text_bytes(value) else {
                    bail!(cast_error(value, column));
                };
                let max = column.max_len().unwrap_or(usize::MAX);
                let truncated = match column {
                    ColumnType::Binary { .. } => &text[..text.len().min(max)],
                    _ => truncate_chars(&text, max),
                };
                let key = match column {
                    ColumnType::Binary { .. } => std::borrow::Cow::Borrowed(truncated),
                    _ => collation.sort_key(truncated),
                };
                Ok(CastValue::Bytes(SmallVec::from_slice(&key)))
            }
        }
    }

    fn check_accuracy(&self, value: &Literal<'_>, column: &ColumnType) -> Result<()> {
        if value.is_null() {
            return Ok(());
        }

        match column {
            ColumnType::Integer { .. } => {
                let Some(n) = literal_to_i128(value) else {
                    bail!(cast_error(value, column));
                };
                let (min, max) = column.int_range().unwrap_or((i64::MIN as i128, i64::MAX as i128));
                if n < min || n > max || !literal_is_integral(value) {
                    bail!(accuracy_error(value, column));
                }
                Ok(())
            }
            _ => {
                let Some(text) = literal_text_bytes(value) else {
                    bail!(cast_error(value, column));
                };
                let max = column.max_len().unwrap_or(usize::MAX);
                if length_of(&text, column) > max {
                    bail!(accuracy_error(value, column));
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn tinyint() -> ColumnType {
        ColumnType::Integer {
            bytes: 1,
            unsigned: false,
        }
    }

    #[test]
    fn test_int_passthrough_and_clamp() {
        let caster = DefaultCaster;
        let big = ColumnType::bigint();
        assert_eq!(
            caster.cast(&Literal::Int(1001), &big, Collation::Binary).unwrap(),
            CastValue::Int(1001)
        );
        assert_eq!(
            caster.cast(&Literal::Int(300), &tinyint(), Collation::Binary).unwrap(),
            CastValue::Int(127)
        );
        let unsigned = ColumnType::Integer {
            bytes: 4,
            unsigned: true,
        };
        assert_eq!(
            caster.cast(&Literal::Int(-5), &unsigned, Collation::Binary).unwrap(),
            CastValue::UInt(0)
        );
    }

    #[test]
    fn test_string_and_decimal_to_int() {
        let caster = DefaultCaster;
        let big = ColumnType::bigint();
        assert_eq!(
            caster.cast(&Literal::Str(" 42 "), &big, Collation::Binary).unwrap(),
            CastValue::Int(42)
        );
        assert_eq!(
            caster.cast(&Literal::Decimal("2.5"), &big, Collation::Binary).unwrap(),
            CastValue::Int(3)
        );
        assert_eq!(
            caster.cast(&Literal::Decimal("-2.5"), &big, Collation::Binary).unwrap(),
            CastValue::Int(-3)
        );
        let err = caster
            .cast(&Literal::Str("abc"), &big, Collation::Binary)
            .unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::Cast));
    }

    #[test]
    fn test_decimal_to_int_is_exact_past_f64() {
        let caster = DefaultCaster;
        let big = ColumnType::bigint();
        for literal in [
            Literal::Decimal("9007199254740993.0"),
            Literal::Str("9007199254740993.0"),
            Literal::Decimal("90071992547409.93e2"),
        ] {
            assert_eq!(
                caster.cast(&literal, &big, Collation::Binary).unwrap(),
                CastValue::Int(9007199254740993)
            );
        }
        assert_eq!(
            caster
                .cast(&Literal::Decimal("-9223372036854775807.5"), &big, Collation::Binary)
                .unwrap(),
            CastValue::Int(i64::MIN)
        );
        assert!(caster
            .check_accuracy(&Literal::Decimal("9007199254740993.0"), &big)
            .is_ok());
        assert!(caster
            .check_accuracy(&Literal::Decimal("9007199254740993.000001"), &big)
            .is_err());
    }

    #[test]
    fn test_parse_decimal_forms() {
        assert_eq!(parse_decimal("12.49"), Some((12, false)));
        assert_eq!(parse_decimal("12.5"), Some((13, false)));
        assert_eq!(parse_decimal("-0.5"), Some((-1, false)));
        assert_eq!(parse_decimal(".4"), Some((0, false)));
        assert_eq!(parse_decimal("7."), Some((7, true)));
        assert_eq!(parse_decimal("+1.5E3"), Some((1500, true)));
        assert_eq!(parse_decimal("15e-1"), Some((2, false)));
        assert_eq!(parse_decimal("5e-1"), Some((1, false)));
        assert_eq!(parse_decimal("5e-2"), Some((0, false)));
        assert_eq!(parse_decimal("0e999999999999"), Some((0, true)));
        assert_eq!(parse_decimal("1e99999999999999999999"), None);
        assert_eq!(parse_decimal("1e-99999999999999999999"), Some((0, false)));
        for bad in ["", "-", ".", "1.2.3", "1e", "1e+", "abc", "1x", "inf"] {
            assert_eq!(parse_decimal(bad), None, "{}", bad);
        }
    }

    #[test]
    fn test_hex_to_int() {
        let caster = DefaultCaster;
        assert_eq!(
            caster
                .cast(&Literal::Hex("1F"), &ColumnType::bigint(), Collation::Binary)
                .unwrap(),
            CastValue::Int(31)
        );
        assert_eq!(decode_hex("F").unwrap().as_slice(), &[0x0F]);
        assert!(decode_hex("zz").is_none());
    }

    #[test]
    fn test_string_collation_and_truncation() {
        let caster = DefaultCaster;
        let col = ColumnType::varchar(3);
        assert_eq!(
            caster
                .cast(&Literal::Str("abcdef"), &col, Collation::Utf8mb4GeneralCi)
                .unwrap(),
            CastValue::Bytes(SmallVec::from_slice(b"ABC"))
        );
        assert_eq!(
            caster
                .cast(&Literal::Int(12), &ColumnType::varchar(10), Collation::Utf8mb4Bin)
                .unwrap(),
            CastValue::Bytes(SmallVec::from_slice(b"12"))
        );
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let caster = DefaultCaster;
        let value = caster
            .cast(&Literal::Str("héllo"), &ColumnType::varchar(2), Collation::Binary)
            .unwrap();
        assert_eq!(value, CastValue::Bytes(SmallVec::from_slice("hé".as_bytes())));
    }

    #[test]
    fn test_null_casts_to_null() {
        let caster = DefaultCaster;
        assert_eq!(
            caster
                .cast(&Literal::Null, &ColumnType::bigint(), Collation::Binary)
                .unwrap(),
            CastValue::Null
        );
        assert!(CastValue::Null.canonical_bytes().is_empty());
    }

    #[test]
    fn test_accuracy_checks() {
        let caster = DefaultCaster;
        assert!(caster.check_accuracy(&Literal::Int(100), &tinyint()).is_ok());
        let err = caster.check_accuracy(&Literal::Int(300), &tinyint()).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::Accuracy));

        let err = caster
            .check_accuracy(&Literal::Decimal("1.5"), &ColumnType::bigint())
            .unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::Accuracy));

        assert!(caster
            .check_accuracy(&Literal::Str("abc"), &ColumnType::varchar(3))
            .is_ok());
        assert!(caster
            .check_accuracy(&Literal::Str("abcd"), &ColumnType::varchar(3))
            .is_err());
    }

    #[test]
    fn test_canonical_bytes_layout() {
        assert_eq!(
            CastValue::Int(1).canonical_bytes().as_slice(),
            &[1, 0, 0, 0, 0, 0, 0, 0]
        );
        assert_eq!(
            CastValue::Int(-1).canonical_bytes().as_slice(),
            &[0xff; 8]
        );
        assert_eq!(CastValue::Int(-7).integer_magnitude(), Some(7));
    }
}
