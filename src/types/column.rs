//! # Partition Column Types and Collations
//!
//! Declared type and collation of a partition-key column, as far as routing
//! needs them: integer width and signedness for range clamping, character
//! length for truncation and accuracy checks, and the collation that decides
//! which strings hash alike.
//!
//! ## Collations
//!
//! | Collation          | Sort key                                         |
//! |--------------------|--------------------------------------------------|
//! | binary             | bytes as-is                                      |
//! | utf8mb4_bin        | trailing spaces removed                          |
//! | utf8mb4_general_ci | trailing spaces removed, ASCII letters uppercased|
//!
//! Case folding is ASCII-only; non-ASCII characters keep their bytes.

use std::borrow::Cow;
use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ColumnType {
    /// Integer of `bytes` storage width (1, 2, 3, 4 or 8).
    Integer { bytes: u8, unsigned: bool },
    Varchar { max_chars: u32 },
    Char { chars: u32 },
    Binary { max_bytes: u32 },
}

impl ColumnType {
    pub fn bigint() -> Self {
        ColumnType::Integer {
            bytes: 8,
            unsigned: false,
        }
    }

    pub fn int() -> Self {
        ColumnType::Integer {
            bytes: 4,
            unsigned: false,
        }
    }

    pub fn varchar(max_chars: u32) -> Self {
        ColumnType::Varchar { max_chars }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer { .. })
    }

    /// Inclusive value range of an integer column.
    pub fn int_range(&self) -> Option<(i128, i128)> {
        let ColumnType::Integer { bytes, unsigned } = *self else {
            return None;
        };
        let bits = u32::from(bytes.clamp(1, 8)) * 8;
        if unsigned {
            Some((0, (1i128 << bits) - 1))
        } else {
            Some((-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1))
        }
    }

    /// Maximum length in characters (or bytes for BINARY).
    pub fn max_len(&self) -> Option<usize> {
        match *self {
            ColumnType::Varchar { max_chars } => Some(max_chars as usize),
            ColumnType::Char { chars } => Some(chars as usize),
            ColumnType::Binary { max_bytes } => Some(max_bytes as usize),
            ColumnType::Integer { .. } => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ColumnType::Integer { bytes, unsigned } => {
                let name = match bytes {
                    1 => "TINYINT",
                    2 => "SMALLINT",
                    3 => "MEDIUMINT",
                    4 => "INT",
                    _ => "BIGINT",
                };
                if unsigned {
                    write!(f, "{} UNSIGNED", name)
                } else {
                    f.write_str(name)
                }
            }
            ColumnType::Varchar { max_chars } => write!(f, "VARCHAR({})", max_chars),
            ColumnType::Char { chars } => write!(f, "CHAR({})", chars),
            ColumnType::Binary { max_bytes } => write!(f, "VARBINARY({})", max_bytes),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collation {
    #[default]
    Binary,
    Utf8mb4Bin,
    Utf8mb4GeneralCi,
}

impl Collation {
    pub fn name(&self) -> &'static str {
        match self {
            Collation::Binary => "binary",
            Collation::Utf8mb4Bin => "utf8mb4_bin",
            Collation::Utf8mb4GeneralCi => "utf8mb4_general_ci",
        }
    }

    /// Bytes that compare and hash equal exactly when the collation says so.
    pub fn sort_key<'s>(&self, bytes: &'s [u8]) -> Cow<'s, [u8]> {
        match self {
            Collation::Binary => Cow::Borrowed(bytes),
            Collation::Utf8mb4Bin => Cow::Borrowed(trim_trailing_spaces(bytes)),
            Collation::Utf8mb4GeneralCi => {
                let trimmed = trim_trailing_spaces(bytes);
                if trimmed.iter().any(|b| b.is_ascii_lowercase()) {
                    Cow::Owned(trimmed.to_ascii_uppercase())
                } else {
                    Cow::Borrowed(trimmed)
                }
            }
        }
    }
}

fn trim_trailing_spaces(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ')
        .map_or(0, |pos| pos + 1);
    &bytes[..end]
}
