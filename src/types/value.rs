//! # Routing Literals
//!
//! `Literal<'a>` is a scalar as it appeared in the statement (or as bound by
//! the client for a placeholder), before coercion to the column type. It
//! borrows its text, so building one from a parsed token does not allocate.
//!
//! | Variant | Source                                   |
//! |---------|------------------------------------------|
//! | Int     | integer literal, signed bound parameter  |
//! | UInt    | unsigned bound parameter                 |
//! | Decimal | `1.5`, `2e3` (kept as text)              |
//! | Str     | string literal (escapes already applied) |
//! | Hex     | `0x1F`, `X'1F'` digits                   |
//! | Bool    | TRUE / FALSE                             |
//! | Null    | NULL                                     |

use std::fmt;

use crate::sql::relation::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal<'a> {
    Int(i64),
    UInt(u64),
    Decimal(&'a str),
    Str(&'a str),
    Hex(&'a str),
    Bool(bool),
    Null,
}

impl<'a> Literal<'a> {
    /// Literal carried by a parsed token; placeholders and expressions yield `None`.
    pub fn from_token(kind: &TokenKind<'a>) -> Option<Literal<'a>> {
        match *kind {
            TokenKind::Int(v) => Some(Literal::Int(v)),
            TokenKind::Decimal(text) => Some(Literal::Decimal(text)),
            TokenKind::Str(text) => Some(Literal::Str(text)),
            TokenKind::Hex(digits) => Some(Literal::Hex(digits)),
            TokenKind::Bool(b) => Some(Literal::Bool(b)),
            TokenKind::Null => Some(Literal::Null),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl fmt::Display for Literal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::UInt(v) => write!(f, "{}", v),
            Literal::Decimal(text) => f.write_str(text),
            Literal::Str(text) => write!(f, "'{}'", text),
            Literal::Hex(digits) => write!(f, "0x{}", digits),
            Literal::Bool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            Literal::Null => f.write_str("NULL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(
            Literal::from_token(&TokenKind::Int(42)),
            Some(Literal::Int(42))
        );
        assert_eq!(
            Literal::from_token(&TokenKind::Str("abc")),
            Some(Literal::Str("abc"))
        );
        assert_eq!(Literal::from_token(&TokenKind::Variable("@x")), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Literal::Str("a").to_string(), "'a'");
        assert_eq!(Literal::Hex("1F").to_string(), "0x1F");
        assert_eq!(Literal::Null.to_string(), "NULL");
        assert_eq!(Literal::UInt(u64::MAX).to_string(), "18446744073709551615");
    }
}
