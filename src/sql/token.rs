//! # Fragment Tokens
//!
//! Token vocabulary of the routing lexer. Tokens borrow from the statement
//! text; string literals keep their raw body and a flag saying whether escape
//! processing is still needed, so unescaping only happens for literals that
//! end up routed.

use std::fmt;

/// Byte range into the original statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}

impl Span {
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn shifted(&self, base: usize) -> Self {
        Self::new(self.start + base, self.len)
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Text covered by the span, if it is still valid for `input`.
    pub fn slice<'a>(&self, input: &'a str) -> Option<&'a str> {
        input.get(self.start..self.end())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Anonymous,
    Positional(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Keyword {
    // clause structure
    Where,
    As,
    Values,
    Value,
    Set,
    On,
    Using,
    // joins
    Join,
    StraightJoin,
    Left,
    Right,
    Inner,
    Outer,
    Cross,
    Natural,
    // predicates
    And,
    Or,
    Xor,
    Not,
    In,
    Between,
    Is,
    Null,
    True,
    False,
    Unknown,
    Like,
    Regexp,
    Rlike,
    Escape,
    Div,
    Mod,
    Interval,
    Collate,
    Binary,
    // end of the routed fragment
    Group,
    Order,
    Limit,
    Having,
    Union,
    For,
    Lock,
    Window,
    Into,
    Returning,
    // statement heads
    Select,
    Insert,
    Replace,
    Update,
    Delete,
    From,
    Ignore,
    LowPriority,
    HighPriority,
    Delayed,
    Quick,
    Distinct,
    Use,
    Force,
    Index,
    Key,
    Partition,
    Duplicate,
    // zero-argument functions usable without parentheses
    CurrentTimestamp,
    CurrentDate,
    CurrentTime,
    CurrentUser,
    Localtime,
    Localtimestamp,
    UtcTimestamp,
    UtcDate,
    UtcTime,
    Sysdate,
}

impl Keyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::Where => "WHERE",
            Keyword::As => "AS",
            Keyword::Values => "VALUES",
            Keyword::Value => "VALUE",
            Keyword::Set => "SET",
            Keyword::On => "ON",
            Keyword::Using => "USING",
            Keyword::Join => "JOIN",
            Keyword::StraightJoin => "STRAIGHT_JOIN",
            Keyword::Left => "LEFT",
            Keyword::Right => "RIGHT",
            Keyword::Inner => "INNER",
            Keyword::Outer => "OUTER",
            Keyword::Cross => "CROSS",
            Keyword::Natural => "NATURAL",
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Xor => "XOR",
            Keyword::Not => "NOT",
            Keyword::In => "IN",
            Keyword::Between => "BETWEEN",
            Keyword::Is => "IS",
            Keyword::Null => "NULL",
            Keyword::True => "TRUE",
            Keyword::False => "FALSE",
            Keyword::Unknown => "UNKNOWN",
            Keyword::Like => "LIKE",
            Keyword::Regexp => "REGEXP",
            Keyword::Rlike => "RLIKE",
            Keyword::Escape => "ESCAPE",
            Keyword::Div => "DIV",
            Keyword::Mod => "MOD",
            Keyword::Interval => "INTERVAL",
            Keyword::Collate => "COLLATE",
            Keyword::Binary => "BINARY",
            Keyword::Group => "GROUP",
            Keyword::Order => "ORDER",
            Keyword::Limit => "LIMIT",
            Keyword::Having => "HAVING",
            Keyword::Union => "UNION",
            Keyword::For => "FOR",
            Keyword::Lock => "LOCK",
            Keyword::Window => "WINDOW",
            Keyword::Into => "INTO",
            Keyword::Returning => "RETURNING",
            Keyword::Select => "SELECT",
            Keyword::Insert => "INSERT",
            Keyword::Replace => "REPLACE",
            Keyword::Update => "UPDATE",
            Keyword::Delete => "DELETE",
            Keyword::From => "FROM",
            Keyword::Ignore => "IGNORE",
            Keyword::LowPriority => "LOW_PRIORITY",
            Keyword::HighPriority => "HIGH_PRIORITY",
            Keyword::Delayed => "DELAYED",
            Keyword::Quick => "QUICK",
            Keyword::Distinct => "DISTINCT",
            Keyword::Use => "USE",
            Keyword::Force => "FORCE",
            Keyword::Index => "INDEX",
            Keyword::Key => "KEY",
            Keyword::Partition => "PARTITION",
            Keyword::Duplicate => "DUPLICATE",
            Keyword::CurrentTimestamp => "CURRENT_TIMESTAMP",
            Keyword::CurrentDate => "CURRENT_DATE",
            Keyword::CurrentTime => "CURRENT_TIME",
            Keyword::CurrentUser => "CURRENT_USER",
            Keyword::Localtime => "LOCALTIME",
            Keyword::Localtimestamp => "LOCALTIMESTAMP",
            Keyword::UtcTimestamp => "UTC_TIMESTAMP",
            Keyword::UtcDate => "UTC_DATE",
            Keyword::UtcTime => "UTC_TIME",
            Keyword::Sysdate => "SYSDATE",
        }
    }

    /// Keywords that close the WHERE clause of a routed fragment.
    pub fn ends_fragment(&self) -> bool {
        matches!(
            self,
            Keyword::Group
                | Keyword::Order
                | Keyword::Limit
                | Keyword::Having
                | Keyword::Union
                | Keyword::For
                | Keyword::Lock
                | Keyword::Window
                | Keyword::Into
                | Keyword::Returning
        )
    }

    pub fn is_join_modifier(&self) -> bool {
        matches!(
            self,
            Keyword::Left
                | Keyword::Right
                | Keyword::Inner
                | Keyword::Outer
                | Keyword::Cross
                | Keyword::Natural
        )
    }

    /// Functions that MySQL evaluates without an argument list.
    pub fn is_reserved_function(&self) -> bool {
        matches!(
            self,
            Keyword::CurrentTimestamp
                | Keyword::CurrentDate
                | Keyword::CurrentTime
                | Keyword::CurrentUser
                | Keyword::Localtime
                | Keyword::Localtimestamp
                | Keyword::UtcTimestamp
                | Keyword::UtcDate
                | Keyword::UtcTime
                | Keyword::Sysdate
        )
    }

    /// Keywords that double as function names when followed by `(`.
    pub fn can_be_function(&self) -> bool {
        self.is_reserved_function()
            || matches!(
                self,
                Keyword::Left
                    | Keyword::Right
                    | Keyword::Replace
                    | Keyword::Insert
                    | Keyword::Values
                    | Keyword::Value
                    | Keyword::Mod
                    | Keyword::Binary
            )
    }

    /// Non-reserved MySQL words that may name a column.
    pub fn can_be_identifier(&self) -> bool {
        matches!(
            self,
            Keyword::Value
                | Keyword::Duplicate
                | Keyword::Quick
                | Keyword::Returning
                | Keyword::Unknown
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Token<'a> {
    Keyword(Keyword),
    Ident(&'a str),
    /// Body of a quoted identifier and the quote byte that delimited it.
    QuotedIdent(&'a str, u8),
    Integer(i64),
    /// Digits of an integer literal that does not fit in `i64`.
    IntegerOverflow(&'a str),
    Number(&'a str),
    String {
        raw: &'a str,
        escaped: bool,
    },
    HexNumber(&'a str),
    Parameter(Parameter),
    Variable(&'a str),
    /// Body of an optimizer hint comment `/*+ ... */`.
    Hint(&'a str),

    Eq,
    NullSafeEq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Assign,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Ampersand,
    DoubleAmpersand,
    Pipe,
    DoublePipe,
    Caret,
    Tilde,
    Exclamation,
    LeftShift,
    RightShift,

    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,

    Eof,
    Error(&'static str),
}

impl<'a> Token<'a> {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Token::Eq | Token::NullSafeEq | Token::NotEq | Token::Lt | Token::LtEq | Token::Gt | Token::GtEq
        )
    }

    /// Identifier text and quote byte, for tokens that can name an object.
    pub fn ident_text(&self, span_text: &'a str) -> Option<(&'a str, Option<u8>)> {
        match *self {
            Token::Ident(text) => Some((text, None)),
            Token::QuotedIdent(text, quote) => Some((text, Some(quote))),
            Token::Keyword(kw) if kw.can_be_identifier() => Some((span_text, None)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_helpers() {
        let span = Span::new(4, 3);
        assert_eq!(span.end(), 7);
        assert_eq!(span.shifted(10), Span::new(14, 3));
        assert_eq!(span.slice("abcdefghij"), Some("efg"));
        assert_eq!(Span::new(8, 5).slice("abcdefghij"), None);
        assert!(span.overlaps(&Span::new(6, 2)));
        assert!(!span.overlaps(&Span::new(7, 2)));
    }

    #[test]
    fn test_keyword_classes() {
        assert!(Keyword::Order.ends_fragment());
        assert!(!Keyword::Where.ends_fragment());
        assert!(Keyword::Left.is_join_modifier());
        assert!(Keyword::Left.can_be_function());
        assert!(Keyword::CurrentTimestamp.is_reserved_function());
        assert!(Keyword::Value.can_be_identifier());
        assert!(!Keyword::Where.can_be_identifier());
    }

    #[test]
    fn test_ident_text_for_non_reserved_keyword() {
        let token = Token::Keyword(Keyword::Value);
        assert_eq!(token.ident_text("value"), Some(("value", None)));
        assert_eq!(Token::Keyword(Keyword::Where).ident_text("where"), None);
        assert_eq!(
            Token::QuotedIdent("order", b'`').ident_text("`order`"),
            Some(("order", Some(b'`')))
        );
    }
}
