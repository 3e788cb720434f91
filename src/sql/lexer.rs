//! # Fragment Lexer - Zero-Copy Tokenizer
//!
//! Tokenizer for the parts of a MySQL statement the router inspects: the
//! statement head (to find the target table) and the WHERE / VALUES / SET
//! fragment (to find partition-key predicates). Identifiers and literals are
//! borrowed slices of the input; only string literals that contain escapes
//! are copied, and only when the parser asks for their value.
//!
//! ## Token Types
//!
//! - **Keywords**: the small routing vocabulary (WHERE, IN, BETWEEN, JOIN, ...)
//! - **Identifiers**: unquoted, back-quoted, or double-quoted in ANSI mode
//! - **Literals**: integers (checked `i64`), decimals, strings, hex (`0x1F`, `X'1F'`)
//! - **Parameters**: anonymous (`?`) and positional (`:1`, `$1`)
//! - **Variables**: `@user_var`, `@@system_var`
//! - **Hints**: `/*+ ... */` surfaced as a token; other comments are skipped
//!
//! ## Keyword Lookup
//!
//! Keywords are matched through a compile-time perfect hash map (phf). The
//! lookup key is upper-cased into a stack buffer, so keyword matching does not
//! allocate. Words longer than the longest keyword skip the lookup.
//!
//! ## Quote Modes
//!
//! | Quote   | `QuoteMode::Mysql` | `QuoteMode::Ansi` |
//! |---------|--------------------|-------------------|
//! | `` ` `` | identifier         | identifier        |
//! | `"`     | string             | identifier        |
//! | `'`     | string             | string            |
//!
//! ## Integer Literals
//!
//! Digits accumulate into an `i64` with checked arithmetic. A literal that does
//! not fit produces `Token::IntegerOverflow` carrying its digits, which the
//! parser reports as a typed overflow error instead of wrapping.
//!
//! ## Spans
//!
//! Spans are absolute byte offsets into the full statement, also when lexing
//! starts in the middle of it (`Lexer::new_at`), so rewrite offsets recorded
//! by the parser index the caller's buffer directly.

use bumpalo::Bump;
use phf::phf_map;

use super::token::{Keyword, Parameter, Span, Token};
use crate::config::QuoteMode;

static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "WHERE" => Keyword::Where,
    "AS" => Keyword::As,
    "VALUES" => Keyword::Values,
    "VALUE" => Keyword::Value,
    "SET" => Keyword::Set,
    "ON" => Keyword::On,
    "USING" => Keyword::Using,
    "JOIN" => Keyword::Join,
    "STRAIGHT_JOIN" => Keyword::StraightJoin,
    "LEFT" => Keyword::Left,
    "RIGHT" => Keyword::Right,
    "INNER" => Keyword::Inner,
    "OUTER" => Keyword::Outer,
    "CROSS" => Keyword::Cross,
    "NATURAL" => Keyword::Natural,
    "AND" => Keyword::And,
    "OR" => Keyword::Or,
    "XOR" => Keyword::Xor,
    "NOT" => Keyword::Not,
    "IN" => Keyword::In,
    "BETWEEN" => Keyword::Between,
    "IS" => Keyword::Is,
    "NULL" => Keyword::Null,
    "TRUE" => Keyword::True,
    "FALSE" => Keyword::False,
    "UNKNOWN" => Keyword::Unknown,
    "LIKE" => Keyword::Like,
    "REGEXP" => Keyword::Regexp,
    "RLIKE" => Keyword::Rlike,
    "ESCAPE" => Keyword::Escape,
    "DIV" => Keyword::Div,
    "MOD" => Keyword::Mod,
    "INTERVAL" => Keyword::Interval,
    "COLLATE" => Keyword::Collate,
    "BINARY" => Keyword::Binary,
    "GROUP" => Keyword::Group,
    "ORDER" => Keyword::Order,
    "LIMIT" => Keyword::Limit,
    "HAVING" => Keyword::Having,
    "UNION" => Keyword::Union,
    "FOR" => Keyword::For,
    "LOCK" => Keyword::Lock,
    "WINDOW" => Keyword::Window,
    "INTO" => Keyword::Into,
    "RETURNING" => Keyword::Returning,
    "SELECT" => Keyword::Select,
    "INSERT" => Keyword::Insert,
    "REPLACE" => Keyword::Replace,
    "UPDATE" => Keyword::Update,
    "DELETE" => Keyword::Delete,
    "FROM" => Keyword::From,
    "IGNORE" => Keyword::Ignore,
    "LOW_PRIORITY" => Keyword::LowPriority,
    "HIGH_PRIORITY" => Keyword::HighPriority,
    "DELAYED" => Keyword::Delayed,
    "QUICK" => Keyword::Quick,
    "DISTINCT" => Keyword::Distinct,
    "USE" => Keyword::Use,
    "FORCE" => Keyword::Force,
    "INDEX" => Keyword::Index,
    "KEY" => Keyword::Key,
    "PARTITION" => Keyword::Partition,
    "DUPLICATE" => Keyword::Duplicate,
    "CURRENT_TIMESTAMP" => Keyword::CurrentTimestamp,
    "CURRENT_DATE" => Keyword::CurrentDate,
    "CURRENT_TIME" => Keyword::CurrentTime,
    "CURRENT_USER" => Keyword::CurrentUser,
    "LOCALTIME" => Keyword::Localtime,
    "LOCALTIMESTAMP" => Keyword::Localtimestamp,
    "UTC_TIMESTAMP" => Keyword::UtcTimestamp,
    "UTC_DATE" => Keyword::UtcDate,
    "UTC_TIME" => Keyword::UtcTime,
    "SYSDATE" => Keyword::Sysdate,
};

const MAX_KEYWORD_LEN: usize = 17;

fn lookup_keyword(word: &str) -> Option<Keyword> {
    if word.len() > MAX_KEYWORD_LEN {
        return None;
    }
    let mut buf = [0u8; MAX_KEYWORD_LEN];
    let upper = &mut buf[..word.len()];
    upper.copy_from_slice(word.as_bytes());
    upper.make_ascii_uppercase();
    std::str::from_utf8(upper)
        .ok()
        .and_then(|key| KEYWORDS.get(key).copied())
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    input: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    token_start: usize,
    quote_mode: QuoteMode,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, quote_mode: QuoteMode) -> Self {
        Self {
            input,
            bytes: input.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            token_start: 0,
            quote_mode,
        }
    }

    /// Starts scanning at byte `start`; spans stay relative to the whole input.
    pub fn new_at(input: &'a str, start: usize, quote_mode: QuoteMode) -> Self {
        let mut lexer = Self::new(input, quote_mode);
        let start = start.min(input.len());
        for &b in &lexer.bytes[..start] {
            if b == b'\n' {
                lexer.line += 1;
                lexer.column = 1;
            } else {
                lexer.column += 1;
            }
        }
        lexer.pos = start;
        lexer.token_start = start;
        lexer
    }

    pub fn input(&self) -> &'a str {
        self.input
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn column(&self) -> u32 {
        self.column
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Span of the most recently scanned token.
    pub fn span(&self) -> Span {
        Span::new(self.token_start, self.pos - self.token_start)
    }

    pub fn next_token(&mut self) -> Token<'a> {
        if let Some(err) = self.skip_trivia() {
            return Token::Error(err);
        }
        self.token_start = self.pos;

        if self.is_eof() {
            return Token::Eof;
        }

        let ch = self.current();

        if (ch == b'x' || ch == b'X') && self.peek_char() == Some(b'\'') {
            return self.scan_hex_string_literal();
        }

        if ch.is_ascii_alphabetic() || ch == b'_' || ch >= 0x80 {
            return self.scan_identifier_or_keyword();
        }

        if ch.is_ascii_digit() {
            return self.scan_number();
        }

        match ch {
            b'\'' => self.scan_string(b'\''),
            b'"' if self.quote_mode.double_quote_is_identifier() => {
                self.scan_quoted_identifier(b'"')
            }
            b'"' => self.scan_string(b'"'),
            b'`' => self.scan_quoted_identifier(b'`'),
            b'?' => {
                self.advance();
                Token::Parameter(Parameter::Anonymous)
            }
            b':' => self.scan_colon(),
            b'$' => self.scan_dollar_param(),
            b'@' => self.scan_variable(),
            b'/' => self.scan_slash(),
            b'+' => {
                self.advance();
                Token::Plus
            }
            b'-' => {
                self.advance();
                Token::Minus
            }
            b'*' => {
                self.advance();
                Token::Star
            }
            b'%' => {
                self.advance();
                Token::Percent
            }
            b'^' => {
                self.advance();
                Token::Caret
            }
            b'~' => {
                self.advance();
                Token::Tilde
            }
            b'&' => self.scan_doubled(Token::Ampersand, Token::DoubleAmpersand),
            b'|' => self.scan_doubled(Token::Pipe, Token::DoublePipe),
            b'=' => {
                self.advance();
                Token::Eq
            }
            b'<' => self.scan_less_than(),
            b'>' => self.scan_greater_than(),
            b'!' => self.scan_exclamation(),
            b'(' => {
                self.advance();
                Token::LParen
            }
            b')' => {
                self.advance();
                Token::RParen
            }
            b',' => {
                self.advance();
                Token::Comma
            }
            b';' => {
                self.advance();
                Token::Semicolon
            }
            b'.' => self.scan_dot(),
            _ => {
                self.advance();
                Token::Error("unexpected character")
            }
        }
    }

    pub fn peek(&mut self) -> Token<'a> {
        self.clone().next_token()
    }

    pub fn peek_nth(&mut self, n: usize) -> Token<'a> {
        let mut ahead = self.clone();
        let mut token = Token::Eof;
        for _ in 0..=n {
            token = ahead.next_token();
            if matches!(token, Token::Eof) {
                break;
            }
        }
        token
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn current(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) {
        if !self.is_eof() {
            if self.current() == b'\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.pos += 1;
        }
    }

    /// Skips whitespace and comments. Hint comments are left in place.
    fn skip_trivia(&mut self) -> Option<&'static str> {
        loop {
            while !self.is_eof() && self.current().is_ascii_whitespace() {
                self.advance();
            }
            if self.is_eof() {
                return None;
            }
            match (self.current(), self.peek_char()) {
                (b'#', _) => self.skip_line(),
                (b'-', Some(b'-')) => {
                    let after = self.bytes.get(self.pos + 2).copied();
                    if after.is_none() || after.is_some_and(|b| b.is_ascii_whitespace()) {
                        self.skip_line();
                    } else {
                        return None;
                    }
                }
                (b'/', Some(b'*')) => {
                    if self.bytes.get(self.pos + 2) == Some(&b'+') {
                        return None;
                    }
                    self.advance();
                    self.advance();
                    if !self.skip_block_comment() {
                        return Some("unterminated block comment");
                    }
                }
                _ => return None,
            }
        }
    }

    fn skip_line(&mut self) {
        while !self.is_eof() && self.current() != b'\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> bool {
        while !self.is_eof() {
            if self.current() == b'*' && self.peek_char() == Some(b'/') {
                self.advance();
                self.advance();
                return true;
            }
            self.advance();
        }
        false
    }

    fn scan_identifier_or_keyword(&mut self) -> Token<'a> {
        let start = self.pos;
        while !self.is_eof() && is_ident_byte(self.current()) {
            self.advance();
        }
        let ident = &self.input[start..self.pos];
        match lookup_keyword(ident) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(ident),
        }
    }

    fn scan_hex_string_literal(&mut self) -> Token<'a> {
        self.advance();
        self.advance();
        let start = self.pos;

        while !self.is_eof() && self.current() != b'\'' {
            if !self.current().is_ascii_hexdigit() {
                return Token::Error("invalid hex character in hex string literal");
            }
            self.advance();
        }

        if self.is_eof() {
            return Token::Error("unterminated hex string literal");
        }

        let hex_str = &self.input[start..self.pos];
        self.advance();
        Token::HexNumber(hex_str)
    }

    fn scan_number(&mut self) -> Token<'a> {
        let start = self.pos;

        if self.current() == b'0' {
            match self.peek_char() {
                Some(b'x') | Some(b'X') => return self.scan_hex_number(),
                Some(b'b') | Some(b'B') => return self.scan_bit_number(),
                _ => {}
            }
        }

        let mut value: Option<i64> = Some(0);
        while !self.is_eof() && self.current().is_ascii_digit() {
            let digit = (self.current() - b'0') as i64;
            value = value
                .and_then(|v| v.checked_mul(10))
                .and_then(|v| v.checked_add(digit));
            self.advance();
        }

        let mut is_decimal = false;

        if !self.is_eof() && self.current() == b'.' {
            is_decimal = true;
            self.advance();
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
        }

        if !self.is_eof() && (self.current() == b'e' || self.current() == b'E') {
            let exponent_follows = match self.peek_char() {
                Some(b'+') | Some(b'-') => self
                    .bytes
                    .get(self.pos + 2)
                    .is_some_and(|b| b.is_ascii_digit()),
                Some(b) => b.is_ascii_digit(),
                None => false,
            };
            if exponent_follows {
                is_decimal = true;
                self.advance();
                if self.current() == b'+' || self.current() == b'-' {
                    self.advance();
                }
                while !self.is_eof() && self.current().is_ascii_digit() {
                    self.advance();
                }
            }
        }

        let text = &self.input[start..self.pos];
        if is_decimal {
            return Token::Number(text);
        }
        match value {
            Some(v) => Token::Integer(v),
            None => Token::IntegerOverflow(text),
        }
    }

    fn scan_hex_number(&mut self) -> Token<'a> {
        self.advance();
        self.advance();
        let start = self.pos;

        while !self.is_eof() && self.current().is_ascii_hexdigit() {
            self.advance();
        }

        if self.pos == start {
            return Token::Error("invalid hex number");
        }

        Token::HexNumber(&self.input[start..self.pos])
    }

    fn scan_bit_number(&mut self) -> Token<'a> {
        let start = self.pos;
        self.advance();
        self.advance();
        let digits = self.pos;

        while !self.is_eof() && (self.current() == b'0' || self.current() == b'1') {
            self.advance();
        }

        if self.pos == digits {
            return Token::Error("invalid bit literal");
        }

        Token::Number(&self.input[start..self.pos])
    }

    fn scan_string(&mut self, quote: u8) -> Token<'a> {
        self.advance();
        let start = self.pos;
        let mut escaped = false;

        loop {
            if self.is_eof() {
                return Token::Error("unterminated string");
            }

            let ch = self.current();
            if ch == b'\\' && self.quote_mode.backslash_escapes() {
                escaped = true;
                self.advance();
                self.advance();
            } else if ch == quote {
                if self.peek_char() == Some(quote) {
                    escaped = true;
                    self.advance();
                    self.advance();
                } else {
                    let end = self.pos;
                    self.advance();
                    return Token::String {
                        raw: &self.input[start..end],
                        escaped,
                    };
                }
            } else {
                self.advance();
            }
        }
    }

    fn scan_quoted_identifier(&mut self, quote: u8) -> Token<'a> {
        self.advance();
        let start = self.pos;

        loop {
            if self.is_eof() {
                return Token::Error("unterminated quoted identifier");
            }

            if self.current() == quote {
                if self.peek_char() == Some(quote) {
                    self.advance();
                    self.advance();
                } else {
                    let end = self.pos;
                    self.advance();
                    return Token::QuotedIdent(&self.input[start..end], quote);
                }
            } else {
                self.advance();
            }
        }
    }

    fn scan_positional(&mut self) -> Token<'a> {
        let start = self.pos;
        while !self.is_eof() && self.current().is_ascii_digit() {
            self.advance();
        }
        match self.input[start..self.pos].parse::<u32>() {
            Ok(n) => Token::Parameter(Parameter::Positional(n)),
            Err(_) => Token::Error("invalid positional parameter"),
        }
    }

    fn scan_colon(&mut self) -> Token<'a> {
        self.advance();
        match self.bytes.get(self.pos).copied() {
            Some(b'=') => {
                self.advance();
                Token::Assign
            }
            Some(b) if b.is_ascii_digit() => self.scan_positional(),
            _ => Token::Error("expected parameter number after ':'"),
        }
    }

    fn scan_dollar_param(&mut self) -> Token<'a> {
        self.advance();
        match self.bytes.get(self.pos).copied() {
            Some(b) if b.is_ascii_digit() => self.scan_positional(),
            _ => Token::Error("expected parameter number after '$'"),
        }
    }

    fn scan_variable(&mut self) -> Token<'a> {
        let start = self.pos;
        self.advance();
        if !self.is_eof() && self.current() == b'@' {
            self.advance();
        }
        if !self.is_eof() && matches!(self.current(), b'\'' | b'"' | b'`') {
            let quote = self.current();
            self.advance();
            while !self.is_eof() && self.current() != quote {
                self.advance();
            }
            if self.is_eof() {
                return Token::Error("unterminated quoted variable");
            }
            self.advance();
        } else {
            while !self.is_eof() && (is_ident_byte(self.current()) || self.current() == b'.') {
                self.advance();
            }
        }
        if self.pos - start <= 1 {
            return Token::Error("invalid variable name");
        }
        Token::Variable(&self.input[start..self.pos])
    }

    fn scan_slash(&mut self) -> Token<'a> {
        if self.peek_char() == Some(b'*') {
            // only hints reach here, plain comments are trivia
            self.advance();
            self.advance();
            self.advance();
            let start = self.pos;
            while !self.is_eof() {
                if self.current() == b'*' && self.peek_char() == Some(b'/') {
                    let end = self.pos;
                    self.advance();
                    self.advance();
                    return Token::Hint(&self.input[start..end]);
                }
                self.advance();
            }
            return Token::Error("unterminated hint comment");
        }
        self.advance();
        Token::Slash
    }

    fn scan_doubled(&mut self, single: Token<'a>, double: Token<'a>) -> Token<'a> {
        let ch = self.current();
        self.advance();
        if !self.is_eof() && self.current() == ch {
            self.advance();
            double
        } else {
            single
        }
    }

    fn scan_less_than(&mut self) -> Token<'a> {
        self.advance();

        if self.is_eof() {
            return Token::Lt;
        }

        match self.current() {
            b'=' => {
                self.advance();
                if !self.is_eof() && self.current() == b'>' {
                    self.advance();
                    Token::NullSafeEq
                } else {
                    Token::LtEq
                }
            }
            b'>' => {
                self.advance();
                Token::NotEq
            }
            b'<' => {
                self.advance();
                Token::LeftShift
            }
            _ => Token::Lt,
        }
    }

    fn scan_greater_than(&mut self) -> Token<'a> {
        self.advance();

        if self.is_eof() {
            return Token::Gt;
        }

        match self.current() {
            b'=' => {
                self.advance();
                Token::GtEq
            }
            b'>' => {
                self.advance();
                Token::RightShift
            }
            _ => Token::Gt,
        }
    }

    fn scan_exclamation(&mut self) -> Token<'a> {
        self.advance();

        if !self.is_eof() && self.current() == b'=' {
            self.advance();
            Token::NotEq
        } else {
            Token::Exclamation
        }
    }

    fn scan_dot(&mut self) -> Token<'a> {
        let start = self.pos;
        self.advance();

        let follows_word = start > 0 && is_ident_byte(self.bytes[start - 1]);
        if !follows_word && !self.is_eof() && self.current().is_ascii_digit() {
            while !self.is_eof() && self.current().is_ascii_digit() {
                self.advance();
            }
            return Token::Number(&self.input[start..self.pos]);
        }

        Token::Dot
    }
}

/// Resolves backslash escapes (MySQL mode only) and doubled quotes of a
/// string literal body.
///
/// Bodies without escapes are returned as-is; the rest are copied into `arena`.
pub fn unescape_string<'a>(raw: &'a str, escaped: bool, mode: QuoteMode, arena: &'a Bump) -> &'a str {
    if !escaped {
        return raw;
    }

    let mut out = bumpalo::collections::String::with_capacity_in(raw.len(), arena);
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if mode.backslash_escapes() => match chars.next() {
                Some('0') => out.push('\0'),
                Some('b') => out.push('\u{8}'),
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some('Z') => out.push('\u{1a}'),
                Some(c @ ('%' | '_')) => {
                    out.push('\\');
                    out.push(c);
                }
                Some(c) => out.push(c),
                None => out.push('\\'),
            },
            '\'' | '"' if chars.peek() == Some(&ch) => {
                chars.next();
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out.into_bump_str()
}
