//! # Token Cursor
//!
//! One-token-lookahead wrapper over [`Lexer`] shared by the statement head
//! scanner and the fragment grammar. It owns the `check_*` / `consume_*` /
//! `expect_*` helpers and keeps the span of the current token, which the
//! lexer itself forgets once it scans ahead.
//!
//! Optimizer hints (`/*+ ... */`) never reach the grammar: `advance` steps
//! over them and keeps their body and span in `hints` for the rewrite step.

use eyre::{bail, Result};

use super::lexer::Lexer;
use super::token::{Keyword, Token, Span};
use crate::config::QuoteMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HintComment<'a> {
    pub body: &'a str,
    /// Span of the whole comment, delimiters included.
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TokenCursor<'a> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    span: Span,
    hints: Vec<HintComment<'a>>,
}

impl<'a> TokenCursor<'a> {
    pub fn new(input: &'a str, start: usize, quote_mode: QuoteMode) -> Self {
        let mut cursor = Self {
            lexer: Lexer::new_at(input, start, quote_mode),
            current: Token::Eof,
            span: Span::new(start.min(input.len()), 0),
            hints: Vec::new(),
        };
        cursor.advance();
        cursor
    }

    pub fn input(&self) -> &'a str {
        self.lexer.input()
    }

    pub fn current(&self) -> Token<'a> {
        self.current
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Source text of the current token.
    pub fn text(&self) -> &'a str {
        self.span.slice(self.lexer.input()).unwrap_or("")
    }

    pub fn line(&self) -> u32 {
        self.lexer.line()
    }

    pub fn column(&self) -> u32 {
        self.lexer.column()
    }

    pub fn hints(&self) -> &[HintComment<'a>] {
        &self.hints
    }

    pub fn is_at_end(&self) -> bool {
        matches!(self.current, Token::Eof)
    }

    pub fn advance(&mut self) -> Token<'a> {
        let prev = self.current;
        loop {
            let token = self.lexer.next_token();
            let span = self.lexer.span();
            if let Token::Hint(body) = token {
                self.hints.push(HintComment { body, span });
                continue;
            }
            self.current = token;
            self.span = span;
            break;
        }
        prev
    }

    /// Token `n` positions after the current one, hints skipped.
    pub fn lookahead(&self, n: usize) -> Token<'a> {
        let mut ahead = self.lexer.clone();
        let mut token = Token::Eof;
        let mut seen = 0;
        while seen <= n {
            token = ahead.next_token();
            match token {
                Token::Hint(_) => continue,
                Token::Eof => break,
                _ => seen += 1,
            }
        }
        token
    }

    /// A lexer positioned right after the current token, for free-form scans.
    pub fn fork_lexer(&self) -> Lexer<'a> {
        self.lexer.clone()
    }

    pub fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(self.current, Token::Keyword(k) if k == keyword)
    }

    pub fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        if self.check_keyword(keyword) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_keyword(&mut self, keyword: Keyword) -> Result<()> {
        if self.check_keyword(keyword) {
            self.advance();
            Ok(())
        } else {
            bail!(
                "expected keyword {:?}, found {:?} at line {} column {}",
                keyword,
                self.current,
                self.line(),
                self.column()
            )
        }
    }

    pub fn check_token(&self, expected: &Token<'_>) -> bool {
        std::mem::discriminant(&self.current) == std::mem::discriminant(expected)
    }

    pub fn consume_token(&mut self, expected: &Token<'_>) -> bool {
        if self.check_token(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub fn expect_token(&mut self, expected: &Token<'_>) -> Result<()> {
        if self.check_token(expected) {
            self.advance();
            Ok(())
        } else {
            bail!(
                "expected {:?}, found {:?} at line {} column {}",
                expected,
                self.current,
                self.line(),
                self.column()
            )
        }
    }

    /// Consumes a balanced `( ... )` group starting at the current `(`.
    ///
    /// Calls `on_token` for every token inside the group.
    pub fn skip_group(&mut self, mut on_token: impl FnMut(&Token<'a>)) -> Result<()> {
        self.expect_token(&Token::LParen)?;
        let mut depth = 1usize;
        loop {
            match self.current {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Ok(());
                    }
                }
                Token::Eof => bail!(
                    "unbalanced parenthesis at line {} column {}",
                    self.line(),
                    self.column()
                ),
                Token::Error(msg) => bail!("{} at line {} column {}", msg, self.line(), self.column()),
                _ => {}
            }
            on_token(&self.current);
            self.advance();
        }
    }
}
