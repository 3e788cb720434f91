//! # Statement Head Scan
//!
//! Before the fragment grammar runs, the head of the statement is scanned to
//! find the routed table and the byte offset where the WHERE / VALUES part
//! begins. The scan also records every identifier the rewrite step may have to
//! replace with a shard's physical names.
//!
//! ## Recognized Heads
//!
//! ```text
//! SELECT <select list> FROM [db.]table [[AS] alias] [index hints]   -> Select
//! INSERT|REPLACE [modifiers] [INTO] [db.]table [PARTITION (...)]   -> Insert
//! UPDATE [modifiers] [db.]table [[AS] alias] SET <assignments>     -> Select
//! DELETE [modifiers] FROM [db.]table [[AS] alias]                  -> Select
//! ```
//!
//! Anything else is `RouteError::NotSupported`.
//!
//! ## Rewrite Sites
//!
//! | Site                         | Role           | Recorded when                          |
//! |------------------------------|----------------|----------------------------------------|
//! | `db` of the target           | Database       | always, if written                     |
//! | `table` of the target        | Table          | always                                 |
//! | before the table, no `db.`   | DatabasePrefix | the statement relies on the session db |
//! | `/*+ INDEX(table ...) */`    | Table          | hint names the real table              |
//! | `db.t.col`, `t.col`, `t.*`   | via matcher    | qualifiers in the select or SET list   |
//!
//! Qualified references are kept raw here; the partition-key matcher decides
//! which of them name the routed table.

use eyre::{bail, Result};
use smallvec::SmallVec;

use super::cursor::{HintComment, TokenCursor};
use super::lexer::Lexer;
use super::parser::ParseMode;
use super::token::{Keyword, Span, Token};
use crate::config::QuoteMode;
use crate::error::RouteError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Replace,
    Update,
    Delete,
}

/// An identifier as written: body text, delimiting quote and source span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ident<'a> {
    pub text: &'a str,
    pub quote: Option<u8>,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentRole {
    Database,
    Table,
    /// Zero-length site in front of an unqualified table name.
    DatabasePrefix,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentSite {
    pub span: Span,
    pub role: IdentRole,
    pub quote: Option<u8>,
}

impl IdentSite {
    pub fn database(ident: &Ident<'_>) -> Self {
        Self {
            span: ident.span,
            role: IdentRole::Database,
            quote: ident.quote,
        }
    }

    pub fn table(ident: &Ident<'_>) -> Self {
        Self {
            span: ident.span,
            role: IdentRole::Table,
            quote: ident.quote,
        }
    }
}

/// `db.table.` or `table.` prefix of a column reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifiedRef<'a> {
    pub database: Option<Ident<'a>>,
    pub table: Ident<'a>,
}

/// Where the fragment grammar starts and in which mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentStart {
    pub offset: usize,
    pub mode: ParseMode,
    /// Placeholders that appear before `offset`.
    pub placeholders_before: u32,
}

#[derive(Debug, Clone)]
pub struct StatementHead<'a> {
    pub kind: StatementKind,
    pub database: Option<Ident<'a>>,
    pub table: Ident<'a>,
    pub alias: Option<Ident<'a>>,
    pub sites: SmallVec<[IdentSite; 4]>,
    pub qualified_refs: Vec<QualifiedRef<'a>>,
    pub fragment: FragmentStart,
}

impl<'a> StatementHead<'a> {
    pub fn scan(sql: &'a str, quote_mode: QuoteMode) -> Result<Self> {
        HeadScanner::new(sql, quote_mode).scan()
    }
}

struct HeadScanner<'a> {
    cursor: TokenCursor<'a>,
    quote_mode: QuoteMode,
    placeholders: u32,
    qualified_refs: Vec<QualifiedRef<'a>>,
}

impl<'a> HeadScanner<'a> {
    fn new(sql: &'a str, quote_mode: QuoteMode) -> Self {
        Self {
            cursor: TokenCursor::new(sql, 0, quote_mode),
            quote_mode,
            placeholders: 0,
            qualified_refs: Vec::new(),
        }
    }

    fn scan(mut self) -> Result<StatementHead<'a>> {
        let kind = match self.cursor.current() {
            Token::Keyword(Keyword::Select) => StatementKind::Select,
            Token::Keyword(Keyword::Insert) => StatementKind::Insert,
            Token::Keyword(Keyword::Replace) => StatementKind::Replace,
            Token::Keyword(Keyword::Update) => StatementKind::Update,
            Token::Keyword(Keyword::Delete) => StatementKind::Delete,
            other => bail!(RouteError::not_supported(format!(
                "statement starting with {:?}",
                other
            ))),
        };
        self.cursor.advance();

        let mode = match kind {
            StatementKind::Select => {
                self.scan_select_list()?;
                ParseMode::Select
            }
            StatementKind::Insert | StatementKind::Replace => {
                self.skip_modifiers(&[Keyword::LowPriority, Keyword::HighPriority, Keyword::Delayed, Keyword::Ignore]);
                self.cursor.consume_keyword(Keyword::Into);
                ParseMode::Insert
            }
            StatementKind::Update => {
                self.skip_modifiers(&[Keyword::LowPriority, Keyword::Ignore]);
                ParseMode::Select
            }
            StatementKind::Delete => {
                self.skip_modifiers(&[Keyword::LowPriority, Keyword::Quick, Keyword::Ignore]);
                self.cursor.expect_keyword(Keyword::From)?;
                ParseMode::Select
            }
        };

        let (database, table) = self.table_name()?;
        let alias = match kind {
            StatementKind::Insert | StatementKind::Replace => {
                if self.cursor.check_keyword(Keyword::Partition) {
                    self.cursor.advance();
                    self.skip_group()?;
                }
                None
            }
            _ => {
                let alias = self.alias();
                self.skip_index_hints()?;
                alias
            }
        };

        if kind == StatementKind::Update {
            self.cursor.expect_keyword(Keyword::Set)?;
            self.scan_assignments()?;
        }

        let mut sites = SmallVec::new();
        match &database {
            Some(db) => sites.push(IdentSite::database(db)),
            None => sites.push(IdentSite {
                span: Span::new(table.span.start, 0),
                role: IdentRole::DatabasePrefix,
                quote: table.quote,
            }),
        }
        sites.push(IdentSite::table(&table));
        for hint in self.cursor.hints() {
            self.hint_table_sites(hint, table.text, &mut sites);
        }

        Ok(StatementHead {
            kind,
            database,
            table,
            alias,
            sites,
            qualified_refs: self.qualified_refs,
            fragment: FragmentStart {
                offset: self.cursor.span().start,
                mode,
                placeholders_before: self.placeholders,
            },
        })
    }

    fn skip_modifiers(&mut self, modifiers: &[Keyword]) {
        while let Token::Keyword(kw) = self.cursor.current() {
            if !modifiers.contains(&kw) {
                break;
            }
            self.cursor.advance();
        }
    }

    fn ident(&mut self) -> Option<Ident<'a>> {
        let token = self.cursor.current();
        let (text, quote) = token.ident_text(self.cursor.text())?;
        let ident = Ident {
            text,
            quote,
            span: self.cursor.span(),
        };
        self.cursor.advance();
        Some(ident)
    }

    fn table_name(&mut self) -> Result<(Option<Ident<'a>>, Ident<'a>)> {
        let Some(first) = self.ident() else {
            bail!(RouteError::not_supported(format!(
                "table reference starting with {:?} at line {} column {}",
                self.cursor.current(),
                self.cursor.line(),
                self.cursor.column()
            )));
        };
        if !self.cursor.consume_token(&Token::Dot) {
            return Ok((None, first));
        }
        match self.ident() {
            Some(second) => Ok((Some(first), second)),
            None => bail!(
                "expected table name after '.', found {:?} at line {} column {}",
                self.cursor.current(),
                self.cursor.line(),
                self.cursor.column()
            ),
        }
    }

    fn alias(&mut self) -> Option<Ident<'a>> {
        if self.cursor.consume_keyword(Keyword::As) {
            return self.ident();
        }
        match self.cursor.current() {
            Token::Ident(_) | Token::QuotedIdent(..) => self.ident(),
            _ => None,
        }
    }

    /// `USE|FORCE|IGNORE INDEX|KEY [FOR ...] (...)`, repeated.
    fn skip_index_hints(&mut self) -> Result<()> {
        loop {
            let is_hint = matches!(
                self.cursor.current(),
                Token::Keyword(Keyword::Use | Keyword::Force | Keyword::Ignore)
            ) && matches!(
                self.cursor.lookahead(0),
                Token::Keyword(Keyword::Index | Keyword::Key)
            );
            if !is_hint {
                return Ok(());
            }
            self.cursor.advance();
            self.cursor.advance();
            if self.cursor.consume_keyword(Keyword::For) {
                while !matches!(self.cursor.current(), Token::LParen | Token::Eof) {
                    self.cursor.advance();
                }
            }
            self.skip_group()?;
        }
    }

    fn skip_group(&mut self) -> Result<()> {
        let mut placeholders = 0;
        self.cursor.skip_group(|token| {
            if matches!(token, Token::Parameter(_)) {
                placeholders += 1;
            }
        })?;
        self.placeholders += placeholders;
        Ok(())
    }

    /// Select list up to the `FROM` at nesting depth zero.
    fn scan_select_list(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.cursor.current() {
                Token::Keyword(Keyword::From) if depth == 0 => {
                    self.cursor.advance();
                    return Ok(());
                }
                Token::Eof | Token::Semicolon => bail!(RouteError::not_supported("SELECT without FROM")),
                Token::Error(msg) => bail!(
                    "{} at line {} column {}",
                    msg,
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.step_collecting_refs();
        }
    }

    /// `SET` list of an UPDATE, up to the WHERE clause or the end of the statement.
    fn scan_assignments(&mut self) -> Result<()> {
        let mut depth = 0usize;
        loop {
            match self.cursor.current() {
                Token::Keyword(Keyword::Where) if depth == 0 => return Ok(()),
                Token::Keyword(kw) if depth == 0 && kw.ends_fragment() => return Ok(()),
                Token::Eof | Token::Semicolon => return Ok(()),
                Token::Error(msg) => bail!(
                    "{} at line {} column {}",
                    msg,
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.step_collecting_refs();
        }
    }

    /// Advances one token, or over a whole dotted chain starting at it.
    fn step_collecting_refs(&mut self) {
        let token = self.cursor.current();
        if matches!(token, Token::Parameter(_)) {
            self.placeholders += 1;
        }
        let chainable = matches!(token, Token::Ident(_) | Token::QuotedIdent(..))
            && matches!(self.cursor.lookahead(0), Token::Dot);
        if !chainable {
            self.cursor.advance();
            return;
        }

        let mut parts: SmallVec<[Ident<'a>; 3]> = SmallVec::new();
        while let Some(part) = self.ident() {
            parts.push(part);
            if !self.cursor.check_token(&Token::Dot) {
                break;
            }
            self.cursor.advance();
            if self.cursor.consume_token(&Token::Star) {
                parts.push(Ident {
                    text: "*",
                    quote: None,
                    span: self.cursor.span(),
                });
                break;
            }
        }
        if let Some(reference) = qualified_ref(&parts) {
            self.qualified_refs.push(reference);
        }
    }

    /// Table names inside `INDEX(...)`-style optimizer hints.
    fn hint_table_sites(&self, hint: &HintComment<'a>, table: &str, sites: &mut SmallVec<[IdentSite; 4]>) {
        let input = self.cursor.input();
        let body_start = hint.span.start + 3;
        let body_end = body_start + hint.body.len();
        let mut lexer = Lexer::new_at(input, body_start, self.quote_mode);
        let mut previous_was_index = false;
        loop {
            let token = lexer.next_token();
            let span = lexer.span();
            if matches!(token, Token::Eof | Token::Error(_)) || span.start >= body_end {
                return;
            }
            match token {
                Token::LParen if previous_was_index => {
                    let token = lexer.next_token();
                    let span = lexer.span();
                    let text = span.slice(input).unwrap_or("");
                    if let Some((name, quote)) = token.ident_text(text) {
                        if name.eq_ignore_ascii_case(table) && span.end() <= body_end {
                            sites.push(IdentSite {
                                span,
                                role: IdentRole::Table,
                                quote,
                            });
                        }
                    }
                    previous_was_index = false;
                }
                Token::Keyword(Keyword::Index) => previous_was_index = true,
                Token::Ident(name) => {
                    previous_was_index = name.to_ascii_uppercase().ends_with("INDEX")
                }
                _ => previous_was_index = false,
            }
        }
    }
}

/// Qualifier part of a dotted chain (`a.b` or `a.b.c`).
pub(crate) fn qualified_ref<'a>(parts: &[Ident<'a>]) -> Option<QualifiedRef<'a>> {
    match parts {
        [table, _] => Some(QualifiedRef {
            database: None,
            table: *table,
        }),
        [database, table, _] => Some(QualifiedRef {
            database: Some(*database),
            table: *table,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn scan(sql: &str) -> StatementHead<'_> {
        StatementHead::scan(sql, QuoteMode::Mysql).unwrap()
    }

    #[test]
    fn test_select_head() {
        let sql = "SELECT * FROM shop.orders o WHERE o.id = 1";
        let head = scan(sql);
        assert_eq!(head.kind, StatementKind::Select);
        assert_eq!(head.database.unwrap().text, "shop");
        assert_eq!(head.table.text, "orders");
        assert_eq!(head.alias.unwrap().text, "o");
        assert_eq!(&sql[head.fragment.offset..], "WHERE o.id = 1");
        assert_eq!(head.fragment.mode, ParseMode::Select);
        assert_eq!(head.sites.len(), 2);
        assert_eq!(head.sites[0].span.slice(sql), Some("shop"));
        assert_eq!(head.sites[1].span.slice(sql), Some("orders"));
    }

    #[test]
    fn test_unqualified_table_gets_prefix_site() {
        let sql = "SELECT a FROM `orders` WHERE id = 1";
        let head = scan(sql);
        assert!(head.database.is_none());
        assert_eq!(head.sites[0].role, IdentRole::DatabasePrefix);
        assert_eq!(head.sites[0].span, Span::new(14, 0));
        assert_eq!(head.sites[1].quote, Some(b'`'));
        assert_eq!(head.sites[1].span.slice(sql), Some("`orders`"));
    }

    #[test]
    fn test_from_inside_subquery_is_skipped() {
        let sql = "SELECT (SELECT max(x) FROM other), ? FROM t WHERE id = ?";
        let head = scan(sql);
        assert_eq!(head.table.text, "t");
        assert_eq!(head.fragment.placeholders_before, 1);
    }

    #[test]
    fn test_select_list_qualifiers_are_collected() {
        let sql = "SELECT shop.t.a, t.b, t.* FROM shop.t WHERE 1";
        let head = scan(sql);
        assert_eq!(head.qualified_refs.len(), 3);
        assert_eq!(head.qualified_refs[0].database.unwrap().text, "shop");
        assert_eq!(head.qualified_refs[1].table.text, "t");
        assert!(head.qualified_refs[2].database.is_none());
    }

    #[test]
    fn test_insert_head() {
        let sql = "INSERT IGNORE INTO shop.t PARTITION (p0) (id, v) VALUES (1, 2)";
        let head = scan(sql);
        assert_eq!(head.kind, StatementKind::Insert);
        assert_eq!(head.fragment.mode, ParseMode::Insert);
        assert_eq!(&sql[head.fragment.offset..], "(id, v) VALUES (1, 2)");
        assert!(head.alias.is_none());
    }

    #[test]
    fn test_replace_without_into() {
        let head = scan("REPLACE t VALUES (1)");
        assert_eq!(head.kind, StatementKind::Replace);
        assert_eq!(head.table.text, "t");
    }

    #[test]
    fn test_update_head_skips_set_list() {
        let sql = "UPDATE LOW_PRIORITY t AS x SET x.v = ?, w = 2 WHERE id = 5";
        let head = scan(sql);
        assert_eq!(head.kind, StatementKind::Update);
        assert_eq!(head.alias.unwrap().text, "x");
        assert_eq!(&sql[head.fragment.offset..], "WHERE id = 5");
        assert_eq!(head.fragment.placeholders_before, 1);
        assert_eq!(head.qualified_refs.len(), 1);
    }

    #[test]
    fn test_delete_head() {
        let sql = "DELETE QUICK FROM t WHERE id = 5 LIMIT 1";
        let head = scan(sql);
        assert_eq!(head.kind, StatementKind::Delete);
        assert_eq!(&sql[head.fragment.offset..], "WHERE id = 5 LIMIT 1");
    }

    #[test]
    fn test_index_hints_are_skipped() {
        let sql = "SELECT * FROM t FORCE INDEX (idx_a) USE KEY FOR JOIN (idx_b) WHERE id = 1";
        let head = scan(sql);
        assert!(head.alias.is_none());
        assert_eq!(&sql[head.fragment.offset..], "WHERE id = 1");
    }

    #[test]
    fn test_optimizer_hint_table_site() {
        let sql = "SELECT /*+ INDEX(orders idx_id) */ * FROM orders WHERE id = 1";
        let head = scan(sql);
        let hint_site = head
            .sites
            .iter()
            .find(|site| site.span.start < 30 && site.role == IdentRole::Table)
            .unwrap();
        assert_eq!(hint_site.span.slice(sql), Some("orders"));
        assert_eq!(head.sites.len(), 3);
    }

    #[test]
    fn test_unsupported_statements() {
        let err = StatementHead::scan("SHOW TABLES", QuoteMode::Mysql).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::NotSupported));
        let err = StatementHead::scan("SELECT 1", QuoteMode::Mysql).unwrap_err();
        assert_eq!(RouteError::kind_of(&err), Some(ErrorKind::NotSupported));
    }

    #[test]
    fn test_ansi_quoted_table() {
        let sql = "SELECT * FROM \"shop\".\"t\" WHERE id = 1";
        let head = StatementHead::scan(sql, QuoteMode::Ansi).unwrap();
        assert_eq!(head.database.unwrap().quote, Some(b'"'));
        assert_eq!(head.table.text, "t");
    }
}
