//! # Fragment Grammar
//!
//! Recursive descent parser over the routed part of a statement: the WHERE
//! clause (with any JOIN ... ON conditions in front of it) for SELECT, UPDATE
//! and DELETE, and the column list plus VALUES / SET part for INSERT and
//! REPLACE. It does not build an AST. It reduces predicates straight into
//! [`RelationExpr`]s in the request's [`ParseArena`].
//!
//! ## Entry Points
//!
//! ```text
//! ParseMode::Select -> select_root
//!   select_root := join* [WHERE cond] end
//!   join        := [modifiers] JOIN table_factor [ON cond | USING (...)]
//!                | ',' table_factor
//!
//! ParseMode::Insert -> insert_root
//!   insert_root := ['(' col, ... ')'] (VALUES | VALUE) tuple (',' tuple)*
//!                      [AS alias] [ON DUPLICATE KEY UPDATE ...] end
//!                | SET col = expr (',' col = expr)* [ON DUPLICATE ...] end
//!                | ['(' col, ... ')'] SELECT ...
//!                | select_root
//!
//! cond      := term ((AND | && | OR | || | XOR) term)*
//! term      := NOT term | '(' cond ')' | predicate
//! predicate := expr comp expr
//!            | expr [NOT] IN '(' expr, ... ')'
//!            | expr [NOT] BETWEEN expr AND expr
//!            | expr IS [NOT] (NULL | TRUE | FALSE | UNKNOWN)
//!            | expr [NOT] (LIKE | REGEXP | RLIKE) expr [ESCAPE expr]
//!            | expr
//! end       := EOF | ';' | ')' | GROUP | ORDER | LIMIT | HAVING | ...
//! ```
//!
//! `(` at the start of a term is a grouped condition unless the token after
//! the matching `)` continues an expression; that is decided by scanning a
//! cloned lexer, without consuming input.
//!
//! ## Relation Normalization
//!
//! | Source                 | Relations                                  |
//! |------------------------|--------------------------------------------|
//! | `col = 5`              | `col = 5`                                  |
//! | `5 > col`              | `col < 5`                                  |
//! | `col <> 5`, `col != 5` | none                                       |
//! | `col BETWEEN a AND b`  | `col >= a`, `col <= b`                     |
//! | `col IN (a, b)`        | `col = a`, `col = b` (one predicate id)    |
//! | `VALUES (..), (..)`    | one `key = v` per row (one predicate id)   |
//!
//! Relations sharing a predicate id are alternatives; distinct ids are
//! conjuncts. Relations under NOT are kept but flagged `negated`.
//!
//! ## Failure Handling
//!
//! | Failure            | Result                                             |
//! |--------------------|----------------------------------------------------|
//! | syntax error       | recorded as `SyntaxIssue`, parse stops, `Accepted` |
//! | arena exhausted    | parse stops, `Aborted(AllocationFailure)`          |
//! | integer overflow   | `Err(RouteError::Overflow)`                        |
//! | nesting too deep   | recorded as `SyntaxIssue`, parse stops, `Accepted` |
//!
//! In the first two cases every relation pushed before the failure stays in
//! the result.

use bumpalo::Bump;
use eyre::{bail, Result};
use smallvec::{smallvec, SmallVec};
use tracing::warn;

use super::arena::ParseArena;
use super::cursor::TokenCursor;
use super::lexer::unescape_string;
use super::matcher::PartKeyMatcher;
use super::relation::{
    ArithOp, ColumnRef, CompareOp, ListId, PartLevel, Placeholder, RelationExpr, RelationId,
    TokenKind,
};
use super::statement::{qualified_ref, FragmentStart, Ident, IdentSite, StatementHead};
use super::token::{Keyword, Parameter, Span, Token};
use crate::config::{QuoteMode, RouterConfig, MAX_NESTING_DEPTH};
use crate::error::{ErrorKind, RouteError};
use crate::memory::ParseMetrics;

/// Grammar entry symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Select,
    Insert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    AllocationFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    Accepted,
    Aborted(AbortReason),
}

#[derive(Debug, Clone)]
pub struct SyntaxIssue<'a> {
    pub message: &'a str,
    pub span: Span,
    pub line: u32,
    pub column: u32,
}

/// One `( ... )` tuple of an INSERT / REPLACE `VALUES` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRow {
    /// From the opening to the closing parenthesis, both included.
    pub span: Span,
    /// Index of the first anonymous placeholder inside the tuple.
    pub first_param: u32,
    pub param_count: u32,
}

#[derive(Debug)]
pub struct ExprParseResult<'a> {
    pub arena: ParseArena<'a>,
    /// Relations on a partition key that may narrow the route.
    pub relations: Vec<RelationId>,
    /// Every column-vs-something relation, in source order.
    pub all_relations: Vec<RelationId>,
    pub placeholder_count: u32,
    /// A `:n` / `$n` placeholder was seen; parameters are not bound by position.
    pub positional_params: bool,
    pub batch_values_count: u32,
    /// Tuples of a `VALUES` list, in source order; row `n` owns the relations
    /// with ordinal `n`.
    pub value_rows: Vec<ValueRow>,
    pub has_disjunction: bool,
    /// Relations were dropped after reaching `max_relations`.
    pub truncated: bool,
    pub status: ParseStatus,
    pub syntax_issues: Vec<SyntaxIssue<'a>>,
    pub qualifier_sites: Vec<IdentSite>,
    pub keys_seen: SmallVec<[bool; 8]>,
}

impl<'a> ExprParseResult<'a> {
    pub fn relation(&self, id: RelationId) -> &RelationExpr {
        self.arena.relation(id)
    }

    pub fn routable(&self) -> impl Iterator<Item = &RelationExpr> + '_ {
        self.relations.iter().map(|&id| self.arena.relation(id))
    }

    pub fn all(&self) -> impl Iterator<Item = &RelationExpr> + '_ {
        self.all_relations.iter().map(|&id| self.arena.relation(id))
    }

    /// Column on the left of a relation, when it is a lone column reference.
    pub fn column_of(&self, relation: &RelationExpr) -> Option<&ColumnRef<'a>> {
        match &self.arena.single_token(relation.left)?.kind {
            TokenKind::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Right side of a relation, when it is a single token.
    pub fn value_of(&self, relation: &RelationExpr) -> Option<&TokenKind<'a>> {
        self.arena.single_token(relation.right).map(|node| &node.kind)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, ParseStatus::Aborted(_))
    }
}

pub struct ExprParser<'a> {
    cursor: TokenCursor<'a>,
    quote_mode: QuoteMode,
    bump: &'a Bump,
    arena: ParseArena<'a>,
    matcher: PartKeyMatcher<'a>,
    mode: ParseMode,
    max_relations: usize,
    relations: Vec<RelationId>,
    all_relations: Vec<RelationId>,
    placeholder_count: u32,
    positional_params: bool,
    batch_values_count: u32,
    value_rows: Vec<ValueRow>,
    has_disjunction: bool,
    truncated: bool,
    negation: u32,
    depth: usize,
    next_predicate: u32,
    errors: Vec<SyntaxIssue<'a>>,
    qualifier_sites: Vec<IdentSite>,
}

fn compare_op(token: &Token<'_>) -> Option<CompareOp> {
    match token {
        Token::Eq => Some(CompareOp::Eq),
        Token::NullSafeEq => Some(CompareOp::NullSafeEq),
        Token::NotEq => Some(CompareOp::Ne),
        Token::Lt => Some(CompareOp::Lt),
        Token::LtEq => Some(CompareOp::Le),
        Token::Gt => Some(CompareOp::Gt),
        Token::GtEq => Some(CompareOp::Ge),
        _ => None,
    }
}

fn binary_operator(token: &Token<'_>) -> Option<ArithOp> {
    match token {
        Token::Plus => Some(ArithOp::Plus),
        Token::Minus => Some(ArithOp::Minus),
        Token::Star => Some(ArithOp::Mul),
        Token::Slash => Some(ArithOp::Div),
        Token::Percent => Some(ArithOp::Mod),
        Token::Keyword(Keyword::Div) => Some(ArithOp::IntDiv),
        Token::Keyword(Keyword::Mod) => Some(ArithOp::Mod),
        Token::Ampersand => Some(ArithOp::BitAnd),
        Token::Pipe => Some(ArithOp::BitOr),
        Token::Caret => Some(ArithOp::BitXor),
        Token::LeftShift => Some(ArithOp::ShiftLeft),
        Token::RightShift => Some(ArithOp::ShiftRight),
        _ => None,
    }
}

/// Tokens after a parenthesized group that make the group an operand.
fn continues_expression(token: &Token<'_>) -> bool {
    token.is_comparison()
        || binary_operator(token).is_some()
        || matches!(
            token,
            Token::Keyword(
                Keyword::In
                    | Keyword::Between
                    | Keyword::Is
                    | Keyword::Like
                    | Keyword::Regexp
                    | Keyword::Rlike
                    | Keyword::Not
                    | Keyword::Collate
            )
        )
}

/// Absolute value of `i64::MIN`, the only overflowing literal a minus sign rescues.
const I64_MIN_MAGNITUDE: &str = "9223372036854775808";

impl<'a> ExprParser<'a> {
    pub fn new(
        sql: &'a str,
        fragment: FragmentStart,
        matcher: PartKeyMatcher<'a>,
        bump: &'a Bump,
        metrics: &'a dyn ParseMetrics,
        config: &RouterConfig,
    ) -> Self {
        Self {
            cursor: TokenCursor::new(sql, fragment.offset, config.quote_mode),
            quote_mode: config.quote_mode,
            bump,
            arena: ParseArena::new(config.max_parse_nodes, metrics),
            matcher,
            mode: fragment.mode,
            max_relations: config.max_relations,
            relations: Vec::new(),
            all_relations: Vec::new(),
            placeholder_count: fragment.placeholders_before,
            positional_params: false,
            batch_values_count: 0,
            value_rows: Vec::new(),
            has_disjunction: false,
            truncated: false,
            negation: 0,
            depth: 0,
            next_predicate: 0,
            errors: Vec::new(),
            qualifier_sites: Vec::new(),
        }
    }

    /// Parser for the fragment of a scanned statement; qualifiers the head
    /// scan collected are resolved against the routed table up front.
    pub fn for_statement(
        sql: &'a str,
        head: &StatementHead<'a>,
        matcher: PartKeyMatcher<'a>,
        bump: &'a Bump,
        metrics: &'a dyn ParseMetrics,
        config: &RouterConfig,
    ) -> Self {
        let mut parser = Self::new(sql, head.fragment, matcher, bump, metrics, config);
        for reference in &head.qualified_refs {
            let sites = parser.matcher.qualifier_sites(reference);
            parser.qualifier_sites.extend(sites);
        }
        parser
    }

    pub fn parse(mut self) -> Result<ExprParseResult<'a>> {
        let outcome = match self.mode {
            ParseMode::Select => self.select_root(),
            ParseMode::Insert => self.insert_root(),
        };

        let status = match outcome {
            Ok(()) => ParseStatus::Accepted,
            Err(err) => match RouteError::kind_of(&err) {
                Some(ErrorKind::AllocationFailure) => {
                    warn!(
                        limit = self.arena.limit(),
                        relations = self.all_relations.len(),
                        "parse arena exhausted; returning partial relations"
                    );
                    ParseStatus::Aborted(AbortReason::AllocationFailure)
                }
                Some(ErrorKind::Overflow) => return Err(err),
                _ => {
                    self.add_error_from_report(err);
                    ParseStatus::Accepted
                }
            },
        };

        let keys_seen = self.matcher.seen_keys();
        Ok(ExprParseResult {
            arena: self.arena,
            relations: self.relations,
            all_relations: self.all_relations,
            placeholder_count: self.placeholder_count,
            positional_params: self.positional_params,
            batch_values_count: self.batch_values_count,
            value_rows: self.value_rows,
            has_disjunction: self.has_disjunction,
            truncated: self.truncated,
            status,
            syntax_issues: self.errors,
            qualifier_sites: self.qualifier_sites,
            keys_seen,
        })
    }

    fn add_error_from_report(&mut self, err: eyre::Report) {
        let message = self.bump.alloc_str(&err.to_string());
        let issue = SyntaxIssue {
            message,
            span: self.cursor.span(),
            line: self.cursor.line(),
            column: self.cursor.column(),
        };
        self.arena.metrics().on_syntax_error();
        warn!(
            line = issue.line,
            column = issue.column,
            relations = self.all_relations.len(),
            error = message,
            "tolerating syntax error in routed fragment"
        );
        self.errors.push(issue);
    }

    fn next_predicate(&mut self) -> u32 {
        let id = self.next_predicate;
        self.next_predicate += 1;
        id
    }

    /// Runs one recursive grammar step one nesting level deeper.
    fn nested<T>(&mut self, step: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING_DEPTH {
            bail!(
                "nesting deeper than {} levels at line {} column {}",
                MAX_NESTING_DEPTH,
                self.cursor.line(),
                self.cursor.column()
            );
        }
        self.depth += 1;
        let result = step(self);
        self.depth -= 1;
        result
    }

    fn push_token(&mut self, list: ListId, kind: TokenKind<'a>, span: Span) -> Result<()> {
        self.arena.push_token(list, kind, span)?;
        Ok(())
    }

    fn skip_group(&mut self) -> Result<()> {
        let mut placeholders = 0;
        self.cursor.skip_group(|token| {
            if matches!(token, Token::Parameter(_)) {
                placeholders += 1;
            }
        })?;
        self.placeholder_count += placeholders;
        Ok(())
    }

    /// Consumes the rest of the statement, keeping placeholder counts exact.
    fn skip_to_end(&mut self) -> Result<()> {
        loop {
            match self.cursor.current() {
                Token::Eof | Token::Semicolon => return Ok(()),
                Token::LParen => self.skip_group()?,
                Token::RParen => bail!(
                    "unbalanced ')' at line {} column {}",
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::Error(msg) => bail!(
                    "{} at line {} column {}",
                    msg,
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::Parameter(_) => {
                    self.placeholder_count += 1;
                    self.cursor.advance();
                }
                _ => {
                    self.cursor.advance();
                }
            }
        }
    }

    fn expect_end(&self) -> Result<()> {
        match self.cursor.current() {
            Token::Eof | Token::Semicolon | Token::RParen => Ok(()),
            Token::Keyword(kw) if kw.ends_fragment() => Ok(()),
            other => bail!(
                "expected end of fragment, found {:?} at line {} column {}",
                other,
                self.cursor.line(),
                self.cursor.column()
            ),
        }
    }

    fn expect_ident(&mut self) -> Result<(&'a str, Option<u8>, Span)> {
        let token = self.cursor.current();
        match token.ident_text(self.cursor.text()) {
            Some((text, quote)) => {
                let span = self.cursor.span();
                self.cursor.advance();
                Ok((text, quote, span))
            }
            None => bail!(
                "expected identifier, found {:?} at line {} column {}",
                token,
                self.cursor.line(),
                self.cursor.column()
            ),
        }
    }

    // ------------------------------------------------------------------
    // SELECT / UPDATE / DELETE
    // ------------------------------------------------------------------

    fn select_root(&mut self) -> Result<()> {
        loop {
            match self.cursor.current() {
                Token::Comma => {
                    self.cursor.advance();
                    self.table_factor()?;
                }
                Token::Keyword(kw)
                    if kw == Keyword::Join || kw == Keyword::StraightJoin || kw.is_join_modifier() =>
                {
                    self.join_clause()?
                }
                _ => break,
            }
        }
        if self.cursor.consume_keyword(Keyword::Where) {
            self.condition()?;
        }
        self.expect_end()
    }

    fn join_clause(&mut self) -> Result<()> {
        while let Token::Keyword(kw) = self.cursor.current() {
            if !kw.is_join_modifier() {
                break;
            }
            self.cursor.advance();
        }
        if !self.cursor.consume_keyword(Keyword::Join) {
            self.cursor.expect_keyword(Keyword::StraightJoin)?;
        }
        self.table_factor()?;
        if self.cursor.consume_keyword(Keyword::On) {
            self.condition()?;
        } else if self.cursor.consume_keyword(Keyword::Using) {
            self.skip_group()?;
        }
        Ok(())
    }

    /// Joined table: name or derived table, optional alias and index hints.
    fn table_factor(&mut self) -> Result<()> {
        if self.cursor.check_token(&Token::LParen) {
            self.skip_group()?;
        } else {
            self.expect_ident()?;
            if self.cursor.consume_token(&Token::Dot) {
                self.expect_ident()?;
            }
        }

        if self.cursor.consume_keyword(Keyword::As) {
            self.expect_ident()?;
        } else if matches!(self.cursor.current(), Token::Ident(_) | Token::QuotedIdent(..)) {
            self.cursor.advance();
        }

        while matches!(
            self.cursor.current(),
            Token::Keyword(Keyword::Use | Keyword::Force | Keyword::Ignore)
        ) && matches!(
            self.cursor.lookahead(0),
            Token::Keyword(Keyword::Index | Keyword::Key)
        ) {
            self.cursor.advance();
            self.cursor.advance();
            if self.cursor.consume_keyword(Keyword::For) {
                while !matches!(self.cursor.current(), Token::LParen | Token::Eof) {
                    self.cursor.advance();
                }
            }
            self.skip_group()?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------

    fn condition(&mut self) -> Result<()> {
        self.condition_term()?;
        loop {
            match self.cursor.current() {
                Token::Keyword(Keyword::And) | Token::DoubleAmpersand => {
                    self.cursor.advance();
                }
                Token::Keyword(Keyword::Or) | Token::Keyword(Keyword::Xor) | Token::DoublePipe => {
                    self.cursor.advance();
                    self.has_disjunction = true;
                }
                _ => return Ok(()),
            }
            self.condition_term()?;
        }
    }

    fn condition_term(&mut self) -> Result<()> {
        self.nested(Self::condition_term_at_depth)
    }

    fn condition_term_at_depth(&mut self) -> Result<()> {
        if self.cursor.consume_keyword(Keyword::Not) {
            self.negation += 1;
            let result = self.condition_term();
            self.negation -= 1;
            return result;
        }

        if self.cursor.check_token(&Token::LParen) && self.paren_holds_condition() {
            self.cursor.advance();
            self.condition()?;
            return self.cursor.expect_token(&Token::RParen);
        }

        self.predicate()
    }

    /// Whether the `(` at the cursor opens a grouped condition rather than an operand.
    fn paren_holds_condition(&self) -> bool {
        let mut ahead = self.cursor.fork_lexer();
        let mut depth = 1usize;
        let mut first = true;
        loop {
            let token = ahead.next_token();
            if matches!(token, Token::Hint(_)) {
                continue;
            }
            if first && matches!(token, Token::Keyword(Keyword::Select)) {
                return false;
            }
            first = false;
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                Token::Eof | Token::Error(_) => return true,
                _ => {}
            }
        }

        let mut after = ahead.next_token();
        while let Token::Hint(_) = after {
            after = ahead.next_token();
        }
        !continues_expression(&after)
    }

    fn predicate(&mut self) -> Result<()> {
        let left = self.expression()?;
        let negated = self.cursor.consume_keyword(Keyword::Not);
        let token = self.cursor.current();

        if let Some(op) = compare_op(&token) {
            if negated {
                bail!(
                    "expected IN, BETWEEN, LIKE or REGEXP after NOT, found {:?} at line {} column {}",
                    token,
                    self.cursor.line(),
                    self.cursor.column()
                );
            }
            self.cursor.advance();
            let right = self.expression()?;
            let predicate = self.next_predicate();
            return self.build_relation(left, op, right, predicate, 0, false);
        }

        match token {
            Token::Keyword(Keyword::In) => {
                self.cursor.advance();
                if self.cursor.check_token(&Token::LParen)
                    && matches!(self.cursor.lookahead(0), Token::Keyword(Keyword::Select))
                {
                    return self.skip_group();
                }
                self.cursor.expect_token(&Token::LParen)?;
                let predicate = self.next_predicate();
                let mut ordinal = 0u32;
                loop {
                    let value = self.expression()?;
                    self.build_relation(left, CompareOp::Eq, value, predicate, ordinal, negated)?;
                    ordinal += 1;
                    if !self.cursor.consume_token(&Token::Comma) {
                        break;
                    }
                }
                self.cursor.expect_token(&Token::RParen)
            }
            Token::Keyword(Keyword::Between) => {
                self.cursor.advance();
                let low = self.expression()?;
                self.cursor.expect_keyword(Keyword::And)?;
                let high = self.expression()?;
                let lower = self.next_predicate();
                self.build_relation(left, CompareOp::Ge, low, lower, 0, negated)?;
                let upper = self.next_predicate();
                self.build_relation(left, CompareOp::Le, high, upper, 0, negated)
            }
            Token::Keyword(Keyword::Is) if !negated => {
                self.cursor.advance();
                self.cursor.consume_keyword(Keyword::Not);
                match self.cursor.current() {
                    Token::Keyword(Keyword::Null | Keyword::True | Keyword::False | Keyword::Unknown) => {
                        self.cursor.advance();
                        Ok(())
                    }
                    other => bail!(
                        "expected NULL, TRUE, FALSE or UNKNOWN after IS, found {:?} at line {} column {}",
                        other,
                        self.cursor.line(),
                        self.cursor.column()
                    ),
                }
            }
            Token::Keyword(Keyword::Like | Keyword::Regexp | Keyword::Rlike) => {
                self.cursor.advance();
                self.expression()?;
                if self.cursor.consume_keyword(Keyword::Escape) {
                    self.expression()?;
                }
                Ok(())
            }
            other if negated => bail!(
                "expected IN, BETWEEN, LIKE or REGEXP after NOT, found {:?} at line {} column {}",
                other,
                self.cursor.line(),
                self.cursor.column()
            ),
            _ => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Relations
    // ------------------------------------------------------------------

    fn single_column_key(&self, list: ListId) -> Option<usize> {
        match self.arena.single_token(list)?.kind {
            TokenKind::Column(column) => column.key_idx,
            _ => None,
        }
    }

    /// Normalizes `left op right` so the column side is on the left.
    fn build_relation(
        &mut self,
        left: ListId,
        op: CompareOp,
        right: ListId,
        predicate: u32,
        ordinal: u32,
        negated: bool,
    ) -> Result<()> {
        if op == CompareOp::Ne {
            return Ok(());
        }

        let left_has_column = self.arena.list(left).column.is_some();
        let right_has_column = self.arena.list(right).column.is_some();
        let (column_side, value_side, op) =
            match (self.single_column_key(left), self.single_column_key(right)) {
                (Some(_), _) => (left, right, op),
                (None, Some(_)) => (right, left, op.reverse()),
                (None, None) if left_has_column => (left, right, op),
                (None, None) if right_has_column => (right, left, op.reverse()),
                (None, None) => return Ok(()),
            };

        let key = self.single_column_key(column_side);
        self.push_relation(column_side, op, value_side, key, predicate, ordinal, negated)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_relation(
        &mut self,
        left: ListId,
        op: CompareOp,
        right: ListId,
        key: Option<usize>,
        predicate: u32,
        ordinal: u32,
        negated: bool,
    ) -> Result<()> {
        if self.all_relations.len() >= self.max_relations {
            if !self.truncated {
                warn!(limit = self.max_relations, "relation cap reached; dropping further predicates");
            }
            self.truncated = true;
            self.arena.metrics().on_relation_dropped();
            return Ok(());
        }

        let (level, first_position, second_position) = match key {
            Some(key) => self.matcher.classify(key),
            None => (PartLevel::Zero, None, None),
        };
        let relation = RelationExpr {
            left,
            op,
            right,
            column_idx: key,
            level,
            first_position,
            second_position,
            ordinal,
            predicate,
            negated: negated || self.negation > 0,
        };
        let id = self.arena.push_relation(relation)?;
        self.all_relations.push(id);
        if relation.is_routable() {
            self.relations.push(id);
        }
        Ok(())
    }

    /// Single-token list naming partition key `key`, for INSERT values.
    fn key_column_list(&mut self, key: usize, span: Span) -> Result<ListId> {
        let list = self.arena.new_list()?;
        let column = ColumnRef {
            database: None,
            table: None,
            name: self.matcher.key_name(key).unwrap_or_default(),
            key_idx: Some(key),
        };
        self.push_token(list, TokenKind::Column(column), span)?;
        Ok(list)
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn expression(&mut self) -> Result<ListId> {
        let list = self.arena.new_list()?;
        self.expression_into(list)?;
        Ok(list)
    }

    fn expression_into(&mut self, list: ListId) -> Result<()> {
        self.operand(list)?;
        loop {
            if self.cursor.consume_keyword(Keyword::Collate) {
                self.collation_name()?;
                continue;
            }
            let token = self.cursor.current();
            let Some(op) = binary_operator(&token) else {
                return Ok(());
            };
            let span = self.cursor.span();
            self.cursor.advance();
            self.push_token(list, TokenKind::Operator(op), span)?;
            self.operand(list)?;
        }
    }

    fn collation_name(&mut self) -> Result<()> {
        match self.cursor.current() {
            Token::String { .. } => {
                self.cursor.advance();
                Ok(())
            }
            _ => self.expect_ident().map(|_| ()),
        }
    }

    fn operand(&mut self, list: ListId) -> Result<()> {
        self.nested(|parser| parser.operand_at_depth(list))
    }

    fn operand_at_depth(&mut self, list: ListId) -> Result<()> {
        let span = self.cursor.span();
        let token = self.cursor.current();
        match token {
            Token::Minus => {
                self.cursor.advance();
                self.negative_operand(list, span)
            }
            Token::Plus => {
                self.cursor.advance();
                self.operand(list)
            }
            Token::Tilde | Token::Exclamation | Token::Keyword(Keyword::Not) => {
                let op = if matches!(token, Token::Tilde) {
                    ArithOp::BitNot
                } else {
                    ArithOp::Not
                };
                self.cursor.advance();
                self.push_token(list, TokenKind::Operator(op), span)?;
                self.operand(list)
            }
            Token::Keyword(Keyword::Binary)
                if !matches!(self.cursor.lookahead(0), Token::LParen) =>
            {
                self.cursor.advance();
                self.operand(list)
            }
            Token::Keyword(Keyword::Interval) => self.interval(list, span),
            Token::Integer(value) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Int(value), span)
            }
            Token::IntegerOverflow(digits) => bail!(RouteError::Overflow {
                literal: digits.to_string()
            }),
            Token::Number(text) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Decimal(text), span)
            }
            Token::String { .. } => self.string_literal(list),
            Token::HexNumber(digits) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Hex(digits), span)
            }
            Token::Keyword(Keyword::True) | Token::Keyword(Keyword::False) => {
                self.cursor.advance();
                let value = matches!(token, Token::Keyword(Keyword::True));
                self.push_token(list, TokenKind::Bool(value), span)
            }
            Token::Keyword(Keyword::Null) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Null, span)
            }
            Token::Parameter(parameter) => {
                self.cursor.advance();
                let placeholder = self.placeholder(parameter);
                self.push_token(list, TokenKind::Placeholder(placeholder), span)
            }
            Token::Variable(name) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Variable(name), span)
            }
            Token::LParen => self.parenthesized(list, span),
            Token::Keyword(kw) if kw.is_reserved_function() => {
                self.cursor.advance();
                if self.cursor.check_token(&Token::LParen)
                    && matches!(self.cursor.lookahead(0), Token::RParen)
                {
                    self.cursor.advance();
                    self.cursor.advance();
                }
                self.push_token(
                    list,
                    TokenKind::Func {
                        name: kw.as_str(),
                        args: None,
                    },
                    span,
                )
            }
            Token::Keyword(kw)
                if kw.can_be_function() && matches!(self.cursor.lookahead(0), Token::LParen) =>
            {
                self.function_call(list, kw.as_str(), span)
            }
            _ => match token.ident_text(self.cursor.text()) {
                Some((text, quote)) => self.identifier_operand(list, text, quote, span),
                None => bail!(
                    "expected expression, found {:?} at line {} column {}",
                    token,
                    self.cursor.line(),
                    self.cursor.column()
                ),
            },
        }
    }

    fn placeholder(&mut self, parameter: Parameter) -> Placeholder {
        let index = self.placeholder_count;
        self.placeholder_count += 1;
        match parameter {
            Parameter::Anonymous => Placeholder::Anonymous(index),
            Parameter::Positional(n) => {
                self.positional_params = true;
                Placeholder::Positional(n)
            }
        }
    }

    /// Folds a leading minus into a numeric literal.
    fn negative_operand(&mut self, list: ListId, minus: Span) -> Result<()> {
        let span = self.cursor.span();
        let folded = Span::new(minus.start, span.end() - minus.start);
        match self.cursor.current() {
            Token::Integer(value) => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Int(-value), folded)
            }
            Token::IntegerOverflow(digits) if digits == I64_MIN_MAGNITUDE => {
                self.cursor.advance();
                self.push_token(list, TokenKind::Int(i64::MIN), folded)
            }
            Token::IntegerOverflow(digits) => bail!(RouteError::Overflow {
                literal: format!("-{}", digits)
            }),
            Token::Number(text) => {
                self.cursor.advance();
                let negated = bumpalo::format!(in self.bump, "-{}", text).into_bump_str();
                self.push_token(list, TokenKind::Decimal(negated), folded)
            }
            _ => {
                self.push_token(list, TokenKind::Operator(ArithOp::Minus), minus)?;
                self.operand(list)
            }
        }
    }

    /// String literal, joining adjacent literals the way MySQL does.
    fn string_literal(&mut self, list: ListId) -> Result<()> {
        let start = self.cursor.span();
        let mut end = start;
        let mut text: Option<&'a str> = None;
        while let Token::String { raw, escaped } = self.cursor.current() {
            let part = unescape_string(raw, escaped, self.quote_mode, self.bump);
            text = Some(match text {
                None => part,
                Some(prefix) => bumpalo::format!(in self.bump, "{}{}", prefix, part).into_bump_str(),
            });
            end = self.cursor.span();
            self.cursor.advance();
        }
        let span = Span::new(start.start, end.end() - start.start);
        self.push_token(list, TokenKind::Str(text.unwrap_or_default()), span)
    }

    fn parenthesized(&mut self, list: ListId, span: Span) -> Result<()> {
        if matches!(self.cursor.lookahead(0), Token::Keyword(Keyword::Select)) {
            self.skip_group()?;
            return self.push_token(
                list,
                TokenKind::Func {
                    name: "SELECT",
                    args: None,
                },
                span,
            );
        }
        self.cursor.advance();
        self.expression_into(list)?;
        while self.cursor.consume_token(&Token::Comma) {
            self.expression_into(list)?;
        }
        self.cursor.expect_token(&Token::RParen)
    }

    fn interval(&mut self, list: ListId, span: Span) -> Result<()> {
        self.cursor.advance();
        let amount = self.arena.new_list()?;
        self.expression_into(amount)?;
        self.expect_ident()?;
        self.push_token(
            list,
            TokenKind::Func {
                name: "INTERVAL",
                args: Some(amount),
            },
            span,
        )
    }

    fn identifier_operand(
        &mut self,
        list: ListId,
        text: &'a str,
        quote: Option<u8>,
        span: Span,
    ) -> Result<()> {
        let next = self.cursor.lookahead(0);
        if quote.is_none() {
            let introducer = text.starts_with('_') || text.eq_ignore_ascii_case("n");
            if introducer && matches!(next, Token::String { .. }) {
                self.cursor.advance();
                return self.string_literal(list);
            }
            if matches!(next, Token::LParen) {
                return self.function_call(list, text, span);
            }
        }

        let mut parts: SmallVec<[Ident<'a>; 3]> = smallvec![Ident { text, quote, span }];
        self.cursor.advance();
        while parts.len() < 3 && self.cursor.consume_token(&Token::Dot) {
            let (text, quote, span) = self.expect_ident()?;
            parts.push(Ident { text, quote, span });
        }

        let (database, table, name) = match parts.as_slice() {
            [db, table, column] => (Some(db.text), Some(table.text), column.text),
            [table, column] => (None, Some(table.text), column.text),
            _ => (None, None, text),
        };
        if let Some(reference) = qualified_ref(&parts) {
            let sites = self.matcher.qualifier_sites(&reference);
            self.qualifier_sites.extend(sites);
        }

        let key_idx = self.matcher.match_column(database, table, name);
        let last = parts[parts.len() - 1].span;
        let full = Span::new(span.start, last.end() - span.start);
        let column = ColumnRef {
            database,
            table,
            name,
            key_idx,
        };
        self.push_token(list, TokenKind::Column(column), full)
    }

    fn function_call(&mut self, list: ListId, name: &'a str, span: Span) -> Result<()> {
        self.cursor.advance();
        let args = self.arena.new_list()?;
        self.nested(|parser| parser.function_args(args))?;
        self.push_token(
            list,
            TokenKind::Func {
                name,
                args: Some(args),
            },
            span,
        )
    }

    /// Argument tokens of a call; keywords and separators are skipped and
    /// columns inside are never matched against partition keys.
    fn function_args(&mut self, args: ListId) -> Result<()> {
        self.cursor.expect_token(&Token::LParen)?;
        loop {
            let span = self.cursor.span();
            let token = self.cursor.current();
            let next_is_call = matches!(self.cursor.lookahead(0), Token::LParen);
            let kind = match token {
                Token::RParen => {
                    self.cursor.advance();
                    return Ok(());
                }
                Token::Eof => bail!(
                    "unbalanced parenthesis in function arguments at line {} column {}",
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::Error(msg) => bail!(
                    "{} at line {} column {}",
                    msg,
                    self.cursor.line(),
                    self.cursor.column()
                ),
                Token::LParen => {
                    self.nested(|parser| parser.function_args(args))?;
                    continue;
                }
                Token::Ident(name) if next_is_call => {
                    self.function_call(args, name, span)?;
                    continue;
                }
                Token::Keyword(kw) if kw.can_be_function() && next_is_call => {
                    self.function_call(args, kw.as_str(), span)?;
                    continue;
                }
                Token::String { .. } => {
                    self.string_literal(args)?;
                    continue;
                }
                Token::Integer(value) => Some(TokenKind::Int(value)),
                Token::Number(text) => Some(TokenKind::Decimal(text)),
                Token::HexNumber(digits) => Some(TokenKind::Hex(digits)),
                Token::Keyword(Keyword::True) => Some(TokenKind::Bool(true)),
                Token::Keyword(Keyword::False) => Some(TokenKind::Bool(false)),
                Token::Keyword(Keyword::Null) => Some(TokenKind::Null),
                Token::Variable(name) => Some(TokenKind::Variable(name)),
                Token::Parameter(parameter) => Some(TokenKind::Placeholder(self.placeholder(parameter))),
                other => other.ident_text(self.cursor.text()).map(|(name, _)| {
                    TokenKind::Column(ColumnRef {
                        database: None,
                        table: None,
                        name,
                        key_idx: None,
                    })
                }),
            };
            self.cursor.advance();
            if let Some(kind) = kind {
                self.push_token(args, kind, span)?;
            }
        }
    }

    // ------------------------------------------------------------------
    // INSERT / REPLACE
    // ------------------------------------------------------------------

    fn insert_root(&mut self) -> Result<()> {
        let mut columns: Option<SmallVec<[Option<usize>; 8]>> = None;
        if self.cursor.check_token(&Token::LParen) {
            if matches!(self.cursor.lookahead(0), Token::Keyword(Keyword::Select)) {
                return self.skip_to_end();
            }
            columns = Some(self.insert_column_list()?);
        }

        match self.cursor.current() {
            Token::Keyword(Keyword::Values | Keyword::Value) => {
                self.cursor.advance();
                self.values_list(columns.as_deref())?;
            }
            Token::Keyword(Keyword::Set) if columns.is_none() => {
                self.cursor.advance();
                self.insert_assignments()?;
            }
            Token::Keyword(Keyword::Select) | Token::LParen => return self.skip_to_end(),
            _ if columns.is_none() => return self.select_root(),
            other => bail!(
                "expected VALUES or SELECT, found {:?} at line {} column {}",
                other,
                self.cursor.line(),
                self.cursor.column()
            ),
        }

        self.on_duplicate_key()?;
        self.expect_end()
    }

    fn insert_column_list(&mut self) -> Result<SmallVec<[Option<usize>; 8]>> {
        self.cursor.expect_token(&Token::LParen)?;
        let mut columns = SmallVec::new();
        if self.cursor.consume_token(&Token::RParen) {
            return Ok(columns);
        }
        loop {
            let (mut name, _, _) = self.expect_ident()?;
            while self.cursor.consume_token(&Token::Dot) {
                name = self.expect_ident()?.0;
            }
            columns.push(self.matcher.match_insert_column(name));
            if !self.cursor.consume_token(&Token::Comma) {
                break;
            }
        }
        self.cursor.expect_token(&Token::RParen)?;
        Ok(columns)
    }

    fn values_list(&mut self, columns: Option<&[Option<usize>]>) -> Result<()> {
        let key_count = self.matcher.meta().part_keys().len();
        let mut key_predicates: SmallVec<[Option<u32>; 8]> = smallvec![None; key_count];
        let mut row = 0u32;

        loop {
            let open = self.cursor.span();
            let first_param = self.placeholder_count;
            self.cursor.expect_token(&Token::LParen)?;
            let close = if self.cursor.check_token(&Token::RParen) {
                let close = self.cursor.span();
                self.cursor.advance();
                close
            } else {
                let mut position = 0usize;
                loop {
                    let span = self.cursor.span();
                    let value = self.expression()?;
                    let key = match columns {
                        Some(columns) => columns.get(position).copied().flatten(),
                        None => self.matcher.key_at_schema_index(position),
                    };
                    if let Some(key) = key {
                        let predicate = match key_predicates.get(key).copied().flatten() {
                            Some(predicate) => predicate,
                            None => {
                                let predicate = self.next_predicate();
                                if let Some(slot) = key_predicates.get_mut(key) {
                                    *slot = Some(predicate);
                                }
                                predicate
                            }
                        };
                        let column = self.key_column_list(key, span)?;
                        self.push_relation(column, CompareOp::Eq, value, Some(key), predicate, row, false)?;
                    }
                    position += 1;
                    if !self.cursor.consume_token(&Token::Comma) {
                        break;
                    }
                }
                let close = self.cursor.span();
                self.cursor.expect_token(&Token::RParen)?;
                close
            };

            self.value_rows.push(ValueRow {
                span: Span::new(open.start, close.end() - open.start),
                first_param,
                param_count: self.placeholder_count - first_param,
            });
            self.batch_values_count += 1;
            row += 1;
            if !self.cursor.consume_token(&Token::Comma) {
                return Ok(());
            }
        }
    }

    fn insert_assignments(&mut self) -> Result<()> {
        loop {
            let (mut name, _, mut span) = self.expect_ident()?;
            while self.cursor.consume_token(&Token::Dot) {
                let (next, _, next_span) = self.expect_ident()?;
                name = next;
                span = next_span;
            }
            if !self.cursor.consume_token(&Token::Eq) {
                self.cursor.expect_token(&Token::Assign)?;
            }
            let value = self.expression()?;
            if let Some(key) = self.matcher.match_insert_column(name) {
                let column = self.key_column_list(key, span)?;
                let predicate = self.next_predicate();
                self.push_relation(column, CompareOp::Eq, value, Some(key), predicate, 0, false)?;
            }
            if !self.cursor.consume_token(&Token::Comma) {
                break;
            }
        }
        self.batch_values_count = 1;
        Ok(())
    }

    /// `[AS alias [(cols)]] [ON DUPLICATE KEY UPDATE ...]` after the values.
    fn on_duplicate_key(&mut self) -> Result<()> {
        if self.cursor.consume_keyword(Keyword::As) {
            self.expect_ident()?;
            if self.cursor.check_token(&Token::LParen) {
                self.skip_group()?;
            }
        }
        if self.cursor.consume_keyword(Keyword::On) {
            self.cursor.expect_keyword(Keyword::Duplicate)?;
            self.cursor.expect_keyword(Keyword::Key)?;
            self.cursor.expect_keyword(Keyword::Update)?;
            self.skip_to_end()?;
        }
        Ok(())
    }
}
