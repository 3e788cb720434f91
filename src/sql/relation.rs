//! # Tokens, Token Lists and Relations
//!
//! Node types produced by the fragment parser. Nodes live in a
//! [`ParseArena`](super::arena::ParseArena) and refer to each other through
//! the handle types below, never through references, so a finished parse can
//! be moved around as a single owned value.
//!
//! ## Relation Normalization
//!
//! A relation always stores the column side on the left:
//!
//! ```text
//! 5 > col          ->  col < 5
//! col BETWEEN a AND b  ->  col >= a, col <= b
//! col IN (1, 2)    ->  col = 1 (ordinal 0), col = 2 (ordinal 1)
//! col != 5         ->  (no relation)
//! ```

use std::fmt;

use super::token::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelationId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NullSafeEq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
}

impl CompareOp {
    /// Operator to use after swapping the operands.
    pub fn reverse(&self) -> CompareOp {
        match self {
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Lt => CompareOp::Gt,
            other => *other,
        }
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::NullSafeEq)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NullSafeEq => "<=>",
            CompareOp::Ge => ">=",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Lt => "<",
            CompareOp::Ne => "<>",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which partitioning levels a column takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PartLevel {
    #[default]
    Zero,
    One,
    Two,
    Both,
}

impl PartLevel {
    pub fn covers_first(&self) -> bool {
        matches!(self, PartLevel::One | PartLevel::Both)
    }

    pub fn covers_second(&self) -> bool {
        matches!(self, PartLevel::Two | PartLevel::Both)
    }

    pub fn is_partitioned(&self) -> bool {
        !matches!(self, PartLevel::Zero)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Plus,
    Minus,
    Mul,
    Div,
    IntDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    Not,
    ShiftLeft,
    ShiftRight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `?`, numbered by appearance across the whole statement.
    Anonymous(u32),
    /// `:n` / `$n`, 1-based.
    Positional(u32),
}

impl Placeholder {
    /// Zero-based index into the bound parameters.
    pub fn param_index(&self) -> Option<usize> {
        match *self {
            Placeholder::Anonymous(idx) => Some(idx as usize),
            Placeholder::Positional(n) => (n as usize).checked_sub(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef<'a> {
    pub database: Option<&'a str>,
    pub table: Option<&'a str>,
    pub name: &'a str,
    /// Index into the table's partition-key list.
    pub key_idx: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'a> {
    Column(ColumnRef<'a>),
    Int(i64),
    Decimal(&'a str),
    Str(&'a str),
    Hex(&'a str),
    Bool(bool),
    Null,
    Func {
        name: &'a str,
        args: Option<ListId>,
    },
    Operator(ArithOp),
    Placeholder(Placeholder),
    Variable(&'a str),
}

impl<'a> TokenKind<'a> {
    pub fn is_column(&self) -> bool {
        matches!(self, TokenKind::Column(_))
    }

    /// Tokens that can stand for a single routed value.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            TokenKind::Int(_)
                | TokenKind::Decimal(_)
                | TokenKind::Str(_)
                | TokenKind::Hex(_)
                | TokenKind::Bool(_)
                | TokenKind::Null
                | TokenKind::Placeholder(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenNode<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
    pub(crate) next: Option<TokenId>,
}

/// Singly linked token sequence with O(1) append through the tail handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenList {
    pub(crate) head: Option<TokenId>,
    pub(crate) tail: Option<TokenId>,
    /// First column reference appended to the list.
    pub column: Option<TokenId>,
    pub len: u32,
}

impl TokenList {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True when the list is exactly one column reference.
    pub fn is_single_column(&self) -> bool {
        self.len == 1 && self.column.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationExpr {
    pub left: ListId,
    pub op: CompareOp,
    pub right: ListId,
    pub column_idx: Option<usize>,
    pub level: PartLevel,
    pub first_position: Option<usize>,
    pub second_position: Option<usize>,
    /// Position inside an IN list, or the row number of an INSERT tuple.
    pub ordinal: u32,
    /// Relations sharing a predicate id are alternatives (IN values, VALUES
    /// rows); different predicate ids are conjuncts.
    pub predicate: u32,
    pub negated: bool,
}

impl RelationExpr {
    pub fn is_routable(&self) -> bool {
        self.level.is_partitioned() && !self.negated && self.op != CompareOp::Ne
    }
}
